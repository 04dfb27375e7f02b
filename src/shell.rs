//! The interactive shell: prompt loop, history ring and generic verbs.

use crate::readline;
use crate::session::CMD_ARG_NUM_MAX;
use crate::session::Session;
use fslib::Error;
use std::path::Path;

/// The number of lines the history ring retains.
pub const HISTORY_MAX: usize = 20;

/// The verbs handled by the shell itself.
const GENERIC_COMMANDS: &[&str] = &["help", "history", "quit"];

/// The interactive shell, owning the session and the command history.
pub struct Shell {
    session: Session,
    /// The last [`HISTORY_MAX`] non-empty lines, oldest first.
    history: Vec<String>,
    prompt: String,
    abort: bool,
}

impl Shell {
    /// Creates a shell over the given session.
    pub fn new(name: &str, session: Session) -> Self {
        Self {
            session,
            history: Vec::new(),
            prompt: format!("{name}$ "),
            abort: false,
        }
    }

    /// Runs the shell until `quit` or end of input.
    ///
    /// When an image path is given, it is mounted first, as a manual
    /// `mount` would.
    pub fn run(&mut self, image: Option<&Path>) {
        if let Some(path) = image {
            if let Err(e) = self.session.mount(path) {
                eprintln!("failed to mount {}: {e}", path.display());
            }
        }

        while !self.abort {
            let verbs = self.verbs();
            let complete = |prefix: &str| {
                verbs
                    .iter()
                    .filter(|v| v.starts_with(prefix))
                    .cloned()
                    .collect::<Vec<_>>()
            };
            let Some(line) = readline::read_line(&self.prompt, &self.history, &complete) else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            self.add_history(&line);
            self.exec_line(&line);
        }
    }

    /// Returns every verb available in the current state.
    fn verbs(&self) -> Vec<String> {
        GENERIC_COMMANDS
            .iter()
            .chain(self.session.commands())
            .map(|s| s.to_string())
            .collect()
    }

    /// Appends a line to the history, dropping the oldest one when full.
    fn add_history(&mut self, line: &str) {
        if self.history.len() >= HISTORY_MAX {
            self.history.remove(0);
        }
        self.history.push(line.to_string());
    }

    /// Tokenizes and executes one command line.
    fn exec_line(&mut self, line: &str) {
        let argv: Vec<&str> = line.split_whitespace().collect();
        let Some(&verb) = argv.first() else {
            return;
        };
        if argv.len() > CMD_ARG_NUM_MAX {
            eprintln!("failed to {verb}: {}", Error::BadArgs);
            return;
        }

        match verb {
            "help" => self.do_help(),
            "history" => self.do_history(),
            "quit" => self.abort = true,
            _ => match self.session.exec(&argv) {
                Ok(()) => {}
                Err(e) => {
                    eprintln!("failed to {verb}: {e}");
                    if matches!(e, Error::BadArgs) {
                        println!("press 'help' for more info.");
                    }
                }
            },
        }
    }

    /// Prints the list of available commands.
    fn do_help(&self) {
        print!("command list: ");
        for cmd in self.verbs() {
            print!("{cmd} ");
        }
        println!();
    }

    /// Prints the history, oldest entry first.
    fn do_history(&self) {
        for (i, line) in self.history.iter().enumerate() {
            println!("{i}  {line}");
        }
    }
}
