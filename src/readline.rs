//! Raw-mode line reading with tab completion and history recall.

use libc::ECHO;
use libc::ECHOE;
use libc::ICANON;
use libc::STDIN_FILENO;
use libc::TCSANOW;
use libc::VMIN;
use libc::VTIME;
use libc::isatty;
use libc::tcgetattr;
use libc::tcsetattr;
use libc::termios;
use std::io::BufRead;
use std::io::Read;
use std::io::Write;
use std::io;
use std::mem::MaybeUninit;

/// Reads one line from stdin, editing it in place.
///
/// The first token completes with tab against the candidates returned by
/// `complete`; the up and down arrows recall lines from `history`, oldest
/// first. Returns `None` at end of input.
///
/// When stdin is not a terminal, the line is read cooked, without edition.
pub fn read_line(
    prompt: &str,
    history: &[String],
    complete: &dyn Fn(&str) -> Vec<String>,
) -> Option<String> {
    if unsafe { isatty(STDIN_FILENO) } == 0 {
        return read_line_plain(prompt);
    }

    // Save termios state
    let saved_termios = unsafe {
        let mut t: termios = MaybeUninit::zeroed().assume_init();
        tcgetattr(STDIN_FILENO, &mut t);
        t
    };
    // Set temporary termios
    let mut raw = saved_termios;
    raw.c_lflag &= !(ICANON | ECHO | ECHOE);
    raw.c_cc[VMIN] = 1;
    raw.c_cc[VTIME] = 0;
    unsafe {
        tcsetattr(STDIN_FILENO, TCSANOW, &raw);
    }

    let line = edit_line(prompt, history, complete);

    // Restore termios state
    unsafe {
        tcsetattr(STDIN_FILENO, TCSANOW, &saved_termios);
    }
    line
}

/// Reads one line without edition, for non-interactive input.
fn read_line_plain(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let line = io::stdin().lock().lines().next()?.unwrap_or(String::new());
    Some(line)
}

/// Reads a single byte from `stdin`, `None` at end of input.
fn read_byte(stdin: &mut impl Read) -> Option<u8> {
    let mut buf = [0];
    stdin.read_exact(&mut buf).ok()?;
    Some(buf[0])
}

/// Reprints the prompt and the current line, erasing leftovers.
fn redraw(prompt: &str, line: &str) {
    print!("\r\x1b[K{prompt}{line}");
    let _ = io::stdout().flush();
}

/// The interactive editing loop, with the terminal in raw mode.
fn edit_line(prompt: &str, history: &[String], complete: &dyn Fn(&str) -> Vec<String>) -> Option<String> {
    let mut stdin = io::stdin().lock();
    let mut line = String::new();
    // Position in `history` while browsing it, and the line stashed away
    let mut hist_idx: Option<usize> = None;
    let mut stash = String::new();

    print!("{prompt}");
    let _ = io::stdout().flush();

    loop {
        let Some(b) = read_byte(&mut stdin) else {
            println!();
            return None;
        };
        match b {
            b'\r' | b'\n' => {
                println!();
                return Some(line);
            }

            // Ctrl-D on an empty line ends the input
            0x04 => {
                if line.is_empty() {
                    println!();
                    return None;
                }
            }

            // Ctrl-C drops the line
            0x03 => {
                println!("^C");
                line.clear();
                hist_idx = None;
                redraw(prompt, &line);
            }

            // Backspace
            0x08 | 0x7f => {
                if line.pop().is_some() {
                    print!("\x08 \x08");
                    let _ = io::stdout().flush();
                }
            }

            // Completion applies to the first token only
            b'\t' => {
                if line.contains(' ') {
                    continue;
                }
                let matches = complete(&line);
                match matches.as_slice() {
                    [] => {}
                    [single] => {
                        line = format!("{single} ");
                        redraw(prompt, &line);
                    }
                    _ => {
                        println!();
                        println!("{}", matches.join("  "));
                        redraw(prompt, &line);
                    }
                }
            }

            // Escape sequences: arrow keys browse the history
            0x1b => {
                if read_byte(&mut stdin) != Some(b'[') {
                    continue;
                }
                let new_idx = match (read_byte(&mut stdin), hist_idx) {
                    (Some(b'A'), None) if !history.is_empty() => Some(history.len() - 1),
                    (Some(b'A'), Some(i)) if i > 0 => Some(i - 1),
                    (Some(b'B'), Some(i)) if i + 1 < history.len() => Some(i + 1),
                    (Some(b'B'), Some(_)) => None,
                    (_, idx) => idx,
                };
                if new_idx != hist_idx {
                    if hist_idx.is_none() {
                        stash = line.clone();
                    }
                    line = match new_idx {
                        Some(i) => history[i].clone(),
                        None => stash.clone(),
                    };
                    hist_idx = new_idx;
                    redraw(prompt, &line);
                }
            }

            // Printable characters
            0x20..=0x7e => {
                line.push(b as char);
                print!("{}", b as char);
                let _ = io::stdout().flush();
            }

            _ => {}
        }
    }
}
