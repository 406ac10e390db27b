//! The terminal collaborator the emulator borrows for trap and keyboard I/O.
//!
//! Console is a scoped-acquisition contract: entering raw mode is paired
//! with a guaranteed restoration via `RawModeGuard`'s `Drop` impl, so the
//! terminal comes back to its original mode on normal exit, HALT, a fatal
//! execution error, or interruption.

use libc::STDIN_FILENO;
use nix::sys::select::{select, FdSet};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use nix::sys::time::{TimeVal, TimeValLike};
use std::io::{self, Read, Write};

/// Non-blocking key probe, blocking character read, and output, as seen by
/// the instruction semantics (KBSR/KBDR reads and the GETC/OUT/PUTS/IN/PUTSP
/// traps).
pub trait Console {
    fn key_ready(&mut self) -> bool;
    fn read_char(&mut self) -> u8;
    fn write_char(&mut self, byte: u8);
    fn write_line(&mut self, text: &str);
    fn flush(&mut self);
}

/// The real terminal: standard input/output, with a `select`-based
/// non-blocking probe for `key_ready`.
pub struct TermConsole;

impl Console for TermConsole {
    fn key_ready(&mut self) -> bool {
        let mut read_fds = FdSet::new();
        read_fds.insert(STDIN_FILENO);

        match select(None, &mut read_fds, None, None, &mut TimeVal::zero()) {
            Ok(count) => count == 1,
            Err(_) => false,
        }
    }

    fn read_char(&mut self) -> u8 {
        let mut buffer = [0; 1];
        io::stdin()
            .read_exact(&mut buffer)
            .expect("unable to read from stdin");
        buffer[0]
    }

    fn write_char(&mut self, byte: u8) {
        print!("{}", char::from(byte));
    }

    fn write_line(&mut self, text: &str) {
        println!("{}", text);
        self.flush();
    }

    fn flush(&mut self) {
        io::stdout().flush().expect("unable to flush stdout");
    }
}

/// Puts the terminal into raw (non-canonical, no-echo) mode for the
/// lifetime of the guard, restoring the prior mode on drop — including on
/// panic unwind, so a fatal execution error or an early return still leaves
/// the terminal usable.
pub struct RawModeGuard {
    original: Termios,
    console: TermConsole,
}

impl RawModeGuard {
    pub fn acquire() -> nix::Result<Self> {
        let original = termios::tcgetattr(STDIN_FILENO)?;

        let mut raw = original.clone();
        raw.local_flags &= !(LocalFlags::ICANON | LocalFlags::ECHO);
        termios::tcsetattr(STDIN_FILENO, SetArg::TCSANOW, &raw)?;

        Ok(Self {
            original,
            console: TermConsole,
        })
    }

    pub fn console(&mut self) -> &mut TermConsole {
        &mut self.console
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(STDIN_FILENO, SetArg::TCSANOW, &self.original);
    }
}

/// An in-memory `Console` for tests: reads from a fixed queue of bytes,
/// writes to a growable buffer.
#[cfg(test)]
pub struct VecConsole {
    input: std::collections::VecDeque<u8>,
    pub output: Vec<u8>,
    pub flush_count: usize,
}

#[cfg(test)]
impl VecConsole {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: input.into(),
            output: Vec::new(),
            flush_count: 0,
        }
    }

    pub fn output_as_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[cfg(test)]
impl Console for VecConsole {
    fn key_ready(&mut self) -> bool {
        !self.input.is_empty()
    }

    fn read_char(&mut self) -> u8 {
        self.input.pop_front().expect("VecConsole input exhausted")
    }

    fn write_char(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn write_line(&mut self, text: &str) {
        self.output.extend_from_slice(text.as_bytes());
        self.output.push(b'\n');
        self.flush();
    }

    fn flush(&mut self) {
        self.flush_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_console_key_ready_reflects_queued_input() {
        let mut console = VecConsole::new(vec![b'x']);
        assert!(console.key_ready());
        assert_eq!(console.read_char(), b'x');
        assert!(!console.key_ready());
    }

    #[test]
    fn vec_console_captures_written_bytes() {
        let mut console = VecConsole::new(vec![]);
        console.write_char(b'H');
        console.write_char(b'i');
        assert_eq!(console.output_as_string(), "Hi");
    }
}
