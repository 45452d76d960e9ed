use colored::Colorize;
use crossterm::{cursor, execute, terminal};
use std::io::{IsTerminal, Write};

/// One-line busy indicator on stderr.
///
/// The line is cleared when the indicator is finished or dropped. Nothing is
/// drawn when stderr is not a terminal.
pub struct Busy {
    active: bool,
}

impl Busy {
    pub fn start(message: &str) -> Self {
        let mut stderr = std::io::stderr();
        if !stderr.is_terminal() {
            return Self { active: false };
        }
        let _ = write!(stderr, "{} {}", "…".cyan(), message.cyan());
        let _ = stderr.flush();
        Self { active: true }
    }

    pub fn finish(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let mut stderr = std::io::stderr();
        let _ = execute!(
            stderr,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::CurrentLine)
        );
    }
}

impl Drop for Busy {
    fn drop(&mut self) {
        self.clear();
    }
}
