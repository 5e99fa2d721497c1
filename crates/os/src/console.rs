use std::any::Any;
use std::io::{self, Write};

use colored::*;
use kernel::{Console, LineBuffer};

/// Console on the host terminal.
#[derive(Debug, Default)]
pub struct TerminalConsole {
    input: LineBuffer,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

impl Console for TerminalConsole {
    fn put_text(&mut self, text: &str) {
        print!("{}", text);
        self.flush();
    }

    fn advance_line(&mut self) {
        println!();
    }

    fn clear_screen(&mut self) {
        print!("\x1B[2J");
        self.flush();
    }

    fn reset_xy(&mut self) {
        print!("\x1B[1;1H");
        self.flush();
    }

    fn push_input(&mut self, ch: char) {
        self.input.push(ch);
    }

    fn flush_input(&mut self) -> Option<String> {
        self.input.take_line()
    }

    fn draw(&mut self, screen: &str, text: &str) {
        println!("{} {}", format!("[{}]", screen).dimmed(), text.cyan());
    }

    fn bsod(&mut self, message: &str) {
        println!();
        println!("{}", " *** KERNEL HALTED *** ".white().on_blue().bold());
        println!("{}", message.red());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
