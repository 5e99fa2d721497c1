use std::any::Any;
use std::collections::BTreeMap;

/// Output and input primitives the kernel needs from its console.
pub trait Console: Send {
    fn put_text(&mut self, text: &str);
    fn advance_line(&mut self);
    fn clear_screen(&mut self);
    fn reset_xy(&mut self);

    /// Queue one translated keystroke.
    fn push_input(&mut self, ch: char);

    /// Hand back the next completed input line, if Enter has been pressed.
    fn flush_input(&mut self) -> Option<String>;

    /// Draw text on a named screen. Consoles with a single screen print it.
    fn draw(&mut self, _screen: &str, text: &str) {
        self.put_text(text);
    }

    /// Full-screen halt indication.
    fn bsod(&mut self, message: &str) {
        self.clear_screen();
        self.reset_xy();
        self.put_text("*** KERNEL HALTED ***");
        self.advance_line();
        self.put_text(message);
    }

    fn as_any(&self) -> &dyn Any;
}

/// Pending keystrokes, cut into lines on carriage return.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: String,
    lines: Vec<String>,
}

impl LineBuffer {
    pub fn push(&mut self, ch: char) {
        match ch {
            '\r' | '\n' => self.lines.push(std::mem::take(&mut self.pending)),
            '\x08' => {
                self.pending.pop();
            }
            _ => self.pending.push(ch),
        }
    }

    pub fn take_line(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.remove(0))
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}

/// In-memory console used by tests and headless runs.
#[derive(Debug, Default)]
pub struct BufferConsole {
    lines: Vec<String>,
    current: String,
    input: LineBuffer,
    screens: BTreeMap<String, Vec<String>>,
    pub halted: bool,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed so far, one line per entry.
    pub fn output(&self) -> String {
        let mut out = self.lines.join("\n");
        if !self.current.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.current);
        }
        out
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.output().contains(needle)
    }

    pub fn screen(&self, name: &str) -> &[String] {
        self.screens.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Console for BufferConsole {
    fn put_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn advance_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn clear_screen(&mut self) {
        self.lines.clear();
        self.current.clear();
    }

    fn reset_xy(&mut self) {}

    fn push_input(&mut self, ch: char) {
        self.input.push(ch);
    }

    fn flush_input(&mut self) -> Option<String> {
        self.input.take_line()
    }

    fn draw(&mut self, screen: &str, text: &str) {
        self.screens
            .entry(screen.to_string())
            .or_default()
            .push(text.to_string());
    }

    fn bsod(&mut self, message: &str) {
        self.halted = true;
        self.put_text("*** KERNEL HALTED *** ");
        self.put_text(message);
        self.advance_line();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
