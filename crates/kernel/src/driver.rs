use crate::console::Console;
use crate::error::{DriverError, KernelError};
use crate::interrupt::Param;

/// Capability every device driver provides to the kernel.
pub trait DeviceDriver {
    /// One-time initialisation when the kernel loads the driver.
    fn driver_entry(&mut self) -> Result<(), KernelError>;

    /// Service one interrupt for this device.
    fn isr(&mut self, params: &[Param], console: &mut dyn Console) -> Result<(), DriverError>;

    fn status(&self) -> &str;
}

/// Translates raw key codes into characters on the console input queue.
#[derive(Debug, Default)]
pub struct KeyboardDriver {
    caps_lock: bool,
    status: String,
}

const KEY_BACKSPACE: i64 = 8;
const KEY_ENTER: i64 = 13;
const KEY_SHIFT: i64 = 16;
const KEY_CAPS_LOCK: i64 = 20;
const KEY_SPACE: i64 = 32;
const KEY_UP: i64 = 38;
const KEY_DOWN: i64 = 40;

impl KeyboardDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Character for a key code, or None for keys that produce no text.
    pub fn translate(&mut self, code: i64, shifted: bool) -> Result<Option<char>, DriverError> {
        if !(0..=255).contains(&code) {
            return Err(DriverError::InvalidKey(code));
        }
        let byte = code as u8;
        let ch = match code {
            65..=90 => {
                if shifted != self.caps_lock {
                    byte as char
                } else {
                    (byte + 32) as char
                }
            }
            97..=122 => byte as char,
            48..=57 if shifted => shift_symbol(byte),
            48..=57 => byte as char,
            KEY_SPACE => ' ',
            KEY_ENTER => '\r',
            KEY_BACKSPACE => '\x08',
            186..=222 => {
                let Some(base) = punctuation(byte) else {
                    return Ok(None);
                };
                if shifted { shift_symbol(base) } else { base as char }
            }
            KEY_CAPS_LOCK => {
                self.caps_lock = !self.caps_lock;
                return Ok(None);
            }
            KEY_SHIFT | KEY_UP | KEY_DOWN => return Ok(None),
            _ => {
                log::debug!("key code {} not recognized", code);
                return Ok(None);
            }
        };
        Ok(Some(ch))
    }
}

/// Browser key codes for punctuation to their unshifted ASCII.
fn punctuation(code: u8) -> Option<u8> {
    let ascii = match code {
        188 => b',',
        190 => b'.',
        191 => b'/',
        186 => b';',
        222 => b'\'',
        192 => b'`',
        189 => b'-',
        187 => b'=',
        219 => b'[',
        221 => b']',
        220 => b'\\',
        _ => return None,
    };
    Some(ascii)
}

fn shift_symbol(ascii: u8) -> char {
    match ascii {
        b',' => '<',
        b'-' => '_',
        b'.' => '>',
        b'1' => '!',
        b'2' => '@',
        b'3' => '#',
        b'4' => '$',
        b'5' => '%',
        b'6' => '^',
        b'7' => '&',
        b'8' => '*',
        b'9' => '(',
        b'0' => ')',
        b'/' => '?',
        b';' => ':',
        b'\'' => '"',
        b'`' => '~',
        b'=' => '+',
        b'[' => '{',
        b']' => '}',
        b'\\' => '|',
        other => other as char,
    }
}

impl DeviceDriver for KeyboardDriver {
    fn driver_entry(&mut self) -> Result<(), KernelError> {
        self.status = "loaded".to_string();
        Ok(())
    }

    /// params: [key code, shifted (0 or 1)]
    fn isr(&mut self, params: &[Param], console: &mut dyn Console) -> Result<(), DriverError> {
        let code = params
            .first()
            .and_then(Param::as_int)
            .ok_or(DriverError::MissingParam)?;
        let shifted = params.get(1).and_then(Param::as_int).unwrap_or(0) != 0;
        log::trace!("key code: {} shifted: {}", code, shifted);
        if let Some(ch) = self.translate(code, shifted)? {
            console.push_input(ch);
        }
        Ok(())
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Draws text buffers onto named screens.
#[derive(Debug, Default)]
pub struct DisplayDriver {
    status: String,
}

impl DisplayDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceDriver for DisplayDriver {
    fn driver_entry(&mut self) -> Result<(), KernelError> {
        self.status = "loaded".to_string();
        Ok(())
    }

    /// params: [text] or [screen name, text]
    fn isr(&mut self, params: &[Param], console: &mut dyn Console) -> Result<(), DriverError> {
        match params {
            [text] => {
                let text = text.as_text().ok_or(DriverError::MissingParam)?;
                console.put_text(text);
            }
            [screen, text, ..] => {
                let screen = screen.as_text().ok_or(DriverError::MissingParam)?;
                let text = text.as_text().ok_or(DriverError::MissingParam)?;
                console.draw(screen, text);
            }
            [] => return Err(DriverError::MissingParam),
        }
        Ok(())
    }

    fn status(&self) -> &str {
        &self.status
    }
}
