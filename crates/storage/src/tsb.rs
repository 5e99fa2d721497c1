use std::fmt;

/// Track-sector-block address of a single disk block.
///
/// On disk a TSB is stored as three ASCII digits, one per coordinate, so
/// `(1, 0, 7)` is the bytes `b"107"`. The all-sevens address `"777"` lies
/// outside every supported geometry and is reserved as the invalid pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tsb {
    pub track: u8,
    pub sector: u8,
    pub block: u8,
}

/// Encoded width of a TSB pointer inside a block.
pub const POINTER_LEN: usize = 3;

impl Tsb {
    pub const fn new(track: u8, sector: u8, block: u8) -> Self {
        Self { track, sector, block }
    }

    /// The reserved "no next block" pointer.
    pub const INVALID: Tsb = Tsb::new(7, 7, 7);

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    pub fn to_bytes(self) -> [u8; POINTER_LEN] {
        [b'0' + self.track, b'0' + self.sector, b'0' + self.block]
    }

    /// Decode a pointer. Anything other than three ASCII digits is None.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < POINTER_LEN {
            return None;
        }
        let digit = |b: u8| b.is_ascii_digit().then(|| b - b'0');
        Some(Self::new(digit(bytes[0])?, digit(bytes[1])?, digit(bytes[2])?))
    }

    /// Key used by the persisted image, e.g. "107".
    pub fn key(self) -> String {
        format!("{}{}{}", self.track, self.sector, self.block)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        if key.len() != POINTER_LEN {
            return None;
        }
        Self::from_bytes(key.as_bytes())
    }
}

impl fmt::Display for Tsb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.track, self.sector, self.block)
    }
}
