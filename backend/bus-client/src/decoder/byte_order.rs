/// Byte order of an encoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    const LITTLE_MARKER: u8 = b'l';
    const BIG_MARKER: u8 = b'B';

    /// Parse the endianness marker that opens every message header.
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            Self::LITTLE_MARKER => Some(ByteOrder::Little),
            Self::BIG_MARKER => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn marker(&self) -> u8 {
        match self {
            ByteOrder::Little => Self::LITTLE_MARKER,
            ByteOrder::Big => Self::BIG_MARKER,
        }
    }

    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}
