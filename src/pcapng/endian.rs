use super::BYTE_ORDER_MAGIC;

/// Byte order of a pcapng section, as signalled by its byte-order magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Detects the byte order from the four byte-order magic octets; returns
    /// `None` for anything but the two valid magic encodings.
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        if magic == BYTE_ORDER_MAGIC.to_be_bytes() {
            Some(Endian::Big)
        } else if magic == BYTE_ORDER_MAGIC.to_le_bytes() {
            Some(Endian::Little)
        } else {
            None
        }
    }

    // The read_* helpers expect the caller to have checked the slice length.

    pub fn read_u16(self, b: &[u8]) -> u16 {
        let b = [b[0], b[1]];
        match self {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        }
    }

    pub fn read_u32(self, b: &[u8]) -> u32 {
        let b = [b[0], b[1], b[2], b[3]];
        match self {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        }
    }

    pub fn read_u64(self, b: &[u8]) -> u64 {
        let mut a = [0u8; 8];
        a.copy_from_slice(&b[..8]);
        match self {
            Endian::Big => u64::from_be_bytes(a),
            Endian::Little => u64::from_le_bytes(a),
        }
    }

    pub fn put_u16(self, out: &mut Vec<u8>, v: u16) {
        match self {
            Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
            Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn put_u32(self, out: &mut Vec<u8>, v: u32) {
        match self {
            Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
            Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn put_u64(self, out: &mut Vec<u8>, v: u64) {
        match self {
            Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
            Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
}
