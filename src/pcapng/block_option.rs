use std::borrow::Cow;

use super::endian::Endian;
use crate::error_handling::types::PcapngError;

/// Signals the end of an option list.
pub const OPT_END_OF_OPT: u16 = 0;
/// UTF-8 comment text.
pub const OPT_COMMENT: u16 = 1;
/// SHB: description of the capture hardware.
pub const OPT_SHB_HARDWARE: u16 = 2;
/// SHB: name of the operating system.
pub const OPT_SHB_OS: u16 = 3;
/// SHB: name of the capturing application.
pub const OPT_SHB_USERAPPL: u16 = 4;

/// A pcapng option: a code identifying the type of option plus its value.
///
/// On the wire an option is the 16 bit code, the 16 bit value length, and the
/// value padded to the next 32 bit boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOption {
    pub code: u16,
    pub value: Vec<u8>,
}

/// Rounds up to the next multiple of 4.
pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

impl BlockOption {
    pub fn new(code: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }

    pub fn comment(text: &str) -> Self {
        Self::new(OPT_COMMENT, text.as_bytes())
    }

    /// Decodes the option at the start of `buf`.
    ///
    /// Returns the option together with the number of octets to skip to reach
    /// the next option. The end-of-options marker decodes to `None`, skipping
    /// 4 octets.
    pub fn decode(buf: &[u8], endian: Endian) -> Result<(Option<Self>, usize), PcapngError> {
        if buf.len() < 4 {
            return Err(PcapngError::Truncated {
                needed: 4,
                available: buf.len(),
            });
        }
        let code = endian.read_u16(&buf[0..2]);
        let length = endian.read_u16(&buf[2..4]) as usize;
        let skip = padded_len(4 + length);
        if code == OPT_END_OF_OPT && length == 0 {
            return Ok((None, skip));
        }
        if buf.len() < 4 + length {
            return Err(PcapngError::Truncated {
                needed: 4 + length,
                available: buf.len(),
            });
        }
        Ok((Some(Self::new(code, &buf[4..4 + length])), skip))
    }

    /// Number of octets this option occupies on the wire, including padding.
    pub fn encoded_len(&self) -> usize {
        padded_len(4 + self.value.len())
    }

    /// Appends the wire encoding of this option to `out`.
    pub fn encode_into(&self, endian: Endian, out: &mut Vec<u8>) -> Result<(), PcapngError> {
        let length = u16::try_from(self.value.len())
            .map_err(|_| PcapngError::OptionTooLong(self.value.len()))?;
        endian.put_u16(out, self.code);
        endian.put_u16(out, length);
        out.extend_from_slice(&self.value);
        out.resize(out.len() + self.encoded_len() - 4 - self.value.len(), 0);
        Ok(())
    }

    pub fn encode(&self, endian: Endian) -> Result<Vec<u8>, PcapngError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(endian, &mut out)?;
        Ok(out)
    }

    /// The option value as (lossy) UTF-8 text.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// True for the options defined as UTF-8 strings in a section header block.
    pub fn is_text(&self) -> bool {
        (OPT_COMMENT..=OPT_SHB_USERAPPL).contains(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_big_and_little_endian() {
        let opt = BlockOption::new(42, "Go");
        assert_eq!(
            opt.encode(Endian::Big).unwrap(),
            vec![0, 42, 0, 2, b'G', b'o', 0, 0]
        );
        assert_eq!(
            opt.encode(Endian::Little).unwrap(),
            vec![42, 0, 2, 0, b'G', b'o', 0, 0]
        );
    }

    #[test]
    fn test_encoded_length_is_padded() {
        for len in 0..9 {
            let opt = BlockOption::new(OPT_COMMENT, vec![b'x'; len]);
            let b = opt.encode(Endian::Big).unwrap();
            assert_eq!(b.len() % 4, 0);
            assert_eq!(b.len(), padded_len(4 + len));
            assert_eq!(b.len(), opt.encoded_len());
        }
    }

    #[test]
    fn test_decode_comment() {
        for endian in [Endian::Big, Endian::Little] {
            let b = BlockOption::comment("Kuhbernetes").encode(endian).unwrap();
            let (opt, skip) = BlockOption::decode(&b, endian).unwrap();
            let opt = opt.expect("should decode an option");
            assert_eq!(opt.code, OPT_COMMENT);
            assert_eq!(opt.text(), "Kuhbernetes");
            assert!(opt.is_text());
            assert_eq!(skip, 16);
        }
    }

    #[test]
    fn test_decode_end_of_options() {
        let (opt, skip) = BlockOption::decode(&[0, 0, 0, 0], Endian::Big).unwrap();
        assert!(opt.is_none());
        assert_eq!(skip, 4);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(BlockOption::decode(&[0, 1], Endian::Big).is_err());
        // declares 8 octets of value, but only 2 follow
        assert_eq!(
            BlockOption::decode(&[0, 1, 0, 8, b'a', b'b'], Endian::Big),
            Err(PcapngError::Truncated {
                needed: 12,
                available: 6
            })
        );
    }

    #[test]
    fn test_encode_rejects_oversized_value() {
        let opt = BlockOption::new(OPT_COMMENT, vec![0u8; 70_000]);
        assert_eq!(
            opt.encode(Endian::Big),
            Err(PcapngError::OptionTooLong(70_000))
        );
    }
}
