//! One-shot editing of the first section header block of a pcapng stream.
//!
//! [`StreamEditor`] sits between the websocket relay and the capture sink. It
//! buffers the stream until the complete first SHB has arrived, rewrites the
//! SHB comment to carry the capture target information, and from then on
//! forwards everything unmodified.
//!
//! Streams that do not start with a valid SHB are never held back: the editor
//! gives up, flushes what it buffered, and passes everything through.

use std::borrow::Cow;
use std::io;
use std::mem;

use log::{debug, trace, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::block_option::{BlockOption, OPT_COMMENT};
use super::endian::Endian;
use super::metadata::{self, TargetInfo};
use super::{
    BYTE_ORDER_MAGIC, SHB_BLOCK_TYPE, SHB_FIXED_LEN, SHB_MAX_LEN, SHB_MIN_LEN,
    UNKNOWN_SECTION_LENGTH,
};
use crate::error_handling::types::PcapngError;
use crate::targets::Target;

/// Editing progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorState {
    /// Waiting for the first 12 octets: block type, length, byte-order magic.
    Buffering,
    /// Waiting for the complete SHB of `block_len` octets.
    Accumulating { endian: Endian, block_len: usize },
    /// Done editing (or given up); forward everything as-is.
    PassThrough,
}

/// Writer rewriting the first pcapng SHB on its way into `sink`.
pub struct StreamEditor<W> {
    sink: W,
    state: EditorState,
    buffer: Vec<u8>,
    info: TargetInfo,
}

impl<W: AsyncWrite + Unpin> StreamEditor<W> {
    pub fn new(sink: W, target: &Target, capture_filter: &str, no_prom: bool) -> Self {
        Self {
            sink,
            state: EditorState::Buffering,
            buffer: Vec::new(),
            info: TargetInfo::new(target, capture_filter, no_prom),
        }
    }

    /// Feeds stream data through the editor into the sink.
    ///
    /// While the SHB is still incomplete nothing reaches the sink, yet the
    /// full length of `data` is reported as written.
    ///
    /// Errors
    /// - Any sink write or flush error, unchanged, so callers can tell a
    ///   closed sink (`BrokenPipe`) from other failures.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let out = self.process(data);
        if !out.is_empty() {
            if let Err(e) = self.sink.write_all(&out).await {
                debug!("pcapng stream broken: {}", e);
                return Err(e);
            }
            self.sink.flush().await?;
        }
        Ok(data.len())
    }

    /// True once the SHB has been handled and data passes through unmodified.
    pub fn is_pass_through(&self) -> bool {
        self.state == EditorState::PassThrough
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W> StreamEditor<W> {
    /// Runs `data` through the editing state machine, returning what should
    /// go out to the sink now.
    fn process<'a>(&mut self, data: &'a [u8]) -> Cow<'a, [u8]> {
        if self.state == EditorState::PassThrough {
            return Cow::Borrowed(data);
        }
        self.buffer.extend_from_slice(data);

        if self.state == EditorState::Buffering {
            if self.buffer.len() < 12 {
                return Cow::Borrowed(&[]);
            }
            match detect_framing(&self.buffer) {
                Ok((endian, block_len)) => {
                    debug!(
                        "section header block: {:?} endian, {} octets",
                        endian, block_len
                    );
                    self.state = EditorState::Accumulating { endian, block_len };
                }
                Err(e) => {
                    warn!("invalid packet capture stream, passing through unmodified: {}", e);
                    return Cow::Owned(self.give_up());
                }
            }
        }

        if let EditorState::Accumulating { endian, block_len } = self.state {
            if self.buffer.len() >= block_len {
                return match self.rewrite_header_block(endian, block_len) {
                    Ok(out) => {
                        self.state = EditorState::PassThrough;
                        self.buffer = Vec::new();
                        Cow::Owned(out)
                    }
                    Err(e) => {
                        warn!("cannot edit section header block, passing through unmodified: {}", e);
                        Cow::Owned(self.give_up())
                    }
                };
            }
        }
        Cow::Borrowed(&[])
    }

    /// Switches into pass-through, returning everything buffered so far.
    fn give_up(&mut self) -> Vec<u8> {
        self.state = EditorState::PassThrough;
        mem::take(&mut self.buffer)
    }

    /// Builds the edited SHB from the first `block_len` buffered octets, with
    /// any further buffered octets appended unexamined.
    fn rewrite_header_block(&self, endian: Endian, block_len: usize) -> Result<Vec<u8>, PcapngError> {
        let shb = &self.buffer[..block_len];
        let major = endian.read_u16(&shb[12..14]);
        let minor = endian.read_u16(&shb[14..16]);
        let section_len = endian.read_u64(&shb[16..24]);
        if section_len == UNKNOWN_SECTION_LENGTH {
            debug!("section header block: version {}.{}, unknown section length", major, minor);
        } else {
            debug!(
                "section header block: version {}.{}, section length {}",
                major, minor, section_len
            );
        }

        // The options end where the trailing block length starts.
        let options_end = block_len - 4;
        let mut offset = SHB_FIXED_LEN;
        let mut options = Vec::new();
        let mut first_comment: Option<BlockOption> = None;
        while offset < options_end {
            let (opt, skip) = BlockOption::decode(&shb[offset..options_end], endian)?;
            offset += skip;
            let Some(opt) = opt else {
                break;
            };
            if opt.is_text() {
                trace!("option type {}: {:?}", opt.code, opt.text());
            } else {
                trace!("option type {}: {} octets", opt.code, opt.value.len());
            }
            if opt.code == OPT_COMMENT && first_comment.is_none() {
                first_comment = Some(opt);
            } else {
                options.push(opt);
            }
        }

        if first_comment.is_some() {
            debug!("updating existing SHB comment with capture target information");
        } else {
            debug!("creating fresh SHB comment with capture target information");
        }
        let existing = first_comment.as_ref().map(|c| c.value.as_slice());
        let comment = metadata::annotate(existing, &self.info);
        options.insert(0, BlockOption::new(OPT_COMMENT, comment));

        let mut encoded_opts = Vec::new();
        for opt in &options {
            opt.encode_into(endian, &mut encoded_opts)?;
        }
        let new_len = SHB_MIN_LEN + encoded_opts.len();
        let new_len_field =
            u32::try_from(new_len).map_err(|_| PcapngError::OptionTooLong(encoded_opts.len()))?;

        let overflow = &self.buffer[block_len..];
        let mut out = Vec::with_capacity(new_len + overflow.len());
        out.extend_from_slice(&SHB_BLOCK_TYPE);
        endian.put_u32(&mut out, new_len_field);
        endian.put_u32(&mut out, BYTE_ORDER_MAGIC);
        endian.put_u16(&mut out, major);
        endian.put_u16(&mut out, minor);
        // The block changed size, so the old section length no longer holds.
        endian.put_u64(&mut out, UNKNOWN_SECTION_LENGTH);
        out.extend_from_slice(&encoded_opts);
        endian.put_u32(&mut out, new_len_field);
        out.extend_from_slice(overflow);
        Ok(out)
    }
}

/// Checks the SHB block type and detects byte order and block length from
/// the first 12 octets of a stream.
fn detect_framing(head: &[u8]) -> Result<(Endian, usize), PcapngError> {
    let mut block_type = [0u8; 4];
    block_type.copy_from_slice(&head[0..4]);
    if block_type != SHB_BLOCK_TYPE {
        return Err(PcapngError::InvalidBlockType(block_type));
    }
    let endian = Endian::from_magic(&head[8..12]).ok_or_else(|| {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[8..12]);
        PcapngError::UnknownByteOrder(magic)
    })?;
    let declared = endian.read_u32(&head[4..8]);
    let block_len = declared as usize;
    if block_len < SHB_MIN_LEN || block_len % 4 != 0 || block_len > SHB_MAX_LEN {
        return Err(PcapngError::BadBlockLength(declared));
    }
    Ok((endian, block_len))
}
