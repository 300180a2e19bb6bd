//! pcapng section header block editing.
//!
//! The capture services stream plain pcapng. Before handing the stream to its
//! final destination, [`StreamEditor`] rewrites the leading section header
//! block (SHB) so that its first comment option carries a YAML description of
//! the capture target, and then stays out of the way.
//!
//! Re-exports:
//! - [`StreamEditor`]: the one-shot SHB rewriting writer.
//! - [`BlockOption`], [`Endian`]: option codec and byte order handling.
//! - [`TargetInfo`]: the metadata written into the SHB comment.

pub mod block_option;
pub mod endian;
pub mod metadata;
pub mod stream_editor;

pub use block_option::BlockOption;
pub use endian::Endian;
pub use metadata::TargetInfo;
pub use stream_editor::StreamEditor;

/// Block type of a section header block, identical in both byte orders.
pub const SHB_BLOCK_TYPE: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
/// Byte-order magic, as written in the section's byte order.
pub const BYTE_ORDER_MAGIC: u32 = 0x1a2b3c4d;
/// Section length value signalling "unknown".
pub const UNKNOWN_SECTION_LENGTH: u64 = u64::MAX;
/// Length of the fixed SHB fields preceding the options.
pub const SHB_FIXED_LEN: usize = 24;
/// Smallest possible SHB: fixed fields plus the trailing block length.
pub const SHB_MIN_LEN: usize = SHB_FIXED_LEN + 4;
/// Largest SHB we are willing to buffer before giving up on editing.
pub const SHB_MAX_LEN: usize = 16 * 1024 * 1024;
