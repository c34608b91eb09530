//! Navigation-unit text protocol: `$<content>*<checksum>` frames.

pub mod checksum;
pub mod decoder;
pub mod frame;

pub use checksum::ChecksumCodec;
pub use decoder::{AsyncStreamDecoder, ChannelMatrix, DecodeReport};
pub use frame::{sanitize_line, FrameKind, FrameParser, RawFrame, REGISTER_READ_HEADER};
