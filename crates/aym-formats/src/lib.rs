//! Chiptune Format Detection and Decoding
//!
//! Recognizes binary chiptune modules, disk images and archives by byte
//! signatures and decodes them into normalized models:
//!
//! - **Track modules** (SoundTracker, ProTracker 2): patterns, samples,
//!   ornaments and positions in a [`track::TrackModel`]
//! - **Register streams** (AYC, PSG, YM, FYM): per-frame register snapshots in
//!   a [`stream::StreamModel`]
//! - **Packed data** (FDI, Hobeta): unpacked bytes
//! - **Catalogues** (SCL, TRD, ZXZip): file entries
//!
//! All decoders are registered in a static [`catalog`] enumerated in a fixed
//! order. Decoding never panics on malformed input; failures are reported as
//! `None` at the decoder boundary and logged at debug level.
//!
//! # Quick start
//! ```
//! use aym_common::BasicMetadata;
//! use aym_formats::catalog;
//!
//! let data = b"PSG\x1a\0\0\0\0\0\0\0\0\0\0\0\0\xff\x00\x10\x07\x38\xff\xfd";
//! let mut meta = BasicMetadata::new();
//! let (descriptor, decoded) = catalog::detect(data, &mut meta).unwrap();
//! assert_eq!(descriptor.id, "PSG");
//! assert_eq!(decoded.used_size, data.len());
//! ```
//!
//! # Crate feature flags
//! - `lha` (default): transparent unpacking of LHA-compressed YM files

#![warn(missing_docs)]

pub mod binary;
pub mod catalog;
pub mod chiptune;
pub mod io;
pub mod location;
pub mod packed;
pub mod stream;
pub mod track;

use binary::PatternError;

/// Error type for format decoding
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// Buffer too small for the requested structure
    #[error("unexpected end of data at offset 0x{offset:04x} (need {needed} bytes)")]
    UnexpectedEof {
        /// Offset of the access
        offset: usize,
        /// Bytes requested
        needed: usize,
    },

    /// Structural inconsistency
    #[error("invalid data: {msg}")]
    InvalidData {
        /// Human-readable explanation
        msg: String,
    },

    /// Stored checksum differs from the computed one
    #[error("checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch {
        /// Value stored in the data
        stored: u32,
        /// Value computed over the data
        computed: u32,
    },

    /// Decompression error (LHA, zlib)
    #[error("decompression error: {0}")]
    DecompressionError(String),

    /// Recognized but unsupported variant
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// IO error from temporary files or compression streams
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid signature pattern
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),
}

impl From<String> for FormatError {
    fn from(msg: String) -> Self {
        FormatError::InvalidData { msg }
    }
}

impl From<&str> for FormatError {
    fn from(msg: &str) -> Self {
        FormatError::InvalidData {
            msg: msg.to_string(),
        }
    }
}

/// Result type for format decoding
pub type Result<T> = std::result::Result<T, FormatError>;

/// Fail with [`FormatError::InvalidData`] unless `condition` holds
pub(crate) fn require(condition: bool, msg: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(msg.into())
    }
}

// Public API exports
pub use binary::Format;
pub use catalog::{Capabilities, CatalogueEntry, Content, Decoded, Decoder, Descriptor};
pub use location::{Location, NodeId};
pub use stream::{StreamFrame, StreamModel};
pub use track::TrackModel;
