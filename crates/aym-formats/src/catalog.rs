//! Decoder catalog
//!
//! Every supported format is described by a [`Descriptor`]. The catalog is
//! built once on first access and enumerated in registration order, which
//! is also the order [`detect`] tries the decoders in.

use std::sync::OnceLock;

use aym_common::MetaBuilder;
use bitflags::bitflags;

use crate::binary::Format;
use crate::chiptune::{ayc, fym, protracker2, psg, soundtracker, ym};
use crate::packed::{fdi, hobeta, scl, trd, zxzip};
use crate::stream::StreamModel;
use crate::track::TrackModel;
use crate::Result;

bitflags! {
    /// What a format provides and how it can be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Playable module
        const MODULE = 1 << 0;
        /// Holds other data (disk images, archives)
        const CONTAINER = 1 << 1;
        /// Holds several files
        const MULTITRACK = 1 << 2;
        /// Plays on the AY/YM chip
        const DEVICE_AYM = 1 << 3;
        /// Raw data can be extracted as is
        const CONVERT_RAW = 1 << 4;
        /// Convertible to an FYM register dump
        const CONVERT_FYM = 1 << 5;
    }
}

/// File stored in a catalogue container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueEntry {
    /// Entry name as used in location subpaths
    pub name: String,
    /// Entry content
    pub data: Vec<u8>,
}

/// Decoded payload
#[derive(Debug, Clone)]
pub enum Content {
    /// Tracker song
    Track(TrackModel),
    /// Register stream
    Stream(StreamModel),
    /// Unpacked bytes
    Packed(Vec<u8>),
    /// Container files
    Catalogue(Vec<CatalogueEntry>),
}

/// Successful decode
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Payload
    pub content: Content,
    /// Bytes of the input that belong to the format
    pub used_size: usize,
    /// CRC32 of the format's fixed region, when it has one
    pub fixed_checksum: Option<u32>,
}

/// Format detection and decoding
pub trait Decoder: Send + Sync {
    /// Detection signature
    fn format(&self) -> &Format;

    /// Cheap structural check, no side effects
    fn check(&self, data: &[u8]) -> bool;

    /// Decode `data`, reporting metadata into `meta`; `None` if the data is
    /// not in this format
    fn decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded>;
}

/// Registered format
pub struct Descriptor {
    /// Short identifier, also used as location subpath component
    pub id: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Capability flags
    pub capabilities: Capabilities,
    /// Implementation
    pub decoder: Box<dyn Decoder>,
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl Descriptor {
    fn new(
        id: &'static str,
        description: &'static str,
        capabilities: Capabilities,
        decoder: impl Decoder + 'static,
    ) -> Self {
        Self {
            id,
            description,
            capabilities,
            decoder: Box::new(decoder),
        }
    }

    /// Check then decode
    pub fn try_decode(&self, data: &[u8], meta: &mut dyn MetaBuilder) -> Option<Decoded> {
        if self.decoder.check(data) {
            self.decoder.decode(data, meta)
        } else {
            None
        }
    }
}

const TRACK_MODULE: Capabilities = Capabilities::MODULE
    .union(Capabilities::DEVICE_AYM)
    .union(Capabilities::CONVERT_RAW)
    .union(Capabilities::CONVERT_FYM);

const STREAM_MODULE: Capabilities = TRACK_MODULE;

fn register() -> Vec<Descriptor> {
    vec![
        Descriptor::new(
            "ST1",
            "SoundTracker v1.x uncompiled",
            TRACK_MODULE,
            soundtracker::st1::St1Decoder::new(),
        ),
        Descriptor::new(
            "STC",
            "SoundTracker v1.x compiled",
            TRACK_MODULE,
            soundtracker::stc::StcDecoder::new(),
        ),
        Descriptor::new(
            "PT2",
            "ProTracker v2.x",
            TRACK_MODULE,
            protracker2::Pt2Decoder::new(),
        ),
        Descriptor::new(
            "AYC",
            "CPC AY Chip Compiler",
            STREAM_MODULE,
            ayc::AycDecoder::new(),
        ),
        Descriptor::new(
            "PSG",
            "PSG register dump",
            STREAM_MODULE,
            psg::PsgDecoder::new(),
        ),
        Descriptor::new(
            "YM",
            "Atari ST YM register dump",
            STREAM_MODULE,
            ym::YmDecoder::new(),
        ),
        Descriptor::new(
            "FYM",
            "Compressed register dump",
            STREAM_MODULE,
            fym::FymDecoder::new(),
        ),
        Descriptor::new(
            "FDI",
            "Full Disk Image",
            Capabilities::CONTAINER,
            fdi::FdiDecoder::new(),
        ),
        Descriptor::new(
            "HOBETA",
            "Hobeta file",
            Capabilities::CONTAINER,
            hobeta::HobetaDecoder::new(),
        ),
        Descriptor::new(
            "SCL",
            "Sinclair TR-DOS archive",
            Capabilities::CONTAINER.union(Capabilities::MULTITRACK),
            scl::SclDecoder::new(),
        ),
        Descriptor::new(
            "TRD",
            "TR-DOS disk image",
            Capabilities::CONTAINER.union(Capabilities::MULTITRACK),
            trd::TrdDecoder::new(),
        ),
        Descriptor::new(
            "ZXZIP",
            "ZXZip archive",
            Capabilities::CONTAINER.union(Capabilities::MULTITRACK),
            zxzip::ZxZipDecoder::new(),
        ),
    ]
}

/// All decoders in registration order
pub fn decoders() -> &'static [Descriptor] {
    static CATALOG: OnceLock<Vec<Descriptor>> = OnceLock::new();
    CATALOG.get_or_init(register)
}

/// Decoder by id (case-insensitive)
pub fn find(id: &str) -> Option<&'static Descriptor> {
    decoders().iter().find(|d| d.id.eq_ignore_ascii_case(id))
}

/// Try every decoder in order; first successful decode wins
pub fn detect(data: &[u8], meta: &mut dyn MetaBuilder) -> Option<(&'static Descriptor, Decoded)> {
    decoders().iter().find_map(|descriptor| {
        descriptor
            .try_decode(data, meta)
            .map(|decoded| (descriptor, decoded))
    })
}

/// Convert an internal decode result into the boundary `Option`
pub(crate) fn report(id: &str, result: Result<Decoded>) -> Option<Decoded> {
    match result {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            log::debug!("{id}: rejected input: {e}");
            None
        }
    }
}
