//! Packed data and containers
//!
//! [`lz`] holds the LZ stream decoder and the depacking primitives shared
//! by packed streams. The remaining modules decode ZX Spectrum disk images
//! and archives: [`fdi`] and [`hobeta`] unpack to a single byte buffer,
//! [`scl`], [`trd`] and [`zxzip`] list the files they hold.

pub mod fdi;
pub mod hobeta;
#[cfg(feature = "lha")]
pub mod lha;
pub mod lz;
pub mod scl;
pub mod trd;
mod trdos;
pub mod zxzip;
