//! Device trait abstraction
//!
//! Anything driven by a stream of [`DataChunk`]s implements [`AymDevice`]:
//! the sound-producing [`crate::Chip`] as well as register dumpers such as
//! [`crate::FymDumper`]. Replayers are written against this trait.

use crate::registers::{DataChunk, REGISTERS_COUNT};

/// Consumer of timed register updates
pub trait AymDevice {
    /// Apply `chunk` and process everything up to `chunk.tick`
    fn render_data(&mut self, chunk: &DataChunk);

    /// Back to power-on state
    fn reset(&mut self);

    /// Current register file
    fn dump_registers(&self) -> [u8; REGISTERS_COUNT];

    /// Notify that no more chunks follow for now
    fn flush(&mut self) {}
}

impl<D: AymDevice + ?Sized> AymDevice for &mut D {
    fn render_data(&mut self, chunk: &DataChunk) {
        (**self).render_data(chunk);
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn dump_registers(&self) -> [u8; REGISTERS_COUNT] {
        (**self).dump_registers()
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

impl<D: AymDevice + ?Sized> AymDevice for Box<D> {
    fn render_data(&mut self, chunk: &DataChunk) {
        (**self).render_data(chunk);
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn dump_registers(&self) -> [u8; REGISTERS_COUNT] {
        (**self).dump_registers()
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}
