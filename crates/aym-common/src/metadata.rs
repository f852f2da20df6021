//! Module metadata: decode-time sink and playback-time accessors.

/// Sink receiving metadata strings while a module is decoded.
///
/// Decoders call these as soon as the corresponding field is parsed; a
/// decode that later fails may therefore leave partial metadata behind.
pub trait MetaBuilder {
    /// Tracker or packer that produced the module (e.g. "SoundTracker").
    fn set_program(&mut self, program: &str);

    /// Song title.
    fn set_title(&mut self, title: &str);

    /// Author/composer name.
    fn set_author(&mut self, author: &str);

    /// Free-form comment.
    fn set_comment(&mut self, _comment: &str) {}
}

/// Metadata sink discarding everything.
impl MetaBuilder for () {
    fn set_program(&mut self, _program: &str) {}
    fn set_title(&mut self, _title: &str) {}
    fn set_author(&mut self, _author: &str) {}
}

/// Song metadata as seen by a player
pub trait MetadataFields {
    /// Song title
    fn title(&self) -> &str;

    /// Author
    fn author(&self) -> &str;

    /// Free-form comment, empty when absent
    fn comments(&self) -> &str {
        ""
    }

    /// Producing tracker or compiler, e.g. "ProTracker 2"
    fn program(&self) -> &str;

    /// Frames of a single pass
    fn frame_count(&self) -> Option<usize> {
        None
    }

    /// Player frames per second
    fn frame_rate(&self) -> u32 {
        crate::FRAME_RATE_PAL
    }

    /// `frame_count / frame_rate`
    fn duration_seconds(&self) -> Option<f32> {
        self.frame_count()
            .map(|fc| fc as f32 / self.frame_rate().max(1) as f32)
    }

    /// Frame playback restarts from
    fn loop_frame(&self) -> Option<usize> {
        None
    }
}

/// Marker over [`MetadataFields`] used as player bound.
pub trait PlaybackMetadata: MetadataFields {}

impl<T: MetadataFields> PlaybackMetadata for T {}

/// Basic metadata container, filled by decoders and read by players.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicMetadata {
    /// Song title.
    pub title: String,
    /// Author/composer name.
    pub author: String,
    /// Additional comments.
    pub comments: String,
    /// Producing program.
    pub program: String,
    /// Total frame count.
    pub frame_count: Option<usize>,
    /// Playback frame rate in Hz.
    pub frame_rate: u32,
    /// Loop start frame.
    pub loop_frame: Option<usize>,
}

impl BasicMetadata {
    /// Empty metadata at the PAL frame rate
    pub fn new() -> Self {
        Self {
            frame_rate: crate::FRAME_RATE_PAL,
            ..Default::default()
        }
    }
}

impl MetaBuilder for BasicMetadata {
    fn set_program(&mut self, program: &str) {
        self.program = program.to_string();
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.trim_end().to_string();
    }

    fn set_author(&mut self, author: &str) {
        self.author = author.trim_end().to_string();
    }

    fn set_comment(&mut self, comment: &str) {
        self.comments = comment.to_string();
    }
}

impl MetadataFields for BasicMetadata {
    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn comments(&self) -> &str {
        &self.comments
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn loop_frame(&self) -> Option<usize> {
        self.loop_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_trims_padding() {
        let mut meta = BasicMetadata::new();
        meta.set_title("Tune     ");
        meta.set_author("Someone");
        meta.set_program("SoundTracker");
        assert_eq!(meta.title(), "Tune");
        assert_eq!(meta.author(), "Someone");
        assert_eq!(meta.program(), "SoundTracker");
    }

    #[test]
    fn test_duration() {
        let meta = BasicMetadata {
            frame_count: Some(150),
            ..BasicMetadata::new()
        };
        assert_eq!(meta.duration_seconds(), Some(3.0));
        assert_eq!(BasicMetadata::new().duration_seconds(), None);
    }
}
