//! TR-DOS catalogue entries shared by SCL and TRD

use crate::io::{fixed_string, ByteView};
use crate::Result;

/// Bytes per sector
pub(crate) const SECTOR_SIZE: usize = 256;

const NAME_SIZE: usize = 8;
const TYPE_OFFSET: usize = 8;
const SECTORS_OFFSET: usize = 13;

/// Name byte marking the end of the catalogue
pub(crate) const END_OF_CATALOGUE: u8 = 0x00;
/// Name byte marking a deleted entry
pub(crate) const DELETED: u8 = 0x01;

/// Common part of a catalogue entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileEntry {
    pub name: String,
    pub sectors: usize,
}

impl FileEntry {
    /// Entry at `offset`; `name.t` with unprintable characters replaced
    pub(crate) fn read(view: &ByteView<'_>, offset: usize) -> Result<Self> {
        let name = fixed_string(view.slice(offset, NAME_SIZE)?);
        let name: String = name
            .chars()
            .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
            .collect();
        let kind = view.read_u8(offset + TYPE_OFFSET)?;
        let kind = if kind.is_ascii_graphic() { kind as char } else { '_' };
        Ok(Self {
            name: format!("{}.{kind}", name.trim_end()),
            sectors: usize::from(view.read_u8(offset + SECTORS_OFFSET)?),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.sectors * SECTOR_SIZE
    }
}

/// Make `name` unique among `taken` by appending `~N`
pub(crate) fn unique_name(name: String, taken: &[String]) -> String {
    if !taken.contains(&name) {
        return name;
    }
    let mut idx = 1;
    loop {
        let candidate = format!("{name}~{idx}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        idx += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name() {
        let mut raw = b"TUNE    C".to_vec();
        raw.extend_from_slice(&[0, 0, 0, 0, 3]);
        let entry = FileEntry::read(&ByteView::new(&raw), 0).unwrap();
        assert_eq!(entry.name, "TUNE.C");
        assert_eq!(entry.size(), 768);

        raw[2] = 0x07;
        raw[8] = 0x00;
        let entry = FileEntry::read(&ByteView::new(&raw), 0).unwrap();
        assert_eq!(entry.name, "TU_E._");
    }

    #[test]
    fn test_unique_name() {
        let taken = vec!["A.C".to_string(), "A.C~1".to_string()];
        assert_eq!(unique_name("B.C".into(), &taken), "B.C");
        assert_eq!(unique_name("A.C".into(), &taken), "A.C~2");
    }
}
