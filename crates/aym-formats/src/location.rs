//! Nested data locations
//!
//! A location addresses data inside containers with `?`-separated
//! subpaths, e.g. `HOBETA?TUNE.C` names the file `TUNE.C` of the catalogue
//! stored in a Hobeta file. Every opened component becomes a node of an
//! arena; nodes own their bytes and refer to their parent by index.

use crate::catalog::{self, Capabilities, Content, Descriptor};
use crate::{FormatError, Result};

/// Separator of subpath components
pub const SUBPATH_DELIMITER: char = '?';

/// Split a subpath into components; empty for an empty subpath
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(SUBPATH_DELIMITER).collect()
    }
}

/// Join components into a subpath
pub fn combine_path<S: AsRef<str>>(components: &[S]) -> String {
    components
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("?")
}

/// Node handle inside a [`Location`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    parent: Option<NodeId>,
    component: String,
}

/// Arena of data nodes rooted at the initial buffer
#[derive(Debug)]
pub struct Location {
    nodes: Vec<Node>,
}

impl Location {
    /// Location holding `data` as its root
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            nodes: vec![Node {
                data,
                parent: None,
                component: String::new(),
            }],
        }
    }

    /// Root node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Nodes count
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bytes of `node`
    pub fn data(&self, node: NodeId) -> &[u8] {
        &self.nodes[node.0].data
    }

    /// Node `node` was opened from
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Subpath leading from the root to `node`
    pub fn path(&self, node: NodeId) -> String {
        let mut components = Vec::new();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let current = &self.nodes[id.0];
            if current.parent.is_some() {
                components.push(current.component.as_str());
            }
            cursor = current.parent;
        }
        components.reverse();
        combine_path(&components)
    }

    /// Open one subpath component of `node`: a packed format id or the
    /// name of a catalogue entry
    pub fn open_subpath(&mut self, node: NodeId, component: &str) -> Result<NodeId> {
        if let Some(existing) = self.find_child(node, component) {
            return Ok(existing);
        }
        let data = self.data(node);
        let (component, unpacked) = match catalog::find(component).filter(|d| is_packed(d)) {
            Some(descriptor) => (descriptor.id.to_string(), unpack(descriptor, data)?),
            None => (component.to_string(), extract(data, component)?),
        };
        log::debug!("opened {component:?} from node {}", node.0);
        Ok(self.push(node, component, unpacked))
    }

    /// Open every component of `path` starting at `node`
    pub fn open_path(&mut self, node: NodeId, path: &str) -> Result<NodeId> {
        split_path(path)
            .into_iter()
            .try_fold(node, |current, component| self.open_subpath(current, component))
    }

    fn find_child(&self, node: NodeId, component: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.parent == Some(node) && n.component == component)
            .map(NodeId)
    }

    fn push(&mut self, parent: NodeId, component: String, data: Vec<u8>) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            component,
        });
        NodeId(self.nodes.len() - 1)
    }
}

fn is_packed(descriptor: &Descriptor) -> bool {
    descriptor.capabilities.contains(Capabilities::CONTAINER)
        && !descriptor.capabilities.contains(Capabilities::MULTITRACK)
}

fn unpack(descriptor: &Descriptor, data: &[u8]) -> Result<Vec<u8>> {
    let mut meta = ();
    match descriptor.try_decode(data, &mut meta) {
        Some(decoded) => match decoded.content {
            Content::Packed(unpacked) => Ok(unpacked),
            _ => Err(FormatError::Unsupported(format!(
                "{} does not hold packed data",
                descriptor.id
            ))),
        },
        None => Err(format!("data is not in {} format", descriptor.id).into()),
    }
}

/// Entry `name` of the first catalogue format recognizing `data`
fn extract(data: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut meta = ();
    let files = catalog::decoders()
        .iter()
        .filter(|d| d.capabilities.contains(Capabilities::MULTITRACK))
        .find_map(|d| match d.try_decode(data, &mut meta)?.content {
            Content::Catalogue(files) => Some(files),
            _ => None,
        })
        .ok_or_else(|| FormatError::from(format!("no catalogue to open {name:?} from")))?;
    files
        .into_iter()
        .find(|file| file.name == name)
        .map(|file| file.data)
        .ok_or_else(|| format!("no entry {name:?}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packed::{hobeta, scl};

    #[test]
    fn test_split_and_combine() {
        assert!(split_path("").is_empty());
        assert_eq!(split_path("SCL?A.C"), vec!["SCL", "A.C"]);
        assert_eq!(combine_path(&["HOBETA", "A.C"]), "HOBETA?A.C");
        assert_eq!(combine_path::<&str>(&[]), "");
    }

    #[test]
    fn test_nested_open() {
        let archive = scl::build(&[
            (b"TUNE    ", b'C', vec![7; 256]),
            (b"OTHER   ", b'C', vec![9; 256]),
        ]);
        let packed = hobeta::pack(b"ARCHIVE ", b'S', &archive);
        let mut location = Location::new(packed);
        let root = location.root();

        let file = location.open_path(root, "hobeta?TUNE.C").unwrap();
        assert_eq!(location.data(file), &[7; 256][..]);
        assert_eq!(location.path(file), "HOBETA?TUNE.C");
        let unpacked = location.parent(file).unwrap();
        assert_eq!(location.data(unpacked), &archive[..]);
        assert_eq!(location.parent(unpacked), Some(root));
        assert_eq!(location.path(root), "");

        // reopening reuses nodes
        let again = location.open_subpath(unpacked, "TUNE.C").unwrap();
        assert_eq!(again, file);
        assert_eq!(location.len(), 3);
    }

    #[test]
    fn test_open_errors() {
        let mut location = Location::new(vec![0; 64]);
        let root = location.root();
        assert!(location.open_subpath(root, "HOBETA").is_err());
        assert!(location.open_subpath(root, "TUNE.C").is_err());
        assert!(matches!(
            location.open_subpath(root, "PSG"),
            Err(FormatError::InvalidData { .. })
        ));
        assert_eq!(location.len(), 1);
    }
}
