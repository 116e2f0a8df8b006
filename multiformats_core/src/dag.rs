//! Merkle DAG nodes and links.
//!
//! Wire format (protobuf-style tagged fields):
//!
//! ```text
//! DagLink  field 1  bytes   target CID
//!          field 2  string  name (absent when the name is None)
//!          field 3  varint  size of the target
//! DagNode  field 2  bytes   one DagLink per link, in canonical order
//!          field 1  bytes   data, only when non-empty, always last
//! ```
//!
//! Links are kept sorted by name, a missing name sorting as `""`. A node's
//! id is the hash of its own serialization and is computed at most once.

use crate::cid::Cid;
use crate::error::{Error, Result};
use crate::hashing::DEFAULT_HASHING_ALGORITHM;
use crate::multihash::MultiHash;
use crate::registry::Registries;
use crate::varint;
use crate::wire::{self, WireType};
use bytes::Bytes;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};
use tracing::trace;

/// A named, sized reference to another node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagLink {
    name: Option<String>,
    id: Cid,
    size: u64,
}

impl DagLink {
    pub fn new(name: Option<String>, id: Cid, size: u64) -> Self {
        Self { name, id, size }
    }

    /// Link name. `None` and `Some("")` are different names that sort together.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// CID of the target node.
    pub fn id(&self) -> &Cid {
        &self.id
    }

    /// Serialized size of the target node.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn sort_key(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(other.sort_key())
            .then_with(|| self.name.is_some().cmp(&other.name.is_some()))
            .then_with(|| self.id.to_bytes().cmp(&other.id.to_bytes()))
            .then_with(|| self.size.cmp(&other.size))
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        wire::write_bytes_field(&mut buf, 1, &self.id.to_bytes());
        if let Some(name) = &self.name {
            wire::write_bytes_field(&mut buf, 2, name.as_bytes());
        }
        wire::write_varint_field(&mut buf, 3, self.size);
        buf
    }

    /// Parse the binary form using the process-wide registries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(Registries::global(), bytes)
    }

    /// Parse the binary form. Fields may come in any order; a missing target
    /// or an unknown field fails with `InvalidData`.
    pub fn from_bytes_with(registries: &Registries, bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let mut id = None;
        let mut name = None;
        let mut size = 0;

        while let Some((field, wire_type)) = wire::read_tag(&mut reader)? {
            match field {
                1 => {
                    wire::expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    let cid = wire::read_length_prefixed(&mut reader)?;
                    id = Some(Cid::from_bytes_with(registries, cid)?);
                }
                2 => {
                    wire::expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    let text = wire::read_length_prefixed(&mut reader)?;
                    let text = std::str::from_utf8(text)
                        .map_err(|e| Error::invalid_data(format!("Link name is not UTF-8: {}", e)))?;
                    name = Some(text.to_string());
                }
                3 => {
                    wire::expect_wire_type(field, wire_type, WireType::Varint)?;
                    size = varint::read_u64(&mut reader)?;
                }
                _ => {
                    return Err(Error::invalid_data(format!(
                        "Unknown DagLink field {}",
                        field
                    )));
                }
            }
        }

        let id = id.ok_or_else(|| Error::invalid_data("DagLink has no target"))?;
        Ok(Self { name, id, size })
    }
}

/// An immutable Merkle DAG node.
#[derive(Clone)]
pub struct DagNode {
    data: Bytes,
    links: Vec<DagLink>,
    hashing_algorithm: String,
    id: OnceCell<Cid>,
    size: OnceCell<u64>,
}

impl DagNode {
    /// Create a node hashed with the default algorithm.
    pub fn new(data: impl Into<Bytes>, links: impl IntoIterator<Item = DagLink>) -> Self {
        Self::with_algorithm(data, links, DEFAULT_HASHING_ALGORITHM)
    }

    /// Create a node whose id is computed with the named hashing algorithm.
    ///
    /// The name is resolved when the id is first requested.
    pub fn with_algorithm(
        data: impl Into<Bytes>,
        links: impl IntoIterator<Item = DagLink>,
        algorithm: &str,
    ) -> Self {
        Self::build(data.into(), links.into_iter().collect(), algorithm.to_string())
    }

    /// Create a node with a known id; its algorithm is taken from the id.
    pub fn with_id(
        data: impl Into<Bytes>,
        links: impl IntoIterator<Item = DagLink>,
        id: Cid,
    ) -> Self {
        let node = Self::build(
            data.into(),
            links.into_iter().collect(),
            id.hash().algorithm().name().to_string(),
        );
        // A fresh cell is always empty.
        let _ = node.id.set(id);
        node
    }

    fn build(data: Bytes, mut links: Vec<DagLink>, hashing_algorithm: String) -> Self {
        links.sort_by(DagLink::canonical_cmp);
        Self {
            data,
            links,
            hashing_algorithm,
            id: OnceCell::new(),
            size: OnceCell::new(),
        }
    }

    fn derive(&self, links: Vec<DagLink>) -> Self {
        Self::build(self.data.clone(), links, self.hashing_algorithm.clone())
    }

    /// The opaque payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Links in canonical order.
    pub fn links(&self) -> &[DagLink] {
        &self.links
    }

    /// Name of the algorithm the id is computed with.
    pub fn hashing_algorithm(&self) -> &str {
        &self.hashing_algorithm
    }

    /// A copy with one more link.
    pub fn add_link(&self, link: DagLink) -> Self {
        self.add_links([link])
    }

    /// A copy with more links.
    pub fn add_links(&self, links: impl IntoIterator<Item = DagLink>) -> Self {
        let mut all = self.links.clone();
        all.extend(links);
        self.derive(all)
    }

    /// A copy without links to `target`.
    pub fn remove_link(&self, target: &Cid) -> Self {
        self.remove_links([target])
    }

    /// A copy without links to any of `targets`.
    pub fn remove_links<'a>(&self, targets: impl IntoIterator<Item = &'a Cid>) -> Self {
        let targets: Vec<&Cid> = targets.into_iter().collect();
        let kept = self
            .links
            .iter()
            .filter(|link| !targets.contains(&link.id()))
            .cloned()
            .collect();
        self.derive(kept)
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for link in &self.links {
            wire::write_bytes_field(&mut buf, 2, &link.to_bytes());
        }
        if !self.data.is_empty() {
            wire::write_bytes_field(&mut buf, 1, &self.data);
        }
        buf
    }

    /// Write the binary form.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Parse the binary form using the process-wide registries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(Registries::global(), bytes)
    }

    /// Parse the binary form.
    ///
    /// Parsing stops at the first data field. Unknown fields fail with
    /// `InvalidData`.
    pub fn from_bytes_with(registries: &Registries, bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let mut data: &[u8] = &[];
        let mut links = Vec::new();

        while let Some((field, wire_type)) = wire::read_tag(&mut reader)? {
            match field {
                1 => {
                    wire::expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    data = wire::read_length_prefixed(&mut reader)?;
                    break;
                }
                2 => {
                    wire::expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    let link = wire::read_length_prefixed(&mut reader)?;
                    links.push(DagLink::from_bytes_with(registries, link)?);
                }
                _ => {
                    return Err(Error::invalid_data(format!(
                        "Unknown DagNode field {}",
                        field
                    )));
                }
            }
        }

        Ok(Self::new(Bytes::copy_from_slice(data), links))
    }

    /// Read a whole node from a stream using the process-wide registries.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(Error::from_read)?;
        Self::from_bytes(&bytes)
    }

    /// Serialized length, computed once.
    pub fn size(&self) -> u64 {
        *self.size.get_or_init(|| self.to_bytes().len() as u64)
    }

    /// The node's CID, computed once, using the process-wide registries.
    pub fn id(&self) -> Result<&Cid> {
        self.id_with(Registries::global())
    }

    /// The node's CID: the hash of its serialization.
    ///
    /// Fails if the hashing algorithm is unknown or not implemented. The
    /// first successful call fixes the id: later calls return it unchanged,
    /// whatever registries they pass.
    pub fn id_with(&self, registries: &Registries) -> Result<&Cid> {
        self.id.get_or_try_init(|| {
            let bytes = self.to_bytes();
            let _ = self.size.set(bytes.len() as u64);
            let hash =
                MultiHash::compute_with(registries.hashing(), &bytes, &self.hashing_algorithm)?;
            let id = Cid::from_multihash_with(registries, hash)?;
            trace!(id = %id, size = bytes.len(), "computed dag node id");
            Ok::<_, Error>(id)
        })
    }

    /// A link to this node, using the process-wide registries.
    pub fn to_link(&self, name: Option<String>) -> Result<DagLink> {
        self.to_link_with(Registries::global(), name)
    }

    /// A link to this node carrying its id and size.
    pub fn to_link_with(&self, registries: &Registries, name: Option<String>) -> Result<DagLink> {
        let id = self.id_with(registries)?.clone();
        Ok(DagLink::new(name, id, self.size()))
    }
}

impl PartialEq for DagNode {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.links == other.links
            && self.hashing_algorithm == other.hashing_algorithm
    }
}

impl Eq for DagNode {}

impl fmt::Debug for DagNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagNode")
            .field("data_len", &self.data.len())
            .field("links", &self.links)
            .field("hashing_algorithm", &self.hashing_algorithm)
            .field("id", &self.id.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;

    const EMPTY_NODE: &str = "QmdfTbBqBPQ7VNxZEYEj14VmRuZBkqFbiwReogJgS1zR1n";
    const EMPTY_UNIXFS_DIR: &str = "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hA3Nn4";

    fn leaf(registries: &Registries, data: &'static [u8]) -> DagNode {
        let node = DagNode::new(data, []);
        node.id_with(registries).unwrap();
        node
    }

    fn link(registries: &Registries, name: Option<&str>, data: &'static [u8]) -> DagLink {
        leaf(registries, data)
            .to_link_with(registries, name.map(str::to_string))
            .unwrap()
    }

    #[test]
    fn test_empty_node() {
        let registries = Registries::with_defaults();
        let node = DagNode::new(Bytes::new(), []);
        assert!(node.to_bytes().is_empty());
        assert_eq!(node.size(), 0);
        assert_eq!(node.id_with(&registries).unwrap().encode(), EMPTY_NODE);
        assert_eq!(node.hashing_algorithm(), "sha2-256");
    }

    #[test]
    fn test_empty_unixfs_directory() {
        let registries = Registries::with_defaults();
        let node = DagNode::new(&b"\x08\x01"[..], []);
        assert_eq!(node.to_bytes(), vec![0x0A, 0x02, 0x08, 0x01]);
        assert_eq!(node.size(), 4);
        assert_eq!(node.id_with(&registries).unwrap().encode(), EMPTY_UNIXFS_DIR);
    }

    #[test]
    fn test_link_layout() {
        let registries = Registries::with_defaults();
        let id = Cid::decode_with(&registries, EMPTY_NODE).unwrap();
        let link = DagLink::new(Some("a".into()), id.clone(), 7);
        let bytes = link.to_bytes();

        assert_eq!(&bytes[..2], &[0x0A, 0x22]);
        assert_eq!(&bytes[2..36], id.to_bytes().as_slice());
        assert_eq!(&bytes[36..], &[0x12, 0x01, b'a', 0x18, 0x07]);
        assert_eq!(DagLink::from_bytes_with(&registries, &bytes).unwrap(), link);

        let unnamed = DagLink::new(None, id, 0);
        let bytes = unnamed.to_bytes();
        assert_eq!(&bytes[36..], &[0x18, 0x00]);
        assert_eq!(DagLink::from_bytes_with(&registries, &bytes).unwrap(), unnamed);
    }

    #[test]
    fn test_link_fields_any_order() {
        let registries = Registries::with_defaults();
        let id = Cid::decode_with(&registries, EMPTY_NODE).unwrap();
        let mut bytes = Vec::new();
        wire::write_varint_field(&mut bytes, 3, 9);
        wire::write_bytes_field(&mut bytes, 2, b"x");
        wire::write_bytes_field(&mut bytes, 1, &id.to_bytes());

        let link = DagLink::from_bytes_with(&registries, &bytes).unwrap();
        assert_eq!(link.name(), Some("x"));
        assert_eq!(link.size(), 9);
        assert_eq!(link.id(), &id);
    }

    #[test]
    fn test_link_errors() {
        let registries = Registries::with_defaults();
        let mut unknown = Vec::new();
        wire::write_varint_field(&mut unknown, 4, 1);
        let err = DagLink::from_bytes_with(&registries, &unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        let mut no_target = Vec::new();
        wire::write_varint_field(&mut no_target, 3, 1);
        let err = DagLink::from_bytes_with(&registries, &no_target).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_links_sorted_by_name() {
        let registries = Registries::with_defaults();
        let b = link(&registries, Some("b"), b"1");
        let a = link(&registries, Some("a"), b"2");
        let none = link(&registries, None, b"3");
        let empty = link(&registries, Some(""), b"4");

        let node = DagNode::new(Bytes::new(), vec![b, a, empty, none]);
        let names: Vec<Option<&str>> = node.links().iter().map(DagLink::name).collect();
        assert_eq!(names, [None, Some(""), Some("a"), Some("b")]);
    }

    #[test]
    fn test_node_roundtrip() {
        let registries = Registries::with_defaults();
        let node = DagNode::new(&b"payload"[..], [
            link(&registries, Some("one"), b"1"),
            link(&registries, Some("two"), b"2"),
        ]);
        let bytes = node.to_bytes();
        assert_eq!(bytes[0], 0x12);
        assert_eq!(&bytes[bytes.len() - 9..], b"\x0a\x07payload");

        let parsed = DagNode::from_bytes_with(&registries, &bytes).unwrap();
        assert_eq!(parsed, node);
        assert_eq!(parsed.id_with(&registries).unwrap(), node.id_with(&registries).unwrap());

        let mut buf = Vec::new();
        node.write_to(&mut buf).unwrap();
        assert_eq!(DagNode::read_from(&mut buf.as_slice()).unwrap(), node);
    }

    #[test]
    fn test_parse_stops_at_data() {
        let registries = Registries::with_defaults();
        let mut bytes = Vec::new();
        wire::write_bytes_field(&mut bytes, 1, b"data");
        wire::write_varint_field(&mut bytes, 9, 1);

        let node = DagNode::from_bytes_with(&registries, &bytes).unwrap();
        assert_eq!(node.data().as_ref(), b"data");

        let mut unknown = Vec::new();
        wire::write_varint_field(&mut unknown, 9, 1);
        let err = DagNode::from_bytes_with(&registries, &unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_mutators_return_new_nodes() {
        let registries = Registries::with_defaults();
        let base = DagNode::new(&b"shared"[..], []);
        let a = link(&registries, Some("a"), b"1");
        let b = link(&registries, Some("b"), b"2");

        let grown = base.add_link(b.clone()).add_links([a.clone()]);
        assert!(base.links().is_empty());
        assert_eq!(grown.links(), &[a.clone(), b.clone()]);
        assert_eq!(grown.data().as_ptr(), base.data().as_ptr());

        let shrunk = grown.remove_link(a.id());
        assert_eq!(shrunk.links(), &[b.clone()]);
        let empty = grown.remove_links([a.id(), b.id()]);
        assert!(empty.links().is_empty());
        assert_eq!(
            empty.id_with(&registries).unwrap(),
            base.id_with(&registries).unwrap()
        );
    }

    #[test]
    fn test_with_id_and_algorithm() {
        let registries = Registries::with_defaults();
        let node = DagNode::with_algorithm(&b"x"[..], [], "sha3-256");
        let id = node.id_with(&registries).unwrap().clone();
        assert_eq!(id.hash().algorithm().name(), "sha3-256");
        assert_eq!(id.version(), crate::cid::Version::V1);

        let preset = DagNode::with_id(&b"x"[..], [], id.clone());
        assert_eq!(preset.hashing_algorithm(), "sha3-256");
        assert_eq!(preset.id_with(&registries).unwrap(), &id);
        assert_eq!(preset.size(), 3);
    }

    #[test]
    fn test_unknown_algorithm() {
        let registries = Registries::with_defaults();
        let node = DagNode::with_algorithm(&b"x"[..], [], "nope");
        assert_eq!(
            node.id_with(&registries).unwrap_err().kind(),
            ErrorKind::UnknownAlgorithm
        );
        let node = DagNode::with_algorithm(&b"x"[..], [], "md4");
        assert_eq!(
            node.id_with(&registries).unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn test_id_fixed_by_first_registries() {
        let node = DagNode::new(&b"\x08\x01"[..], []);
        let first = node.id_with(&Registries::with_defaults()).unwrap().clone();

        // Without sha2-256 a fresh computation would fail.
        let other = Registries::with_defaults();
        let sha256 = other.hashing().lookup("sha2-256").unwrap();
        other.hashing().deregister(&sha256);
        assert_eq!(node.id_with(&other).unwrap(), &first);
        assert_eq!(first.encode(), EMPTY_UNIXFS_DIR);
    }

    #[test]
    fn test_concurrent_id() {
        let node = Arc::new(DagNode::new(&b"concurrent"[..], []));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let node = Arc::clone(&node);
                std::thread::spawn(move || node.id().unwrap().clone())
            })
            .collect();
        let ids: Vec<Cid> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(node.size(), 12);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Insertion order of links does not change bytes or id
        #[test]
        fn prop_link_order_irrelevant(
            data in prop::collection::vec(any::<u8>(), 0..32),
            names in prop::collection::vec(prop::option::of("[a-c]{0,2}"), 0..6),
            seed in any::<u64>(),
        ) {
            let registries = Registries::with_defaults();
            let links: Vec<DagLink> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let target = DagNode::new(vec![i as u8], []);
                    target.to_link_with(&registries, name.clone())
                })
                .collect::<Result<_>>()?;

            let mut shuffled = links.clone();
            let len = shuffled.len();
            if len > 1 {
                for i in 0..len {
                    let j = seed.rotate_left(i as u32) as usize % len;
                    shuffled.swap(i, j);
                }
            }

            let a = DagNode::new(data.clone(), links);
            let b = DagNode::new(data, shuffled);
            prop_assert_eq!(a.to_bytes(), b.to_bytes());
            prop_assert_eq!(a.id_with(&registries)?, b.id_with(&registries)?);
            prop_assert_eq!(a.size(), a.to_bytes().len() as u64);
        }
    }
}
