//! # Multiformats Core
//!
//! Self-describing encodings for content-addressed systems.
//!
//! This library implements the multiformats suite: varints, pluggable
//! registries of digest algorithms, string bases and content codecs, the
//! self-describing hash, base and codec values built on them, content
//! identifiers (CIDs), network multiaddresses, and the Merkle DAG node whose
//! serialized bytes are hashed to produce its own identifier.
//!
//! ## Features
//!
//! - Byte-exact multihash, multibase, multicodec, CID and multiaddr formats
//! - Thread-safe registries, extensible at runtime
//! - Forward-compatible parsing of unknown hash and codec codes
//! - Canonical DAG node serialization with memoized identity
//!
//! ## Example
//!
//! ```
//! use multiformats_core::{Cid, DagNode, MultiAddress, MultiHash};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Hash some content and identify it
//! let hash = MultiHash::compute(b"hello world", "sha2-256")?;
//! let cid = Cid::from_multihash(hash)?;
//! assert_eq!(cid.to_string(), "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4");
//!
//! // Render it as a base32 CIDv1
//! let v1 = cid.to_version1()?.with_encoding("base32")?;
//! assert!(v1.encode().starts_with("bafybei"));
//!
//! // The empty DAG node
//! let node = DagNode::new(&b""[..], []);
//! assert_eq!(node.id()?.encode(), "QmdfTbBqBPQ7VNxZEYEj14VmRuZBkqFbiwReogJgS1zR1n");
//!
//! // Network addresses
//! let addr: MultiAddress = "/ip4/127.0.0.1/tcp/4001".parse()?;
//! assert_eq!(addr.components().len(), 2);
//! # Ok(())
//! # }
//! ```

mod error;
mod wire;

pub mod base;
pub mod cid;
pub mod codec;
pub mod dag;
pub mod hashing;
pub mod multiaddress;
pub mod multibase;
pub mod multihash;
pub mod protocol;
pub mod registry;
pub mod varint;

pub use base::{BaseAlgorithm, DEFAULT_ENCODING};
pub use cid::{Cid, Version};
pub use codec::{Codec, DEFAULT_CONTENT_TYPE, read_codec, write_codec};
pub use dag::{DagLink, DagNode};
pub use error::{Error, ErrorKind, Result};
pub use hashing::{DEFAULT_HASHING_ALGORITHM, DigestHasher, HasherFactory, HashingAlgorithm};
pub use multiaddress::{Component, MultiAddress};
pub use multihash::MultiHash;
pub use protocol::{NetworkProtocol, ProtocolValue, ValueKind};
pub use registry::{
    BaseRegistry, CodecRegistry, HashingRegistry, ProtocolRegistry, Registries, Registry,
    RegistryEntry, Resolution,
};
