//! Self-describing digests.
//!
//! Binary layout:
//!
//! ```text
//! varint(algorithm code) ++ varint(digest length) ++ digest
//! ```
//!
//! The canonical text form is the base58btc encoding of those bytes, which
//! is also what equality and hashing are defined on.

use crate::error::{Error, Result};
use crate::hashing::HashingAlgorithm;
use crate::registry::{HashingRegistry, Registries, Resolution};
use crate::{varint, wire};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;

/// A digest tagged with the algorithm that produced it.
#[derive(Clone)]
pub struct MultiHash {
    algorithm: Arc<HashingAlgorithm>,
    digest: Vec<u8>,
}

impl MultiHash {
    /// Wrap an existing digest, looking the algorithm up in the process-wide registry.
    pub fn new(algorithm: &str, digest: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new_with(Registries::global().hashing(), algorithm, digest)
    }

    /// Wrap an existing digest.
    ///
    /// Fails with `UnknownAlgorithm` for an unregistered name and with
    /// `InvalidData` when the digest length disagrees with the algorithm's
    /// fixed size.
    pub fn new_with(
        registry: &HashingRegistry,
        algorithm: &str,
        digest: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        Self::from_parts(registry.lookup(algorithm)?, digest.into())
    }

    /// Wrap a digest produced by an already resolved algorithm.
    pub fn from_parts(algorithm: Arc<HashingAlgorithm>, digest: Vec<u8>) -> Result<Self> {
        let expected = algorithm.digest_size();
        if expected != 0 && expected != digest.len() {
            return Err(Error::invalid_data(format!(
                "{} digest must be {} bytes, got {}",
                algorithm.name(),
                expected,
                digest.len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    /// Hash `data` with the named algorithm from the process-wide registry.
    pub fn compute(data: &[u8], algorithm: &str) -> Result<Self> {
        Self::compute_with(Registries::global().hashing(), data, algorithm)
    }

    /// Hash `data` with the named algorithm.
    pub fn compute_with(registry: &HashingRegistry, data: &[u8], algorithm: &str) -> Result<Self> {
        let algorithm = registry.lookup(algorithm)?;
        let digest = algorithm.digest(data)?;
        Self::from_parts(algorithm, digest)
    }

    /// Hash everything a reader yields with the named algorithm.
    pub fn compute_reader<R: Read>(reader: R, algorithm: &str) -> Result<Self> {
        Self::compute_reader_with(Registries::global().hashing(), reader, algorithm)
    }

    /// Hash everything a reader yields with the named algorithm.
    pub fn compute_reader_with<R: Read>(
        registry: &HashingRegistry,
        reader: R,
        algorithm: &str,
    ) -> Result<Self> {
        let algorithm = registry.lookup(algorithm)?;
        let digest = algorithm.digest_reader(reader)?;
        Self::from_parts(algorithm, digest)
    }

    /// Whether `data` hashes to this digest.
    ///
    /// Fails with `NotImplemented` if the algorithm cannot be computed locally.
    pub fn matches(&self, data: &[u8]) -> Result<bool> {
        Ok(self.algorithm.digest(data)? == self.digest)
    }

    /// Whether the reader's content hashes to this digest.
    pub fn matches_reader<R: Read>(&self, reader: R) -> Result<bool> {
        Ok(self.algorithm.digest_reader(reader)? == self.digest)
    }

    /// The algorithm that produced the digest.
    pub fn algorithm(&self) -> &Arc<HashingAlgorithm> {
        &self.algorithm
    }

    /// The raw digest.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Whether the digest is the content itself.
    pub fn is_identity(&self) -> bool {
        self.algorithm.code() == 0x00
    }

    /// Length of the binary form.
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.algorithm.code())
            + varint::encoded_len(self.digest.len() as u64)
            + self.digest.len()
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        varint::encode_into(self.algorithm.code(), &mut buf);
        varint::encode_into(self.digest.len() as u64, &mut buf);
        buf.extend_from_slice(&self.digest);
        buf
    }

    /// Write the binary form.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read one multihash from a stream, using the process-wide registry.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Self::read_with(reader, Registries::global().hashing()).map(|(hash, _)| hash)
    }

    /// Read one multihash from a stream.
    ///
    /// An unknown code registers a placeholder algorithm named
    /// `ipfs-<code>` whose size is the parsed digest length, reported as
    /// [`Resolution::Registered`].
    pub fn read_with<R: Read>(
        reader: &mut R,
        registry: &HashingRegistry,
    ) -> Result<(Self, Resolution)> {
        let (code, digest) = Self::read_frame(reader)?;
        Self::resolve(code, digest, registry)
    }

    /// Parse the binary form, using the process-wide registry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(bytes, Registries::global().hashing()).map(|(hash, _)| hash)
    }

    /// Parse the binary form; trailing bytes fail with `InvalidData`.
    ///
    /// Rejected input never registers a placeholder.
    pub fn from_bytes_with(bytes: &[u8], registry: &HashingRegistry) -> Result<(Self, Resolution)> {
        let (code, digest) = Self::split_bytes(bytes)?;
        Self::resolve(code, digest, registry)
    }

    /// Code and digest of a complete binary multihash, without consulting a registry.
    pub(crate) fn split_bytes(bytes: &[u8]) -> Result<(u64, Vec<u8>)> {
        let mut reader = bytes;
        let frame = Self::read_frame(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::invalid_data(format!(
                "{} trailing bytes after multihash",
                reader.len()
            )));
        }
        Ok(frame)
    }

    fn read_frame<R: Read>(reader: &mut R) -> Result<(u64, Vec<u8>)> {
        let code = varint::read_u64(reader)?;
        let len = varint::read_usize(reader)?;
        let digest = wire::read_exactly(reader, len)?;
        Ok((code, digest))
    }

    pub(crate) fn resolve(
        code: u64,
        digest: Vec<u8>,
        registry: &HashingRegistry,
    ) -> Result<(Self, Resolution)> {
        let len = digest.len();
        let (algorithm, resolution) =
            registry.resolve_code(code, &format!("ipfs-{}", code), |name| {
                HashingAlgorithm::placeholder(name, code, len)
            })?;
        Ok((Self::from_parts(algorithm, digest)?, resolution))
    }

    /// Parse the base58btc text form, using the process-wide registry.
    pub fn from_base58(text: &str) -> Result<Self> {
        Self::from_base58_with(text, Registries::global().hashing()).map(|(hash, _)| hash)
    }

    /// Parse the base58btc text form.
    pub fn from_base58_with(text: &str, registry: &HashingRegistry) -> Result<(Self, Resolution)> {
        let bytes = bs58::decode(text)
            .into_vec()
            .map_err(|e| Error::format(format!("Invalid base58 multihash: {}", e)))?;
        Self::from_bytes_with(&bytes, registry)
    }

    /// Canonical base58btc text form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }
}

impl PartialEq for MultiHash {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm.code() == other.algorithm.code() && self.digest == other.digest
    }
}

impl Eq for MultiHash {}

impl Hash for MultiHash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.algorithm.code().hash(state);
        self.digest.hash(state);
    }
}

impl fmt::Display for MultiHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for MultiHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiHash")
            .field("algorithm", &self.algorithm.name())
            .field("digest", &hex::encode(&self.digest))
            .finish()
    }
}

impl FromStr for MultiHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

impl Serialize for MultiHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MultiHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
