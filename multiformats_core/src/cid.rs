//! Content identifiers.
//!
//! Two versions exist:
//!
//! - **v0**: a bare base58btc sha2-256 multihash (`Qm...`), implicitly
//!   `dag-pb` content.
//! - **v1**: `multibase(varint(1) ++ varint(codec) ++ multihash)`.
//!
//! A `Cid` renders its text form once at construction; equality, hashing and
//! `Display` all use that string.

use crate::base::{BaseAlgorithm, DEFAULT_ENCODING};
use crate::codec::{self, Codec, DEFAULT_CONTENT_TYPE};
use crate::error::{Error, ErrorKind, Result};
use crate::multibase;
use crate::multihash::MultiHash;
use crate::registry::Registries;
use crate::varint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

const SHA2_256: u64 = 0x12;
const V0_STRING_LEN: usize = 46;
const V0_BINARY_LEN: usize = 34;

/// CID version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    V0,
    V1,
}

impl Version {
    /// Numeric version as written on the wire.
    pub fn as_u64(self) -> u64 {
        match self {
            Version::V0 => 0,
            Version::V1 => 1,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

/// A self-describing content identifier.
#[derive(Clone)]
pub struct Cid {
    version: Version,
    encoding: Arc<BaseAlgorithm>,
    content_type: Arc<Codec>,
    hash: MultiHash,
    text: String,
}

impl Cid {
    /// Identify content by its multihash, using the process-wide registries.
    pub fn from_multihash(hash: MultiHash) -> Result<Self> {
        Self::from_multihash_with(Registries::global(), hash)
    }

    /// Identify content by its multihash.
    ///
    /// A sha2-256 hash yields a v0 CID; anything else yields v1 with the
    /// default encoding and content type.
    pub fn from_multihash_with(registries: &Registries, hash: MultiHash) -> Result<Self> {
        let version = if is_v0_hash(&hash) {
            Version::V0
        } else {
            Version::V1
        };
        Self::new_with(
            registries,
            version,
            DEFAULT_CONTENT_TYPE,
            DEFAULT_ENCODING,
            hash,
        )
    }

    /// Build a CID from explicit fields, using the process-wide registries.
    pub fn new(version: Version, content_type: &str, encoding: &str, hash: MultiHash) -> Result<Self> {
        Self::new_with(Registries::global(), version, content_type, encoding, hash)
    }

    /// Build a CID from explicit fields.
    ///
    /// Fails with `UnknownAlgorithm` if the content type or encoding is not
    /// registered, and with `InvalidArgument` for a v0 CID that is not a
    /// base58btc `dag-pb` sha2-256 identifier.
    pub fn new_with(
        registries: &Registries,
        version: Version,
        content_type: &str,
        encoding: &str,
        hash: MultiHash,
    ) -> Result<Self> {
        let content_type = registries.codecs().lookup(content_type)?;
        let encoding = registries.bases().lookup(encoding)?;
        Self::assemble(version, content_type, encoding, hash)
    }

    fn assemble(
        version: Version,
        content_type: Arc<Codec>,
        encoding: Arc<BaseAlgorithm>,
        hash: MultiHash,
    ) -> Result<Self> {
        let text = match version {
            Version::V0 => {
                if !is_v0_hash(&hash)
                    || encoding.name() != DEFAULT_ENCODING
                    || content_type.name() != DEFAULT_CONTENT_TYPE
                {
                    return Err(Error::invalid_argument(format!(
                        "CID v0 requires {} {} sha2-256, got {} {} {}",
                        DEFAULT_ENCODING,
                        DEFAULT_CONTENT_TYPE,
                        encoding.name(),
                        content_type.name(),
                        hash.algorithm().name()
                    )));
                }
                hash.to_base58()
            }
            Version::V1 => {
                let mut text = String::new();
                text.push(encoding.code());
                text.push_str(&encoding.encode(&v1_bytes(&content_type, &hash))?);
                text
            }
        };
        Ok(Self {
            version,
            encoding,
            content_type,
            hash,
            text,
        })
    }

    /// Parse the text form, using the process-wide registries.
    pub fn decode(text: &str) -> Result<Self> {
        Self::decode_with(Registries::global(), text)
    }

    /// Parse the text form.
    ///
    /// A 46-character string starting with `Qm` is read as v0; anything else
    /// as multibase v1. Unknown codec and hash codes are registered as
    /// placeholders. Every failure is reported as `Format`.
    pub fn decode_with(registries: &Registries, text: &str) -> Result<Self> {
        let parsed = if text.len() == V0_STRING_LEN && text.starts_with("Qm") {
            MultiHash::from_base58_with(text, registries.hashing())
                .and_then(|(hash, _)| Self::from_multihash_with(registries, hash))
        } else {
            multibase::decode_with(registries.bases(), text).and_then(|bytes| {
                let encoding = text
                    .chars()
                    .next()
                    .and_then(|code| registries.bases().get_by_code(code))
                    .ok_or_else(|| Error::format("Missing multibase prefix"))?;
                Self::read_v1(registries, &bytes, encoding)
            })
        };
        parsed.map_err(|e| as_format(e, text))
    }

    /// Binary form: the raw multihash for v0, `varint(1) ++ varint(codec) ++ multihash` for v1.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.version {
            Version::V0 => self.hash.to_bytes(),
            Version::V1 => v1_bytes(&self.content_type, &self.hash),
        }
    }

    /// Parse the binary form, using the process-wide registries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(Registries::global(), bytes)
    }

    /// Parse the binary form.
    ///
    /// 34 bytes starting `0x12 0x20` are a v0 identifier. Decoded v1
    /// identifiers use the default encoding.
    pub fn from_bytes_with(registries: &Registries, bytes: &[u8]) -> Result<Self> {
        let parsed = if bytes.len() == V0_BINARY_LEN && bytes[0] == 0x12 && bytes[1] == 0x20 {
            MultiHash::from_bytes_with(bytes, registries.hashing())
                .and_then(|(hash, _)| Self::from_multihash_with(registries, hash))
        } else {
            registries
                .bases()
                .lookup(DEFAULT_ENCODING)
                .and_then(|encoding| Self::read_v1(registries, bytes, encoding))
        };
        parsed.map_err(|e| as_format(e, &hex::encode(bytes)))
    }

    fn read_v1(registries: &Registries, bytes: &[u8], encoding: Arc<BaseAlgorithm>) -> Result<Self> {
        let mut reader = bytes;
        let version = varint::read_u64(&mut reader)?;
        if version != 1 {
            return Err(Error::format(format!("Unsupported CID version {}", version)));
        }
        let codec_code = varint::read_u64(&mut reader)?;
        let (hash_code, digest) = MultiHash::split_bytes(reader)?;
        let (hash, _) = MultiHash::resolve(hash_code, digest, registries.hashing())?;
        let (content_type, _) = codec::resolve_codec(codec_code, registries.codecs())?;
        Self::assemble(Version::V1, content_type, encoding, hash)
    }

    /// The same content as a v1 identifier, keeping the content type and encoding.
    pub fn to_version1(&self) -> Result<Self> {
        Self::assemble(
            Version::V1,
            Arc::clone(&self.content_type),
            Arc::clone(&self.encoding),
            self.hash.clone(),
        )
    }

    /// The same identifier rendered with another base, using the process-wide registries.
    pub fn with_encoding(&self, encoding: &str) -> Result<Self> {
        self.with_encoding_in(Registries::global(), encoding)
    }

    /// The same identifier rendered with another base.
    pub fn with_encoding_in(&self, registries: &Registries, encoding: &str) -> Result<Self> {
        let encoding = registries.bases().lookup(encoding)?;
        Self::assemble(
            self.version,
            Arc::clone(&self.content_type),
            encoding,
            self.hash.clone(),
        )
    }

    /// Canonical text form.
    pub fn encode(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Name of the base used by the text form.
    pub fn encoding(&self) -> &str {
        self.encoding.name()
    }

    /// Name of the content type.
    pub fn content_type(&self) -> &str {
        self.content_type.name()
    }

    pub fn codec(&self) -> &Arc<Codec> {
        &self.content_type
    }

    pub fn hash(&self) -> &MultiHash {
        &self.hash
    }
}

fn is_v0_hash(hash: &MultiHash) -> bool {
    hash.algorithm().code() == SHA2_256 && hash.digest().len() == 32
}

fn v1_bytes(content_type: &Codec, hash: &MultiHash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + hash.encoded_len());
    varint::encode_into(Version::V1.as_u64(), &mut buf);
    varint::encode_into(content_type.code(), &mut buf);
    buf.extend_from_slice(&hash.to_bytes());
    buf
}

fn as_format(err: Error, input: &str) -> Error {
    match err.kind() {
        ErrorKind::Format => err,
        _ => Error::format(format!("Invalid CID {:?}: {}", input, err)),
    }
}

impl PartialEq for Cid {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Cid {}

impl Hash for Cid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cid")
            .field("version", &self.version)
            .field("content_type", &self.content_type.name())
            .field("encoding", &self.encoding.name())
            .field("hash", &self.hash)
            .finish()
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
