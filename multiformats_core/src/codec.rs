//! Content-type codecs and the multicodec prefix.
//!
//! A multicodec is a single varint naming the format of the bytes that
//! follow. Unknown codes read from the wire are registered as
//! `codec-<code>` so that newer content still parses.

use crate::error::Result;
use crate::registry::{CodecRegistry, Registries, Registry, RegistryEntry, Resolution};
use crate::varint;
use std::io::{Read, Write};
use std::sync::Arc;

/// Name of the content type used when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "dag-pb";

/// A content-type codec entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    name: String,
    code: u64,
    placeholder: bool,
}

impl Codec {
    /// Create a codec entry.
    pub fn new(name: impl Into<String>, code: u64) -> Self {
        Self {
            name: name.into(),
            code,
            placeholder: false,
        }
    }

    fn placeholder(name: String, code: u64) -> Self {
        Self {
            name,
            code,
            placeholder: true,
        }
    }

    /// Unique name, e.g. `dag-pb`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Multicodec code.
    pub fn code(&self) -> u64 {
        self.code
    }

    /// Whether this entry was synthesized for an unknown code.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

impl RegistryEntry for Codec {
    type Code = u64;
    const KIND: &'static str = "codec";

    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> u64 {
        self.code
    }
}

impl Registry<Codec> {
    /// Registry seeded with the well-known content types.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for (name, code) in DEFAULT_CODECS {
            // Seeded names and codes are distinct.
            let _ = registry.register(Codec::new(*name, *code));
        }
        registry
    }
}

const DEFAULT_CODECS: &[(&str, u64)] = &[
    ("cbor", 0x51),
    ("protobuf", 0x50),
    ("rlp", 0x60),
    ("bencode", 0x63),
    ("raw", 0x55),
    ("dag-pb", 0x70),
    ("dag-cbor", 0x71),
    ("libp2p-key", 0x72),
    ("git-raw", 0x78),
    ("torrent-info", 0x7b),
    ("torrent-file", 0x7c),
    ("eth-block", 0x90),
    ("eth-block-list", 0x91),
    ("eth-tx-trie", 0x92),
    ("eth-tx", 0x93),
    ("bitcoin-block", 0xb0),
    ("bitcoin-tx", 0xb1),
    ("zcash-block", 0xc0),
    ("zcash-tx", 0xc1),
    ("dag-json", 0x0129),
    ("json", 0x0200),
];

/// Read a multicodec prefix using the process-wide registry.
pub fn read_codec<R: Read>(reader: &mut R) -> Result<Arc<Codec>> {
    read_codec_with(reader, Registries::global().codecs()).map(|(codec, _)| codec)
}

/// Read a multicodec prefix, registering a placeholder for an unknown code.
pub fn read_codec_with<R: Read>(
    reader: &mut R,
    registry: &CodecRegistry,
) -> Result<(Arc<Codec>, Resolution)> {
    let code = varint::read_u64(reader)?;
    resolve_codec(code, registry)
}

/// Look up a codec code, registering `codec-<code>` when it is unknown.
pub(crate) fn resolve_codec(code: u64, registry: &CodecRegistry) -> Result<(Arc<Codec>, Resolution)> {
    registry.resolve_code(code, &format!("codec-{}", code), |name| {
        Codec::placeholder(name, code)
    })
}

/// Write the multicodec prefix for a codec name using the process-wide registry.
pub fn write_codec<W: Write>(writer: &mut W, name: &str) -> Result<()> {
    write_codec_with(writer, name, Registries::global().codecs())
}

/// Write the multicodec prefix for a codec name; unknown names fail with `UnknownAlgorithm`.
pub fn write_codec_with<W: Write>(writer: &mut W, name: &str, registry: &CodecRegistry) -> Result<()> {
    let codec = registry.lookup(name)?;
    varint::write(writer, codec.code())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_write_read_known_codec() {
        let registry = CodecRegistry::with_defaults();
        let mut buf = Vec::new();
        write_codec_with(&mut buf, "dag-cbor", &registry).unwrap();
        assert_eq!(buf, vec![0x71]);

        let (codec, resolution) = read_codec_with(&mut buf.as_slice(), &registry).unwrap();
        assert_eq!(codec.name(), "dag-cbor");
        assert_eq!(resolution, Resolution::Known);
    }

    #[test]
    fn test_multibyte_code() {
        let registry = CodecRegistry::with_defaults();
        let mut buf = Vec::new();
        write_codec_with(&mut buf, "dag-json", &registry).unwrap();
        assert_eq!(buf, vec![0xA9, 0x02]);
    }

    #[test]
    fn test_write_unknown_name() {
        let registry = CodecRegistry::with_defaults();
        let err = write_codec_with(&mut Vec::new(), "not-a-codec", &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAlgorithm);
    }

    #[test]
    fn test_read_unknown_code_registers_placeholder() {
        let registry = CodecRegistry::with_defaults();
        let buf = varint::encode(0x7777);

        let (codec, resolution) = read_codec_with(&mut buf.as_slice(), &registry).unwrap();
        assert_eq!(codec.name(), "codec-30583");
        assert!(codec.is_placeholder());
        assert_eq!(resolution, Resolution::Registered);

        // The placeholder is now an ordinary entry.
        let (again, resolution) = read_codec_with(&mut buf.as_slice(), &registry).unwrap();
        assert_eq!(again.name(), "codec-30583");
        assert_eq!(resolution, Resolution::Known);

        let mut out = Vec::new();
        write_codec_with(&mut out, "codec-30583", &registry).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_read_truncated() {
        let registry = CodecRegistry::with_defaults();
        let err = read_codec_with(&mut [0x80u8].as_slice(), &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfInput);
    }
}
