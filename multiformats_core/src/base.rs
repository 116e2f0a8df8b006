//! String base algorithms known to the multibase registry.

use crate::error::{Error, Result};
use crate::registry::{Registry, RegistryEntry};
use base64::Engine;
use base64::engine::general_purpose;
use ::multibase::Base;
use std::fmt;
use std::sync::Arc;

/// Name of the base used when none is given.
pub const DEFAULT_ENCODING: &str = "base58btc";

/// Converts bytes to text.
pub type BaseEncoder = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// Converts text back to bytes.
pub type BaseDecoder = Arc<dyn Fn(&str) -> Result<Vec<u8>> + Send + Sync>;

/// A string base algorithm entry, keyed by name and by its one-character prefix.
#[derive(Clone)]
pub struct BaseAlgorithm {
    name: String,
    code: char,
    encoder: Option<BaseEncoder>,
    decoder: Option<BaseDecoder>,
}

impl BaseAlgorithm {
    /// Create a base algorithm entry.
    ///
    /// A missing encoder or decoder makes that direction fail with `NotImplemented`.
    pub fn new(
        name: impl Into<String>,
        code: char,
        encoder: Option<BaseEncoder>,
        decoder: Option<BaseDecoder>,
    ) -> Self {
        Self {
            name: name.into(),
            code,
            encoder,
            decoder,
        }
    }

    /// Unique name, e.g. `base58btc`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Multibase prefix character.
    pub fn code(&self) -> char {
        self.code
    }

    /// Encode bytes (without the multibase prefix).
    pub fn encode(&self, bytes: &[u8]) -> Result<String> {
        match &self.encoder {
            Some(encoder) => Ok(encoder(bytes)),
            None => Err(Error::not_implemented(&self.name)),
        }
    }

    /// Decode text (without the multibase prefix).
    pub fn decode(&self, text: &str) -> Result<Vec<u8>> {
        match &self.decoder {
            Some(decoder) => decoder(text),
            None => Err(Error::not_implemented(&self.name)),
        }
    }
}

impl RegistryEntry for BaseAlgorithm {
    type Code = char;
    const KIND: &'static str = "base algorithm";

    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> char {
        self.code
    }
}

impl fmt::Debug for BaseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseAlgorithm")
            .field("name", &self.name)
            .field("code", &self.code)
            .finish()
    }
}

impl Registry<BaseAlgorithm> {
    /// Registry seeded with the well-known bases.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for algorithm in default_bases() {
            // Seeded names and codes are distinct.
            let _ = registry.register(algorithm);
        }
        registry
    }
}

fn base<E, D>(name: &str, code: char, encode: E, decode: D) -> BaseAlgorithm
where
    E: Fn(&[u8]) -> String + Send + Sync + 'static,
    D: Fn(&str) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    let encoder: BaseEncoder = Arc::new(encode);
    let decoder: BaseDecoder = Arc::new(decode);
    BaseAlgorithm::new(name, code, Some(encoder), Some(decoder))
}

fn base32(name: &str, code: char, variant: Base) -> BaseAlgorithm {
    base(
        name,
        code,
        move |bytes| variant.encode(bytes),
        move |text| {
            variant
                .decode(text)
                .map_err(|e| Error::format(format!("Invalid base32: {}", e)))
        },
    )
}

fn base64(name: &str, code: char, engine: &'static general_purpose::GeneralPurpose) -> BaseAlgorithm {
    base(
        name,
        code,
        move |bytes| engine.encode(bytes),
        move |text| {
            engine
                .decode(text)
                .map_err(|e| Error::format(format!("Invalid base64: {}", e)))
        },
    )
}

fn base58(name: &str, code: char, alphabet: &'static bs58::Alphabet) -> BaseAlgorithm {
    base(
        name,
        code,
        move |bytes| bs58::encode(bytes).with_alphabet(alphabet).into_string(),
        move |text| {
            bs58::decode(text)
                .with_alphabet(alphabet)
                .into_vec()
                .map_err(|e| Error::format(format!("Invalid base58: {}", e)))
        },
    )
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::format(format!("Invalid base16: {}", e)))
}

fn default_bases() -> Vec<BaseAlgorithm> {
    vec![
        base("base16", 'f', |bytes| hex::encode(bytes), decode_hex),
        base("base16upper", 'F', |bytes| hex::encode_upper(bytes), decode_hex),
        base32("base32", 'b', Base::Base32Lower),
        base32("base32upper", 'B', Base::Base32Upper),
        base32("base32pad", 'c', Base::Base32PadLower),
        base32("base32padupper", 'C', Base::Base32PadUpper),
        base32("base32hex", 'v', Base::Base32HexLower),
        base32("base32hexupper", 'V', Base::Base32HexUpper),
        base32("base32hexpad", 't', Base::Base32HexPadLower),
        base32("base32hexpadupper", 'T', Base::Base32HexPadUpper),
        base58("base58btc", 'z', bs58::Alphabet::BITCOIN),
        base58("base58flickr", 'Z', bs58::Alphabet::FLICKR),
        base64("base64", 'm', &general_purpose::STANDARD_NO_PAD),
        base64("base64pad", 'M', &general_purpose::STANDARD),
        base64("base64url", 'u', &general_purpose::URL_SAFE_NO_PAD),
        base64("base64urlpad", 'U', &general_purpose::URL_SAFE),
    ]
}
