//! Self-describing base-encoded strings.
//!
//! A multibase string is the base algorithm's one-character code followed by
//! the encoded text, e.g. `zStV1DL6CwTryKyV` for `hello world` in base58btc.

use crate::error::{Error, ErrorKind, Result};
use crate::registry::{BaseRegistry, Registries};

/// Encode bytes with the named base using the process-wide registry.
pub fn encode(bytes: &[u8], algorithm: &str) -> Result<String> {
    encode_with(Registries::global().bases(), bytes, algorithm)
}

/// Encode bytes with the named base, prefixed with its code.
///
/// Fails with `UnknownAlgorithm` if no base has that name.
pub fn encode_with(registry: &BaseRegistry, bytes: &[u8], algorithm: &str) -> Result<String> {
    let base = registry.lookup(algorithm)?;
    let body = base.encode(bytes)?;
    let mut text = String::with_capacity(body.len() + 1);
    text.push(base.code());
    text.push_str(&body);
    Ok(text)
}

/// Decode a multibase string using the process-wide registry.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    decode_with(Registries::global().bases(), text)
}

/// Decode a multibase string.
///
/// Every failure, including an unregistered prefix, is reported as `Format`.
pub fn decode_with(registry: &BaseRegistry, text: &str) -> Result<Vec<u8>> {
    let mut chars = text.chars();
    let (code, body) = match chars.next() {
        Some(code) if !chars.as_str().is_empty() => (code, chars.as_str()),
        _ => {
            return Err(Error::format(format!(
                "Multibase string is too short: {:?}",
                text
            )));
        }
    };

    let base = registry
        .get_by_code(code)
        .ok_or_else(|| Error::format(format!("Unknown multibase code: {:?}", code)))?;

    base.decode(body).map_err(|e| match e.kind() {
        ErrorKind::Format => e,
        _ => Error::format(format!("Invalid {} string: {}", base.name(), e)),
    })
}
