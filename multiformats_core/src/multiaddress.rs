//! Self-describing network addresses.
//!
//! Text form is `/name/value/name/value/...` (valueless protocols have no
//! value segment); binary form is the concatenation of
//! `varint(code) ++ value` for every component.

use crate::error::{Error, Result};
use crate::multihash::MultiHash;
use crate::protocol::{NetworkProtocol, ProtocolValue, ValueKind};
use crate::registry::Registries;
use crate::varint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// One protocol and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    protocol: Arc<NetworkProtocol>,
    value: ProtocolValue,
}

impl Component {
    /// Pair a protocol with a value; fails with `InvalidArgument` if the
    /// value does not fit the protocol's grammar.
    pub fn new(protocol: Arc<NetworkProtocol>, value: ProtocolValue) -> Result<Self> {
        if !value.is_kind(protocol.kind()) {
            return Err(Error::invalid_argument(format!(
                "{} does not accept value {:?}",
                protocol.name(),
                value
            )));
        }
        Ok(Self { protocol, value })
    }

    pub fn protocol(&self) -> &Arc<NetworkProtocol> {
        &self.protocol
    }

    /// Protocol name as written in the text form.
    pub fn name(&self) -> &str {
        self.protocol.name()
    }

    pub fn code(&self) -> u64 {
        self.protocol.code()
    }

    pub fn value(&self) -> &ProtocolValue {
        &self.value
    }

    fn write_binary(&self, buf: &mut Vec<u8>) {
        varint::encode_into(self.protocol.code(), buf);
        self.value.write_binary(buf);
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.protocol.name())?;
        if self.protocol.kind().has_value() {
            write!(f, "/{}", self.value)?;
        }
        Ok(())
    }
}

/// An ordered, non-empty sequence of address components.
#[derive(Clone)]
pub struct MultiAddress {
    components: Vec<Component>,
    text: String,
}

impl MultiAddress {
    /// Build from components; an empty list fails with `Format`.
    pub fn from_components(components: Vec<Component>) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::format("Multiaddress has no protocols"));
        }
        let text = components.iter().map(ToString::to_string).collect();
        Ok(Self { components, text })
    }

    /// Parse the text form using the process-wide registries.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(Registries::global(), text)
    }

    /// Parse the text form.
    ///
    /// The string must start with `/`; a single trailing `/` is accepted.
    /// Unknown protocol names and malformed values fail with `Format`.
    pub fn parse_with(registries: &Registries, text: &str) -> Result<Self> {
        let rest = text
            .strip_prefix('/')
            .ok_or_else(|| Error::format(format!("Multiaddress must start with '/': {:?}", text)))?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut components = Vec::new();
        let mut segments = rest.split('/').filter(|_| !rest.is_empty());
        while let Some(name) = segments.next() {
            let protocol = registries
                .protocols()
                .get(name)
                .ok_or_else(|| Error::format(format!("Unknown protocol {:?} in {:?}", name, text)))?;
            let value = if protocol.kind().has_value() {
                let segment = segments.next().ok_or_else(|| {
                    Error::format(format!("Missing value for {} in {:?}", name, text))
                })?;
                protocol.kind().parse_text(segment, registries.hashing())?
            } else {
                ProtocolValue::None
            };
            components.push(Component { protocol, value });
        }
        Self::from_components(components)
    }

    /// Parse the binary form using the process-wide registries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(Registries::global(), bytes)
    }

    /// Parse the binary form.
    ///
    /// An unknown protocol code fails with `InvalidData`; the value layout
    /// cannot be skipped without knowing the protocol.
    pub fn from_bytes_with(registries: &Registries, bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let mut components = Vec::new();
        while !reader.is_empty() {
            let code = varint::read_u64(&mut reader)?;
            let protocol = registries
                .protocols()
                .get_by_code(code)
                .ok_or_else(|| Error::invalid_data(format!("Unknown protocol code {}", code)))?;
            let value = protocol
                .kind()
                .read_binary(&mut reader, registries.hashing())?;
            components.push(Component { protocol, value });
        }
        Self::from_components(components)
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for component in &self.components {
            component.write_binary(&mut buf);
        }
        buf
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The peer id of the last component, if it is a peer component.
    pub fn peer_id(&self) -> Option<&MultiHash> {
        match self.components.last().map(Component::value) {
            Some(ProtocolValue::PeerId(hash)) => Some(hash),
            _ => None,
        }
    }

    /// The transport part of the address, without a trailing peer id.
    ///
    /// Fails with `Format` if the peer id is the only component.
    pub fn without_peer_id(&self) -> Result<Self> {
        let mut components = self.components.clone();
        if self.peer_id().is_some() {
            components.pop();
        }
        Self::from_components(components)
    }

    /// Replace or append the trailing peer id, using the process-wide registries.
    pub fn with_peer_id(&self, peer: MultiHash) -> Result<Self> {
        self.with_peer_id_in(Registries::global(), peer)
    }

    /// Replace or append the trailing peer id.
    ///
    /// An existing peer component keeps its protocol name (`ipfs` or `p2p`).
    pub fn with_peer_id_in(&self, registries: &Registries, peer: MultiHash) -> Result<Self> {
        let mut components = self.components.clone();
        let protocol = match self.peer_id() {
            Some(_) => components.pop().map(|c| c.protocol),
            None => None,
        };
        let protocol = match protocol {
            Some(protocol) => protocol,
            None => peer_protocol(registries)?,
        };
        components.push(Component::new(protocol, ProtocolValue::PeerId(peer))?);
        Self::from_components(components)
    }
}

fn peer_protocol(registries: &Registries) -> Result<Arc<NetworkProtocol>> {
    registries
        .protocols()
        .all()
        .into_iter()
        .filter(|p| p.kind() == ValueKind::PeerId)
        .min_by_key(|p| p.name() != "ipfs")
        .ok_or_else(|| Error::unknown_algorithm("network protocol", "ipfs"))
}

impl PartialEq for MultiAddress {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for MultiAddress {}

impl Hash for MultiAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for MultiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for MultiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MultiAddress").field(&self.text).finish()
    }
}

impl FromStr for MultiAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for MultiAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for MultiAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
