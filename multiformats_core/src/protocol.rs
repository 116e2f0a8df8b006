//! Network address protocols.
//!
//! Each protocol has a name, a code and a value grammar. The grammar is a
//! closed set ([`ValueKind`]); the registry maps names and codes to it.
//!
//! ```text
//! kind     text              binary
//! None     (no segment)      (nothing)
//! Ip4      10.1.10.10        4 bytes
//! Ip6      ::1               16 bytes
//! Port     29087             2 bytes, big-endian
//! PeerId   Qm... (base58)    varint(len) ++ multihash
//! Text     example.com       varint(len) ++ UTF-8
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::multihash::MultiHash;
use crate::registry::{HashingRegistry, Registry, RegistryEntry};
use crate::wire;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// The value grammar of a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The protocol carries no value.
    None,
    Ip4,
    Ip6,
    /// TCP/UDP-style 16-bit port.
    Port,
    /// A multihash identifying a peer.
    PeerId,
    /// A length-prefixed UTF-8 string, e.g. a DNS name.
    Text,
}

/// A parsed protocol value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolValue {
    None,
    Ip(IpAddr),
    Port(u16),
    PeerId(MultiHash),
    Text(String),
}

impl ProtocolValue {
    /// Whether this value fits the grammar.
    pub fn is_kind(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (ProtocolValue::None, ValueKind::None)
                | (ProtocolValue::Ip(IpAddr::V4(_)), ValueKind::Ip4)
                | (ProtocolValue::Ip(IpAddr::V6(_)), ValueKind::Ip6)
                | (ProtocolValue::Port(_), ValueKind::Port)
                | (ProtocolValue::PeerId(_), ValueKind::PeerId)
                | (ProtocolValue::Text(_), ValueKind::Text)
        )
    }

    /// Append the binary form.
    pub(crate) fn write_binary(&self, buf: &mut Vec<u8>) {
        match self {
            ProtocolValue::None => {}
            ProtocolValue::Ip(IpAddr::V4(addr)) => buf.extend_from_slice(&addr.octets()),
            ProtocolValue::Ip(IpAddr::V6(addr)) => buf.extend_from_slice(&addr.octets()),
            ProtocolValue::Port(port) => buf.extend_from_slice(&port.to_be_bytes()),
            ProtocolValue::PeerId(hash) => wire::write_length_prefixed(buf, &hash.to_bytes()),
            ProtocolValue::Text(text) => wire::write_length_prefixed(buf, text.as_bytes()),
        }
    }
}

impl fmt::Display for ProtocolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolValue::None => Ok(()),
            ProtocolValue::Ip(addr) => write!(f, "{}", addr),
            ProtocolValue::Port(port) => write!(f, "{}", port),
            ProtocolValue::PeerId(hash) => write!(f, "{}", hash),
            ProtocolValue::Text(text) => f.write_str(text),
        }
    }
}

impl ValueKind {
    /// Whether the text form has a value segment after the name.
    pub fn has_value(self) -> bool {
        self != ValueKind::None
    }

    /// Parse the text value segment. Malformed values fail with `Format`.
    pub fn parse_text(self, text: &str, hashing: &HashingRegistry) -> Result<ProtocolValue> {
        match self {
            ValueKind::None => Ok(ProtocolValue::None),
            ValueKind::Ip4 => text
                .parse::<Ipv4Addr>()
                .map(|addr| ProtocolValue::Ip(IpAddr::V4(addr)))
                .map_err(|_| Error::format(format!("Invalid IPv4 address: {:?}", text))),
            ValueKind::Ip6 => text
                .parse::<Ipv6Addr>()
                .map(|addr| ProtocolValue::Ip(IpAddr::V6(addr)))
                .map_err(|_| Error::format(format!("Invalid IPv6 address: {:?}", text))),
            ValueKind::Port => text
                .parse::<u16>()
                .map(ProtocolValue::Port)
                .map_err(|_| Error::format(format!("Invalid port: {:?}", text))),
            ValueKind::PeerId => MultiHash::from_base58_with(text, hashing)
                .map(|(hash, _)| ProtocolValue::PeerId(hash))
                .map_err(|e| match e.kind() {
                    ErrorKind::Format => e,
                    _ => Error::format(format!("Invalid peer id {:?}: {}", text, e)),
                }),
            ValueKind::Text => {
                if text.is_empty() {
                    return Err(Error::format("Empty address value"));
                }
                Ok(ProtocolValue::Text(text.to_string()))
            }
        }
    }

    /// Read the binary value, advancing the slice.
    pub fn read_binary(self, reader: &mut &[u8], hashing: &HashingRegistry) -> Result<ProtocolValue> {
        match self {
            ValueKind::None => Ok(ProtocolValue::None),
            ValueKind::Ip4 => {
                let octets: [u8; 4] = take(reader)?;
                Ok(ProtocolValue::Ip(IpAddr::V4(Ipv4Addr::from(octets))))
            }
            ValueKind::Ip6 => {
                let octets: [u8; 16] = take(reader)?;
                Ok(ProtocolValue::Ip(IpAddr::V6(Ipv6Addr::from(octets))))
            }
            ValueKind::Port => {
                let bytes: [u8; 2] = take(reader)?;
                Ok(ProtocolValue::Port(u16::from_be_bytes(bytes)))
            }
            ValueKind::PeerId => {
                let bytes = wire::read_length_prefixed(reader)?;
                let (hash, _) = MultiHash::from_bytes_with(bytes, hashing)?;
                Ok(ProtocolValue::PeerId(hash))
            }
            ValueKind::Text => {
                let bytes = wire::read_length_prefixed(reader)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::invalid_data(format!("Address value is not UTF-8: {}", e)))?;
                Ok(ProtocolValue::Text(text.to_string()))
            }
        }
    }
}

fn take<'a, const N: usize>(reader: &mut &'a [u8]) -> Result<[u8; N]> {
    let remaining: &'a [u8] = *reader;
    if remaining.len() < N {
        return Err(Error::EndOfInput);
    }
    let (head, rest) = remaining.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    *reader = rest;
    Ok(out)
}

/// A network address protocol entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProtocol {
    name: String,
    code: u64,
    kind: ValueKind,
}

impl NetworkProtocol {
    pub fn new(name: impl Into<String>, code: u64, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            code,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> u64 {
        self.code
    }

    /// Grammar of this protocol's value.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl RegistryEntry for NetworkProtocol {
    type Code = u64;
    const KIND: &'static str = "network protocol";

    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> u64 {
        self.code
    }
}

impl Registry<NetworkProtocol> {
    /// Registry seeded with the well-known address protocols.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for (name, code, kind) in DEFAULT_PROTOCOLS {
            // Seeded names and codes are distinct.
            let _ = registry.register(NetworkProtocol::new(*name, *code, *kind));
        }
        let _ = registry.register_alias("p2p", "ipfs");
        registry
    }

    /// Make an existing protocol reachable under another name.
    ///
    /// Binary addresses always decode to the original name.
    pub fn register_alias(&self, alias: &str, existing: &str) -> Result<Arc<NetworkProtocol>> {
        let target = self.lookup(existing)?;
        self.register_alias_entry(NetworkProtocol::new(alias, target.code(), target.kind()))
    }
}

const DEFAULT_PROTOCOLS: &[(&str, u64, ValueKind)] = &[
    ("ip4", 4, ValueKind::Ip4),
    ("tcp", 6, ValueKind::Port),
    ("udp", 17, ValueKind::Port),
    ("dccp", 33, ValueKind::Port),
    ("ip6", 41, ValueKind::Ip6),
    ("dns", 53, ValueKind::Text),
    ("dns4", 54, ValueKind::Text),
    ("dns6", 55, ValueKind::Text),
    ("dnsaddr", 56, ValueKind::Text),
    ("sctp", 132, ValueKind::Port),
    ("p2p-circuit", 290, ValueKind::None),
    ("ipfs", 421, ValueKind::PeerId),
    ("https", 443, ValueKind::None),
    ("quic", 460, ValueKind::None),
    ("ws", 477, ValueKind::None),
    ("wss", 478, ValueKind::None),
    ("http", 480, ValueKind::None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProtocolRegistry;

    fn hashing() -> HashingRegistry {
        HashingRegistry::with_defaults()
    }

    #[test]
    fn test_defaults_and_alias() {
        let registry = ProtocolRegistry::with_defaults();
        assert_eq!(registry.lookup("tcp").unwrap().code(), 6);
        assert_eq!(registry.lookup("p2p").unwrap().code(), 421);
        assert_eq!(registry.lookup_code(421).unwrap().name(), "ipfs");
        assert_eq!(registry.lookup("http").unwrap().kind(), ValueKind::None);
    }

    #[test]
    fn test_register_custom_protocol() {
        let registry = ProtocolRegistry::with_defaults();
        registry
            .register(NetworkProtocol::new("utp", 302, ValueKind::None))
            .unwrap();
        let err = registry
            .register(NetworkProtocol::new("utp", 303, ValueKind::None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDefinition);
        let err = registry
            .register(NetworkProtocol::new("other", 6, ValueKind::Port))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDefinition);
    }

    #[test]
    fn test_parse_text_values() {
        let hashing = hashing();
        assert_eq!(
            ValueKind::Ip4.parse_text("10.1.10.10", &hashing).unwrap(),
            ProtocolValue::Ip(IpAddr::V4(Ipv4Addr::new(10, 1, 10, 10)))
        );
        assert_eq!(
            ValueKind::Port.parse_text("29087", &hashing).unwrap(),
            ProtocolValue::Port(29087)
        );
        assert_eq!(
            ValueKind::Ip6.parse_text("::1", &hashing).unwrap().to_string(),
            "::1"
        );
    }

    #[test]
    fn test_parse_text_rejects_bad_values() {
        let hashing = hashing();
        let cases = [
            (ValueKind::Ip4, "::1"),
            (ValueKind::Ip4, "300.1.1.1"),
            (ValueKind::Ip6, "10.0.0.1"),
            (ValueKind::Port, "65536"),
            (ValueKind::Port, "-1"),
            (ValueKind::PeerId, "not-base58!"),
            (ValueKind::Text, ""),
        ];
        for (kind, text) in cases {
            let err = kind.parse_text(text, &hashing).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{:?} {:?}", kind, text);
        }
    }

    #[test]
    fn test_binary_values() {
        let hashing = hashing();
        let mut buf = Vec::new();
        ProtocolValue::Port(29087).write_binary(&mut buf);
        ProtocolValue::Ip("10.1.10.10".parse().unwrap()).write_binary(&mut buf);
        ProtocolValue::Text("example.com".into()).write_binary(&mut buf);
        assert_eq!(&buf[..6], &[0x71, 0x9F, 10, 1, 10, 10]);
        assert_eq!(buf[6], 11);

        let mut reader = buf.as_slice();
        assert_eq!(
            ValueKind::Port.read_binary(&mut reader, &hashing).unwrap(),
            ProtocolValue::Port(29087)
        );
        assert_eq!(
            ValueKind::Ip4.read_binary(&mut reader, &hashing).unwrap().to_string(),
            "10.1.10.10"
        );
        assert_eq!(
            ValueKind::Text.read_binary(&mut reader, &hashing).unwrap(),
            ProtocolValue::Text("example.com".into())
        );
        assert!(reader.is_empty());
    }

    #[test]
    fn test_binary_truncated() {
        let hashing = hashing();
        let err = ValueKind::Ip6
            .read_binary(&mut &[0u8; 15][..], &hashing)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfInput);
        let err = ValueKind::Port
            .read_binary(&mut &[0u8; 1][..], &hashing)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfInput);
    }

    #[test]
    fn test_value_kind_check() {
        assert!(ProtocolValue::Port(1).is_kind(ValueKind::Port));
        assert!(!ProtocolValue::Port(1).is_kind(ValueKind::Ip4));
        assert!(ProtocolValue::None.is_kind(ValueKind::None));
        let v6 = ProtocolValue::Ip("::1".parse().unwrap());
        assert!(v6.is_kind(ValueKind::Ip6));
        assert!(!v6.is_kind(ValueKind::Ip4));
    }
}
