//! Digest algorithms known to the multihash registry.

use crate::error::{Error, Result};
use crate::registry::{Registry, RegistryEntry};
use blake2::digest::consts::{U16, U20, U28, U32, U48, U64};
use sha2::Digest;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// Name of the algorithm used when none is given.
pub const DEFAULT_HASHING_ALGORITHM: &str = "sha2-256";

/// An in-progress digest computation.
pub trait DigestHasher: Send {
    /// Feed more input.
    fn update(&mut self, data: &[u8]);

    /// Finish and return the digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Creates a fresh hasher for each digest computation.
pub type HasherFactory = Arc<dyn Fn() -> Box<dyn DigestHasher> + Send + Sync>;

/// A digest algorithm entry.
#[derive(Clone)]
pub struct HashingAlgorithm {
    name: String,
    code: u64,
    digest_size: usize,
    factory: Option<HasherFactory>,
    placeholder: bool,
}

impl HashingAlgorithm {
    /// Create an algorithm entry.
    ///
    /// A `digest_size` of 0 means the digest length varies. Without a
    /// `factory` the algorithm can be identified and parsed but computing a
    /// digest fails with `NotImplemented`.
    pub fn new(
        name: impl Into<String>,
        code: u64,
        digest_size: usize,
        factory: Option<HasherFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            code,
            digest_size,
            factory,
            placeholder: false,
        }
    }

    /// Stand-in for a code seen on the wire but not known locally.
    pub(crate) fn placeholder(name: String, code: u64, digest_size: usize) -> Self {
        Self {
            name,
            code,
            digest_size,
            factory: None,
            placeholder: true,
        }
    }

    fn with_name(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Unique name, e.g. `sha2-256`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Multihash code.
    pub fn code(&self) -> u64 {
        self.code
    }

    /// Digest length in bytes, or 0 when variable.
    pub fn digest_size(&self) -> usize {
        self.digest_size
    }

    /// Whether digests can be computed locally.
    pub fn is_implemented(&self) -> bool {
        self.factory.is_some()
    }

    /// Whether this entry was synthesized for an unknown code.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Start a new digest computation.
    pub fn hasher(&self) -> Result<Box<dyn DigestHasher>> {
        match &self.factory {
            Some(factory) => Ok(factory()),
            None => Err(Error::not_implemented(&self.name)),
        }
    }

    /// Digest a byte slice.
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.hasher()?;
        hasher.update(data);
        Ok(hasher.finalize())
    }

    /// Digest everything a reader yields.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
        let mut hasher = self.hasher()?;
        let mut buffer = [0u8; 8192];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize())
    }
}

impl RegistryEntry for HashingAlgorithm {
    type Code = u64;
    const KIND: &'static str = "hashing algorithm";

    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> u64 {
        self.code
    }
}

impl fmt::Debug for HashingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashingAlgorithm")
            .field("name", &self.name)
            .field("code", &format_args!("{:#x}", self.code))
            .field("digest_size", &self.digest_size)
            .field("implemented", &self.is_implemented())
            .finish()
    }
}

impl Registry<HashingAlgorithm> {
    /// Registry seeded with the well-known digest algorithms.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for algorithm in default_algorithms() {
            // Seeded names and codes are distinct.
            let _ = registry.register(algorithm);
        }
        let _ = registry.register_alias("id", "identity");
        registry
    }

    /// Make an existing algorithm reachable under another name.
    pub fn register_alias(&self, alias: &str, existing: &str) -> Result<Arc<HashingAlgorithm>> {
        let target = self.lookup(existing)?;
        self.register_alias_entry(target.with_name(alias))
    }

    /// Convenience for registering an algorithm from its parts.
    pub fn register_hasher(
        &self,
        name: &str,
        code: u64,
        digest_size: usize,
        factory: Option<HasherFactory>,
    ) -> Result<Arc<HashingAlgorithm>> {
        self.register(HashingAlgorithm::new(name, code, digest_size, factory))
    }
}

/// RustCrypto fixed-output digests.
struct Fixed<D>(D);

impl<D: Digest + Send> DigestHasher for Fixed<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

/// Extendable-output functions truncated to a fixed length.
struct Xof<X> {
    inner: X,
    len: usize,
}

impl<X: Update + ExtendableOutput + Send> DigestHasher for Xof<X> {
    fn update(&mut self, data: &[u8]) {
        Update::update(&mut self.inner, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        let mut out = vec![0u8; self.len];
        XofReader::read(&mut self.inner.finalize_xof(), &mut out);
        out
    }
}

/// SHA-256 applied twice.
struct DoubleSha256(sha2::Sha256);

impl DigestHasher for DoubleSha256 {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        let first = self.0.finalize();
        sha2::Sha256::digest(first).to_vec()
    }
}

struct Blake3(blake3::Hasher);

impl DigestHasher for Blake3 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}

struct Md5(md5::Context);

impl DigestHasher for Md5 {
    fn update(&mut self, data: &[u8]) {
        self.0.consume(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.compute().0.to_vec()
    }
}

/// The digest of the identity algorithm is the input itself.
struct Identity(Vec<u8>);

impl DigestHasher for Identity {
    fn update(&mut self, data: &[u8]) {
        self.0.extend_from_slice(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0
    }
}

fn factory<H, F>(make: F) -> Option<HasherFactory>
where
    H: DigestHasher + 'static,
    F: Fn() -> H + Send + Sync + 'static,
{
    let factory: HasherFactory = Arc::new(move || Box::new(make()) as Box<dyn DigestHasher>);
    Some(factory)
}

fn fixed<D: Digest + Send + 'static>() -> Option<HasherFactory> {
    factory(|| Fixed(D::new()))
}

fn xof<X: Update + ExtendableOutput + Default + Send + 'static>(len: usize) -> Option<HasherFactory> {
    factory(move || Xof {
        inner: X::default(),
        len,
    })
}

fn default_algorithms() -> Vec<HashingAlgorithm> {
    use crate::hashing::HashingAlgorithm as A;
    use blake2::{Blake2b, Blake2s};

    vec![
        A::new("identity", 0x00, 0, factory(|| Identity(Vec::new()))),
        A::new("sha1", 0x11, 20, fixed::<sha1::Sha1>()),
        A::new("sha2-256", 0x12, 32, fixed::<sha2::Sha256>()),
        A::new("sha2-512", 0x13, 64, fixed::<sha2::Sha512>()),
        A::new("sha3-512", 0x14, 64, fixed::<sha3::Sha3_512>()),
        A::new("sha3-384", 0x15, 48, fixed::<sha3::Sha3_384>()),
        A::new("sha3-256", 0x16, 32, fixed::<sha3::Sha3_256>()),
        A::new("sha3-224", 0x17, 28, fixed::<sha3::Sha3_224>()),
        A::new("shake-128", 0x18, 32, xof::<sha3::Shake128>(32)),
        A::new("shake-256", 0x19, 64, xof::<sha3::Shake256>(64)),
        A::new("keccak-224", 0x1a, 28, fixed::<sha3::Keccak224>()),
        A::new("keccak-256", 0x1b, 32, fixed::<sha3::Keccak256>()),
        A::new("keccak-384", 0x1c, 48, fixed::<sha3::Keccak384>()),
        A::new("keccak-512", 0x1d, 64, fixed::<sha3::Keccak512>()),
        A::new("blake3", 0x1e, 32, factory(|| Blake3(blake3::Hasher::new()))),
        A::new(
            "dbl-sha2-256",
            0x56,
            32,
            factory(|| DoubleSha256(sha2::Sha256::new())),
        ),
        A::new("md4", 0xd4, 16, None),
        A::new("md5", 0xd5, 16, factory(|| Md5(md5::Context::new()))),
        A::new("blake2b-160", 0xb214, 20, fixed::<Blake2b<U20>>()),
        A::new("blake2b-256", 0xb220, 32, fixed::<Blake2b<U32>>()),
        A::new("blake2b-384", 0xb230, 48, fixed::<Blake2b<U48>>()),
        A::new("blake2b-512", 0xb240, 64, fixed::<Blake2b<U64>>()),
        A::new("blake2s-128", 0xb250, 16, fixed::<Blake2s<U16>>()),
        A::new("blake2s-160", 0xb254, 20, fixed::<Blake2s<U20>>()),
        A::new("blake2s-224", 0xb25c, 28, fixed::<Blake2s<U28>>()),
        A::new("blake2s-256", 0xb260, 32, fixed::<Blake2s<U32>>()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::HashingRegistry;

    fn default_registry() -> HashingRegistry {
        HashingRegistry::with_defaults()
    }

    fn hex_digest(name: &str, data: &[u8]) -> String {
        let registry = default_registry();
        hex::encode(registry.lookup(name).unwrap().digest(data).unwrap())
    }

    #[test]
    fn test_sha1_hello() {
        assert_eq!(
            hex_digest("sha1", b"hello"),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn test_sha2_256_empty() {
        assert_eq!(
            hex_digest("sha2-256", b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_blake3_hello_world() {
        assert_eq!(
            hex_digest("blake3", b"hello world"),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_md5_hello() {
        assert_eq!(
            hex_digest("md5", b"hello"),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn test_dbl_sha2_256() {
        let registry = default_registry();
        let once = registry.lookup("sha2-256").unwrap().digest(b"abc").unwrap();
        let twice = registry.lookup("sha2-256").unwrap().digest(&once).unwrap();
        let dbl = registry.lookup("dbl-sha2-256").unwrap().digest(b"abc").unwrap();
        assert_eq!(dbl, twice);
    }

    #[test]
    fn test_identity_and_alias() {
        let registry = default_registry();
        let identity = registry.lookup("identity").unwrap();
        assert_eq!(identity.digest(b"raw bytes").unwrap(), b"raw bytes");
        assert_eq!(identity.digest_size(), 0);

        let id = registry.lookup("id").unwrap();
        assert_eq!(id.code(), 0x00);
        assert_eq!(registry.lookup_code(0x00).unwrap().name(), "identity");
    }

    #[test]
    fn test_unimplemented_algorithm() {
        let registry = default_registry();
        let md4 = registry.lookup("md4").unwrap();
        assert!(!md4.is_implemented());
        assert_eq!(
            md4.digest(b"data").unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn test_digest_sizes_match_table() {
        let registry = default_registry();
        for algorithm in registry.all() {
            if !algorithm.is_implemented() || algorithm.digest_size() == 0 {
                continue;
            }
            let digest = algorithm.digest(b"size check").unwrap();
            assert_eq!(
                digest.len(),
                algorithm.digest_size(),
                "{} produced the wrong digest length",
                algorithm.name()
            );
        }
    }

    #[test]
    fn test_digest_reader_matches_slice() {
        let registry = default_registry();
        let sha = registry.lookup("sha2-512").unwrap();
        let data = vec![7u8; 20_000];
        assert_eq!(
            sha.digest_reader(data.as_slice()).unwrap(),
            sha.digest(&data).unwrap()
        );
    }

    #[test]
    fn test_register_custom_and_duplicate() {
        let registry = default_registry();
        let custom = registry
            .register_hasher("my-hash", 0x300000, 4, factory(|| Identity(Vec::new())))
            .unwrap();
        assert_eq!(custom.code(), 0x300000);

        let err = registry
            .register_hasher("sha2-256", 0x300001, 32, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDefinition);

        let err = registry.register_hasher("other", 0x12, 32, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDefinition);
    }

    #[test]
    fn test_register_alias_unknown_target() {
        let registry = default_registry();
        let err = registry.register_alias("nick", "does-not-exist").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAlgorithm);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Incremental updates produce the same digest as a single update
        #[test]
        fn prop_chunked_update_equals_whole(
            data in prop::collection::vec(any::<u8>(), 0..512),
            split in 0usize..512,
            name in prop::sample::select(vec!["sha1", "sha2-256", "sha3-256", "shake-128", "blake2b-256", "blake3", "md5"]),
        ) {
            let registry = default_registry();
            let algorithm = registry.lookup(name)?;
            let split = split.min(data.len());

            let mut hasher = algorithm.hasher()?;
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            prop_assert_eq!(hasher.finalize(), algorithm.digest(&data)?);
        }
    }
}
