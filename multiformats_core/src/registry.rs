//! Name/code registries of pluggable algorithms.
//!
//! Every registry is a bijection between names and codes. Entries are
//! immutable and shared as `Arc`s; registration and removal take a write
//! lock, lookups a read lock. A registry never holds a half-inserted entry,
//! so a lock poisoned by a panicking caller is still safe to use.

use crate::base::BaseAlgorithm;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::hashing::HashingAlgorithm;
use crate::protocol::NetworkProtocol;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// An entry that can be indexed by a [`Registry`].
pub trait RegistryEntry: fmt::Debug + Send + Sync + 'static {
    /// The code key space (an integer, or a single character for bases).
    type Code: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync;

    /// Human-readable name of the registry kind, used in errors and logs.
    const KIND: &'static str;

    /// Unique name of this entry.
    fn name(&self) -> &str;

    /// Unique code of this entry.
    fn code(&self) -> Self::Code;
}

/// How a code read from the wire was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The code was already registered.
    Known,
    /// The code was unknown and a placeholder entry was registered for it.
    Registered,
}

struct Tables<E: RegistryEntry> {
    by_name: HashMap<String, Arc<E>>,
    by_code: HashMap<E::Code, Arc<E>>,
}

/// A thread-safe name/code registry.
pub struct Registry<E: RegistryEntry> {
    tables: RwLock<Tables<E>>,
}

impl<E: RegistryEntry> Registry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                by_name: HashMap::new(),
                by_code: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables<E>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables<E>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new entry.
    ///
    /// Fails with `InvalidArgument` for a blank name and with
    /// `DuplicateDefinition` if the name or the code is already taken; the
    /// registry is unchanged on failure.
    pub fn register(&self, entry: E) -> Result<Arc<E>> {
        let mut tables = self.write();
        Self::insert(&mut tables, entry)
    }

    fn insert(tables: &mut Tables<E>, entry: E) -> Result<Arc<E>> {
        validate_name::<E>(entry.name())?;
        if tables.by_name.contains_key(entry.name()) {
            return Err(Error::duplicate_definition(E::KIND, entry.name()));
        }
        if tables.by_code.contains_key(&entry.code()) {
            return Err(Error::duplicate_definition(
                E::KIND,
                format!("code {}", entry.code()),
            ));
        }

        let entry = Arc::new(entry);
        tables
            .by_name
            .insert(entry.name().to_string(), Arc::clone(&entry));
        tables.by_code.insert(entry.code(), Arc::clone(&entry));
        debug!(kind = E::KIND, name = entry.name(), code = %entry.code(), "registered");
        Ok(entry)
    }

    /// Register an entry under an additional name.
    ///
    /// The entry's code must already be registered; lookups by code keep
    /// returning the original entry.
    pub(crate) fn register_alias_entry(&self, alias: E) -> Result<Arc<E>> {
        validate_name::<E>(alias.name())?;
        let mut tables = self.write();
        if tables.by_name.contains_key(alias.name()) {
            return Err(Error::duplicate_definition(E::KIND, alias.name()));
        }
        if !tables.by_code.contains_key(&alias.code()) {
            return Err(Error::unknown_algorithm(
                E::KIND,
                format!("code {}", alias.code()),
            ));
        }

        let alias = Arc::new(alias);
        tables
            .by_name
            .insert(alias.name().to_string(), Arc::clone(&alias));
        debug!(kind = E::KIND, alias = alias.name(), code = %alias.code(), "registered alias");
        Ok(alias)
    }

    /// Remove an entry.
    ///
    /// Removing an alias leaves the code mapped to the original entry.
    /// Removing the original entry also removes its aliases, so no name is
    /// left pointing at a free code.
    pub fn deregister(&self, entry: &E) {
        let mut tables = self.write();
        let code = entry.code();
        let owns_code = tables
            .by_code
            .get(&code)
            .is_some_and(|current| current.name() == entry.name());
        if owns_code {
            tables.by_code.remove(&code);
            tables.by_name.retain(|_, named| named.code() != code);
        } else {
            tables.by_name.remove(entry.name());
        }
        debug!(kind = E::KIND, name = entry.name(), "deregistered");
    }

    /// Find an entry by name.
    pub fn get(&self, name: &str) -> Option<Arc<E>> {
        self.read().by_name.get(name).cloned()
    }

    /// Find an entry by code.
    pub fn get_by_code(&self, code: E::Code) -> Option<Arc<E>> {
        self.read().by_code.get(&code).cloned()
    }

    /// Find an entry by name, failing with `UnknownAlgorithm`.
    pub fn lookup(&self, name: &str) -> Result<Arc<E>> {
        self.get(name)
            .ok_or_else(|| Error::unknown_algorithm(E::KIND, name))
    }

    /// Find an entry by code, failing with `UnknownAlgorithm`.
    pub fn lookup_code(&self, code: E::Code) -> Result<Arc<E>> {
        self.get_by_code(code)
            .ok_or_else(|| Error::unknown_algorithm(E::KIND, format!("code {}", code)))
    }

    /// Find an entry by code, registering a placeholder when the code is unknown.
    ///
    /// The placeholder is built from `name`, or from `name-1`, `name-2`, ...
    /// when that name already belongs to another code. The check and the
    /// insertion happen under one write lock, so concurrent callers racing on
    /// the same unknown code all observe a single entry.
    pub fn resolve_code(
        &self,
        code: E::Code,
        name: &str,
        placeholder: impl FnOnce(String) -> E,
    ) -> Result<(Arc<E>, Resolution)> {
        if let Some(entry) = self.get_by_code(code) {
            return Ok((entry, Resolution::Known));
        }

        let mut tables = self.write();
        if let Some(entry) = tables.by_code.get(&code) {
            return Ok((Arc::clone(entry), Resolution::Known));
        }
        let mut candidate = name.to_string();
        let mut suffix = 1u32;
        while tables.by_name.contains_key(&candidate) {
            candidate = format!("{}-{}", name, suffix);
            suffix += 1;
        }
        let entry = Self::insert(&mut tables, placeholder(candidate))?;
        warn!(
            kind = E::KIND,
            name = entry.name(),
            code = %code,
            "registered placeholder for unknown code"
        );
        Ok((entry, Resolution::Registered))
    }

    /// All entries, aliases included, in no particular order.
    pub fn all(&self) -> Vec<Arc<E>> {
        self.read().by_name.values().cloned().collect()
    }

    /// Number of names (aliases included).
    pub fn len(&self) -> usize {
        self.read().by_name.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.read().by_name.is_empty()
    }
}

impl<E: RegistryEntry> Default for Registry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RegistryEntry> fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &E::KIND)
            .field("entries", &self.len())
            .finish()
    }
}

fn validate_name<E: RegistryEntry>(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_argument(format!(
            "{} name cannot be empty",
            E::KIND
        )));
    }
    Ok(())
}

/// Registry of digest algorithms.
pub type HashingRegistry = Registry<HashingAlgorithm>;

/// Registry of string base algorithms.
pub type BaseRegistry = Registry<BaseAlgorithm>;

/// Registry of content-type codecs.
pub type CodecRegistry = Registry<Codec>;

/// Registry of network address protocols.
pub type ProtocolRegistry = Registry<NetworkProtocol>;

/// The four registries a parser or encoder may consult.
#[derive(Debug)]
pub struct Registries {
    hashing: HashingRegistry,
    bases: BaseRegistry,
    codecs: CodecRegistry,
    protocols: ProtocolRegistry,
}

static GLOBAL: Lazy<Registries> = Lazy::new(Registries::with_defaults);

impl Registries {
    /// Registries seeded with the well-known algorithms, codecs and protocols.
    pub fn with_defaults() -> Self {
        Self {
            hashing: HashingRegistry::with_defaults(),
            bases: BaseRegistry::with_defaults(),
            codecs: CodecRegistry::with_defaults(),
            protocols: ProtocolRegistry::with_defaults(),
        }
    }

    /// The process-wide registries used by the convenience constructors.
    pub fn global() -> &'static Registries {
        &GLOBAL
    }

    /// Digest algorithms.
    pub fn hashing(&self) -> &HashingRegistry {
        &self.hashing
    }

    /// String base algorithms.
    pub fn bases(&self) -> &BaseRegistry {
        &self.bases
    }

    /// Content-type codecs.
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Network address protocols.
    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }
}
