//! Compiled program cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hookrun_core::RuntimeError;
use parking_lot::Mutex;

/// Engine bytecode of one workflow source. Immutable once built.
#[derive(Debug, PartialEq, Eq)]
pub struct CompiledProgram {
    hash: String,
    bytecode: Vec<u8>,
}

impl CompiledProgram {
    /// Wrap bytecode compiled from the source with content hash `hash`.
    pub fn new(hash: impl Into<String>, bytecode: Vec<u8>) -> Self {
        Self {
            hash: hash.into(),
            bytecode,
        }
    }

    /// Content hash of the source this program was compiled from.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Serialized engine bytecode.
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }
}

/// Memoizes compiled programs by source content hash.
///
/// One mutex guards both lookup and insert, so concurrent first compiles of
/// the same hash run the compile function once. Failed compiles are not
/// cached.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: Mutex<HashMap<String, Arc<CompiledProgram>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProgramCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the program cached under `hash`, compiling it with `compile` on a miss.
    pub fn get_or_compile<F>(&self, hash: &str, compile: F) -> Result<Arc<CompiledProgram>, RuntimeError>
    where
        F: FnOnce() -> Result<Vec<u8>, RuntimeError>,
    {
        let mut programs = self.programs.lock();
        if let Some(program) = programs.get(hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(hash, "program cache hit");
            return Ok(Arc::clone(program));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(hash, "program cache miss, compiling");
        let program = Arc::new(CompiledProgram::new(hash, compile()?));
        programs.insert(hash.to_owned(), Arc::clone(&program));
        Ok(program)
    }

    /// Whether a program is cached under `hash`.
    pub fn contains(&self, hash: &str) -> bool {
        self.programs.lock().contains_key(hash)
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.programs.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.programs.lock().is_empty()
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to compile.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
