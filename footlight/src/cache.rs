use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use sha1::{Digest, Sha1};

use crate::error::AnalyzeError;
use crate::model::AnalysisResult;
use crate::toolchain::ToolchainPaths;

const CACHE_KEY_VERSION: &str = "v1";
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Memoizes full pipeline runs. Each key gets at most one computation:
/// concurrent callers for the same key block on the slot's cell while one of
/// them computes; resolved entries are read without blocking anyone.
/// Keys are content digests, so a stale hit is impossible; the FIFO cap
/// only bounds residency.
pub struct AnalysisCache {
    slots: DashMap<String, Arc<OnceCell<Arc<AnalysisResult>>>>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        AnalysisCache::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl AnalysisCache {
    pub fn with_capacity(capacity: usize) -> Self {
        AnalysisCache {
            slots: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the cached result for `key`, or runs `compute` exactly once.
    /// The boolean is the hit flag. A failed computation leaves no residue,
    /// so a later call may retry.
    pub fn get_or_compute(
        &self,
        key: &str,
        compute: impl FnOnce() -> Result<AnalysisResult, AnalyzeError>,
    ) -> Result<(Arc<AnalysisResult>, bool), AnalyzeError> {
        let cell = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let hit = cell.get().is_some();

        let result = cell.get_or_try_init(|| compute().map(Arc::new));
        match result {
            Ok(resolved) => {
                if !hit {
                    self.record_insertion(key);
                }
                Ok((resolved.clone(), hit))
            }
            Err(error) => {
                self.slots.remove(key);
                Err(error)
            }
        }
    }

    fn record_insertion(&self, key: &str) {
        let Ok(mut order) = self.order.lock() else {
            return;
        };
        if !order.iter().any(|existing| existing == key) {
            order.push_back(key.to_string());
        }
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.slots.remove(&evicted);
            }
        }
    }
}

/// Cache key = digest over input identities and the configuration that can
/// change the output: ELF content, MAP content (or its absence), resolved
/// tool paths, and the findings thresholds.
pub fn build_cache_key(
    elf_path: &str,
    map_path: Option<&str>,
    toolchain: &ToolchainPaths,
    findings_signature: &str,
) -> Result<String, AnalyzeError> {
    let elf_digest = hash_file(elf_path)?;
    // An unreadable MAP degrades the run instead of failing it, so its
    // identity degrades too (and moves again once the file is readable).
    let map_digest = match map_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => hash_file(path).unwrap_or_else(|_| String::from("unreadable")),
        None => String::from("none"),
    };
    let tool_signature = format!(
        "{}|{}|{}",
        toolchain.nm_path,
        toolchain.objdump_path.as_deref().unwrap_or("-"),
        toolchain.strings_path.as_deref().unwrap_or("-"),
    );
    let raw = format!(
        "ver:{CACHE_KEY_VERSION}|elf:{elf_digest}|map:{map_digest}|tool:{tool_signature}|rules:{findings_signature}"
    );
    Ok(hash_str(&raw))
}

fn hash_file(path: &str) -> Result<String, AnalyzeError> {
    let mut file =
        std::fs::File::open(path).map_err(|source| AnalyzeError::io(Path::new(path), source))?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|source| AnalyzeError::io(Path::new(path), source))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn hash_str(value: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}
