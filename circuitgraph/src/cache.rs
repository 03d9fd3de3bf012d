//! Graph cache keyed by (project, schematic)
//!
//! Entries are validated against the SHA-256 of the schematic's bytes, so a
//! graph is reused for as long as the file content is unchanged regardless of
//! timestamps. Each key has its own async lock; concurrent requests for the
//! same key wait for a single build instead of racing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::GraphError;
use crate::graph::{CircuitGraph, PowerClassifier};
use crate::netlist::Netlist;
use crate::provider::{NetlistProvider, PowerSymbolSource};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub project: PathBuf,
    pub schematic: PathBuf,
}

impl CacheKey {
    pub fn new(project: &Path, schematic: &Path) -> Self {
        Self {
            project: project.to_path_buf(),
            schematic: schematic.to_path_buf(),
        }
    }
}

struct CacheEntry {
    hash: String,
    graph: Arc<CircuitGraph>,
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// A graph handed out by the cache.
#[derive(Debug, Clone)]
pub struct CachedGraph {
    pub graph: Arc<CircuitGraph>,
    pub netlist: Arc<Netlist>,
    /// `false` when this call parsed and built the graph
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub key: CacheKey,
    pub hash: String,
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
}

pub struct GraphCache {
    provider: Arc<dyn NetlistProvider>,
    power_symbols: Arc<dyn PowerSymbolSource>,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl GraphCache {
    pub fn new(provider: Arc<dyn NetlistProvider>, power_symbols: Arc<dyn PowerSymbolSource>) -> Self {
        Self {
            provider,
            power_symbols,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cached graph for `schematic` if its content is unchanged, otherwise a
    /// freshly built one. A failed build leaves nothing cached for the key.
    pub async fn get(&self, project: &Path, schematic: &Path) -> Result<CachedGraph, GraphError> {
        let key = CacheKey::new(project, schematic);
        let slot = self.slot(&key);

        let result = self.load(&slot, project, schematic).await;
        if result.is_err() {
            self.discard_empty(&key, &slot);
        }
        result
    }

    async fn load(&self, slot: &Slot, project: &Path, schematic: &Path) -> Result<CachedGraph, GraphError> {
        let mut entry = slot.lock().await;

        // hashed and parsed from the same read
        let contents = read_schematic(schematic).await?;
        let hash = content_hash(&contents);

        if let Some(cached) = entry.as_ref() {
            if cached.hash == hash {
                debug!("Graph cache hit for {}", schematic.display());
                return Ok(CachedGraph {
                    netlist: Arc::clone(cached.graph.netlist()),
                    graph: Arc::clone(&cached.graph),
                    cache_hit: true,
                });
            }
            info!("Schematic {} changed, rebuilding graph", schematic.display());
        } else {
            debug!("Graph cache miss for {}", schematic.display());
        }

        *entry = None;

        let netlist = self.provider.parse_contents(schematic, &contents).await?;
        let symbols = self.power_symbols.load_power_symbol_values(project).await;
        let classifier = PowerClassifier::with_project_symbols(symbols);
        let graph = Arc::new(CircuitGraph::build_with_classifier(netlist, classifier)?);

        info!(
            "Built graph for {}: {} components, {} nets",
            schematic.display(),
            graph.component_count(),
            graph.net_count()
        );

        *entry = Some(CacheEntry {
            hash,
            graph: Arc::clone(&graph),
        });

        Ok(CachedGraph {
            netlist: Arc::clone(graph.netlist()),
            graph,
            cache_hit: false,
        })
    }

    /// Drop the entry for a key. Returns whether one was present.
    pub fn evict(&self, project: &Path, schematic: &Path) -> bool {
        self.lock_slots().remove(&CacheKey::new(project, schematic)).is_some()
    }

    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    /// Number of keys holding a built graph.
    pub async fn len(&self) -> usize {
        self.entries().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn entries(&self) -> Vec<CacheEntryInfo> {
        let slots: Vec<(CacheKey, Slot)> = self
            .lock_slots()
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();

        let mut entries = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            if let Some(entry) = slot.lock().await.as_ref() {
                entries.push(CacheEntryInfo {
                    key,
                    hash: entry.hash.clone(),
                    build_id: entry.graph.build_id(),
                    built_at: entry.graph.built_at(),
                });
            }
        }
        entries
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        Arc::clone(self.lock_slots().entry(key.clone()).or_default())
    }

    /// Remove `key` after a failed load unless another caller shares the
    /// slot or it holds a graph.
    fn discard_empty(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.lock_slots();
        let ours = slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot));
        // one reference in the map, one here
        let shared = Arc::strong_count(slot) > 2;
        let empty = slot.try_lock().map(|entry| entry.is_none()).unwrap_or(false);
        if ours && !shared && empty {
            slots.remove(key);
        }
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hex SHA-256 of a file's bytes.
pub async fn hash_file(path: &Path) -> Result<String, GraphError> {
    Ok(content_hash(&read_schematic(path).await?))
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

async fn read_schematic(path: &Path) -> Result<Vec<u8>, GraphError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GraphError::SchematicNotFound(path.to_path_buf()),
        _ => GraphError::Io(e),
    })
}
