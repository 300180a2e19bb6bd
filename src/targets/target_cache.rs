use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;

use super::types::Target;

/// Caches and indexes a list of capture targets.
///
/// Lookups go through two indices that get rebuilt wholesale on every
/// [`TargetCache::set`]:
/// - `(prefix, name)` to all targets with that name; non-pod targets such as
///   stand-alone containers may appear on several nodes with the same name.
/// - `(node, prefix, name)` to the one target on that node.
///
/// A single mutex guards the list and both indices, so readers never observe
/// a half-built index. Safe to share between tasks and threads.
#[derive(Debug, Default)]
pub struct TargetCache {
    inner: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    targets: Vec<Arc<Target>>,
    by_name: HashMap<(String, String), Vec<Arc<Target>>>,
    on_node: HashMap<(String, String, String), Arc<Target>>,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the cached targets and rebuilds the lookup indices.
    ///
    /// Should two targets share the same node, prefix and name, the later one
    /// wins the node index entry.
    pub fn set(&self, targets: Vec<Target>) {
        let mut state = self.state();
        state.targets = targets.into_iter().map(Arc::new).collect();
        state.by_name = HashMap::new();
        state.on_node = HashMap::new();
        for t in state.targets.clone() {
            state
                .by_name
                .entry((t.prefix.clone(), t.name.clone()))
                .or_default()
                .push(Arc::clone(&t));
            state
                .on_node
                .insert((t.node_name.clone(), t.prefix.clone(), t.name.clone()), t);
        }
        trace!(
            "target cache rebuilt: {} targets, {} names",
            state.targets.len(),
            state.by_name.len()
        );
    }

    /// Returns the cached target list.
    pub fn targets(&self) -> Vec<Arc<Target>> {
        self.state().targets.clone()
    }

    /// Looks up a pod by its `namespace/name`.
    ///
    /// Finds nothing if the name is unknown, matches multiple targets, or
    /// matches a single target that isn't a pod.
    pub fn pod(&self, name: &str) -> Option<Arc<Target>> {
        let state = self.state();
        match state.by_name.get(&(String::new(), name.to_string())) {
            Some(ts) if ts.len() == 1 && ts[0].is_pod() => Some(Arc::clone(&ts[0])),
            _ => None,
        }
    }

    /// Looks up the target with the given prefix and name on a specific node.
    pub fn on_node(&self, node_name: &str, prefix: &str, name: &str) -> Option<Arc<Target>> {
        self.state()
            .on_node
            .get(&(node_name.to_string(), prefix.to_string(), name.to_string()))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.state().targets.is_empty()
    }

    /// Empties the target list; the indices only get dropped with the next
    /// [`TargetCache::set`].
    pub fn clear(&self) {
        self.state().targets.clear();
    }
}
