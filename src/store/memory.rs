// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{tree, Snapshot, Store, StoreResult};

#[derive(Debug, Default, Clone, Copy)]
struct Stamp {
    /// Last write addressed to this exact node (replaces everything below it).
    exact: u64,
    /// Last write anywhere at or below this node.
    subtree: u64,
}

#[derive(Debug, Default)]
struct Inner {
    root: Value,
    stamps: HashMap<String, Stamp>,
    clock: u64,
}

impl Inner {
    fn version_of(&self, segs: &[&str]) -> u64 {
        let mut version = 0;
        for depth in 0..=segs.len() {
            let Some(stamp) = self.stamps.get(&segs[..depth].join("/")) else {
                continue;
            };
            version = version.max(if depth == segs.len() {
                stamp.subtree
            } else {
                stamp.exact
            });
        }
        version
    }

    fn write(&mut self, segs: &[&str], value: Option<Value>) {
        self.clock += 1;
        let clock = self.clock;
        for depth in 0..=segs.len() {
            self.stamps.entry(segs[..depth].join("/")).or_default().subtree = clock;
        }
        self.stamps.entry(segs.join("/")).or_default().exact = clock;
        tree::write(&mut self.root, segs, value);
    }
}

/// In-process store. Every operation is atomic under one lock; versions are tracked per node
/// so concurrent transactions on unrelated projects never conflict.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed writes so far.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().clock
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &str) -> StoreResult<Snapshot> {
        let segs = tree::segments(path);
        let inner = self.inner.lock();
        Ok(Snapshot {
            value: tree::get(&inner.root, &segs).cloned(),
            version: inner.version_of(&segs),
        })
    }

    async fn compare_and_swap(
        &self,
        path: &str,
        expected_version: u64,
        value: Option<Value>,
    ) -> StoreResult<bool> {
        let segs = tree::segments(path);
        let mut inner = self.inner.lock();
        if inner.version_of(&segs) != expected_version {
            return Ok(false);
        }
        inner.write(&segs, value);
        Ok(true)
    }

    async fn put(&self, path: &str, value: Value) -> StoreResult<()> {
        let segs = tree::segments(path);
        self.inner.lock().write(&segs, Some(value));
        Ok(())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        let segs = tree::segments(path);
        self.inner.lock().write(&segs, None);
        Ok(())
    }
}
