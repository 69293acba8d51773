//! Patchable call-site slots and compiled-entry lifecycle
//!
//! Direct call sites dispatch through a word-sized target slot. The
//! relocation mechanism is the only writer after emission; executing
//! threads read the slot on every call. Publication is a single atomic
//! store with Release ordering against Acquire loads, so a reader sees
//! either the old target or the new one, never a torn mix.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use kestrel_jit::{CallSiteTable, StatepointId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

/// One patchable target slot
#[derive(Debug)]
pub struct PatchableCallSite {
    statepoint: StatepointId,
    target: AtomicU64,
}

impl PatchableCallSite {
    /// Create a slot pointing at `initial` (typically a resolution stub)
    pub fn new(statepoint: StatepointId, initial: u64) -> Self {
        Self {
            statepoint,
            target: AtomicU64::new(initial),
        }
    }

    /// The statepoint this slot belongs to
    pub fn statepoint(&self) -> StatepointId {
        self.statepoint
    }

    /// Current target, as a caller about to dispatch reads it
    #[inline]
    pub fn resolve(&self) -> u64 {
        self.target.load(Ordering::Acquire)
    }

    /// Rewrite the target. Single store; concurrent callers keep running.
    pub fn patch(&self, new_target: u64) {
        self.target.store(new_target, Ordering::Release);
    }
}

/// Patch slots for every patchable call site of one compiled method
#[derive(Debug, Default)]
pub struct PatchSet {
    slots: FxHashMap<StatepointId, PatchableCallSite>,
}

impl PatchSet {
    /// Build slots for the patchable sites of a call-site table, all
    /// initially pointing at `stub`.
    pub fn from_call_sites(table: &CallSiteTable, stub: u64) -> Self {
        let slots = table
            .iter()
            .filter(|site| site.patchable)
            .map(|site| {
                (
                    site.statepoint,
                    PatchableCallSite::new(site.statepoint, stub),
                )
            })
            .collect();
        Self { slots }
    }

    /// Slot for a statepoint, `None` for non-patchable sites
    pub fn slot(&self, id: StatepointId) -> Option<&PatchableCallSite> {
        self.slots.get(&id)
    }

    /// Number of patchable slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the method has no patchable sites
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Lifecycle of one installed compiled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Current code for its method
    Installed,
    /// Replaced by a newer entry; callers must re-resolve
    Superseded,
}

/// One piece of installed code
#[derive(Debug)]
pub struct CompiledEntry {
    /// Entry address callers jump to
    pub address: u64,
    state: AtomicU8,
}

impl CompiledEntry {
    /// Create an installed entry
    pub fn new(address: u64) -> Self {
        Self {
            address,
            state: AtomicU8::new(EntryState::Installed as u8),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EntryState {
        if self.state.load(Ordering::Acquire) == EntryState::Installed as u8 {
            EntryState::Installed
        } else {
            EntryState::Superseded
        }
    }

    /// Whether callers may keep dispatching through this entry
    pub fn is_current(&self) -> bool {
        self.state() == EntryState::Installed
    }

    fn supersede(&self) {
        self.state
            .store(EntryState::Superseded as u8, Ordering::Release);
    }
}

/// Installed entries by method name. Installing a replacement supersedes
/// the previous entry; call sites that notice a superseded entry look up
/// the current one and patch themselves.
#[derive(Debug, Default)]
pub struct CodeCache {
    entries: Mutex<FxHashMap<String, Arc<CompiledEntry>>>,
}

impl CodeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Install code for a method, superseding any previous entry
    pub fn install(&self, method: impl Into<String>, address: u64) -> Arc<CompiledEntry> {
        let method = method.into();
        let entry = Arc::new(CompiledEntry::new(address));
        let mut entries = self.entries.lock();
        if let Some(old) = entries.insert(method.clone(), entry.clone()) {
            old.supersede();
            debug!(method, address, "superseded compiled entry");
        } else {
            debug!(method, address, "installed compiled entry");
        }
        entry
    }

    /// Current entry for a method
    pub fn lookup(&self, method: &str) -> Option<Arc<CompiledEntry>> {
        self.entries.lock().get(method).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_changes_resolution() {
        let site = PatchableCallSite::new(StatepointId(0), 0x1000);
        assert_eq!(site.resolve(), 0x1000);
        site.patch(0x2000);
        assert_eq!(site.resolve(), 0x2000);
    }

    #[test]
    fn test_patch_set_covers_only_patchable_sites() {
        use kestrel_bytecode::PoolIndex;
        use kestrel_jit::CallKind;

        let mut table = CallSiteTable::new();
        let direct = table.alloc(CallKind::Static, PoolIndex(1), 0, &[]);
        let virt = table.alloc(CallKind::Virtual, PoolIndex(2), 4, &[]);
        let set = PatchSet::from_call_sites(&table, 0xDEAD);
        assert_eq!(set.len(), 1);
        assert_eq!(set.slot(direct).unwrap().resolve(), 0xDEAD);
        assert!(set.slot(virt).is_none());
    }

    #[test]
    fn test_install_supersedes_previous() {
        let cache = CodeCache::new();
        let first = cache.install("m", 0x1000);
        assert!(first.is_current());
        let second = cache.install("m", 0x2000);
        assert_eq!(first.state(), EntryState::Superseded);
        assert!(second.is_current());
        assert_eq!(cache.lookup("m").unwrap().address, 0x2000);
    }

    #[test]
    fn test_reresolution_after_supersede() {
        let cache = CodeCache::new();
        let entry = cache.install("m", 0x1000);
        let site = PatchableCallSite::new(StatepointId(3), entry.address);
        cache.install("m", 0x2000);
        // Caller notices the stale entry and re-resolves through the cache.
        if !entry.is_current() {
            site.patch(cache.lookup("m").unwrap().address);
        }
        assert_eq!(site.resolve(), 0x2000);
    }
}
