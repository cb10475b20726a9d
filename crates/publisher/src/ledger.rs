//! Outstanding-document ledger: tracks how many terminal events a document
//! (and any children it has fanned out) still owes before a run can close.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct OutstandingLedger {
    pending: HashMap<String, usize>,
    /// Maps every tracked id to the root document that originated its
    /// lineage, so a broker-mode source offset can be committed once the
    /// whole family — not just the one document read off the queue — is done.
    family_root: HashMap<String, String>,
    family_pending: HashMap<String, usize>,
}

impl OutstandingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A freshly published document starts owing exactly one terminal event,
    /// and is the root of its own lineage.
    pub fn track(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.pending.insert(id.clone(), 1);
        self.family_root.insert(id.clone(), id.clone());
        *self.family_pending.entry(id).or_insert(0) += 1;
    }

    /// A CREATE event for `id` arrived, fanned out from `parent_id`: insert it
    /// if unseen, otherwise bump its pending count, and fold it into its
    /// parent's lineage (or the parent's own root, if the parent is itself a
    /// child).
    pub fn on_create(&mut self, id: &str, parent_id: Option<&str>) {
        *self.pending.entry(id.to_string()).or_insert(0) += 1;

        let root = parent_id
            .and_then(|p| self.family_root.get(p).cloned())
            .or_else(|| parent_id.map(|p| p.to_string()))
            .unwrap_or_else(|| id.to_string());
        self.family_root.insert(id.to_string(), root.clone());
        *self.family_pending.entry(root).or_insert(0) += 1;
    }

    /// A FINISH or FAIL event for `id` arrived. Returns `None` if `id` was
    /// not tracked (a late event after the ledger already forgot it).
    /// Otherwise returns `Some(Some(root_id))` when this was the last
    /// outstanding member of that root's lineage — the signal to commit the
    /// root's source offset — or `Some(None)` when siblings are still pending.
    pub fn on_terminal(&mut self, id: &str) -> Option<Option<String>> {
        let Some(count) = self.pending.get_mut(id) else {
            return None;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.pending.remove(id);
        }

        let root = self.family_root.remove(id);
        let family_ready = root.and_then(|root| {
            let count = self.family_pending.get_mut(&root)?;
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.family_pending.remove(&root);
                Some(root)
            } else {
                None
            }
        });

        Some(family_ready)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
