//! Application state shared across request handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use vl_analyze::SciProposal;
use vl_storage::MemoryStore;

pub(crate) struct AppState {
    pub(crate) store: MemoryStore,
    /// Proposals awaiting confirmation, keyed by proposal id.
    pub(crate) proposals: RwLock<HashMap<String, SciProposal>>,
    proposal_seq: AtomicU64,
}

impl AppState {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self {
            store,
            proposals: RwLock::new(HashMap::new()),
            proposal_seq: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_proposal_id(&self) -> String {
        let n = self.proposal_seq.fetch_add(1, Ordering::Relaxed);
        format!("prop-{n}")
    }
}
