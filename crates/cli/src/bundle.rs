//! Offline run bundle: everything one calculation needs in a single JSON
//! file, seeded into an in-memory store.

use std::path::Path;

use serde::Deserialize;

use vl_core::{CommittedDataRow, Entity, Period};
use vl_storage::MemoryStore;

#[derive(Debug, Deserialize)]
pub(crate) struct Bundle {
    pub tenant_id: String,
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Raw plan JSON; validated by the engine, not the loader.
    #[serde(default)]
    pub rule_sets: Vec<serde_json::Value>,
    #[serde(default)]
    pub rows: Vec<CommittedDataRow>,
    /// Default run key when --period / --rule-set are not passed.
    #[serde(default)]
    pub period_id: Option<String>,
    #[serde(default)]
    pub rule_set_id: Option<String>,
}

impl Bundle {
    pub(crate) fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new();
        self.seed_into(&store);
        store
    }

    pub(crate) fn seed_into(self, store: &MemoryStore) {
        for period in self.periods {
            store.seed_period(period);
        }
        for entity in self.entities {
            store.seed_entity(entity);
        }
        for rule_set in self.rule_sets {
            let id = rule_set
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            store.seed_rule_set(&self.tenant_id, &id, rule_set);
        }
        for row in self.rows {
            store.seed_row(row);
        }
    }
}

pub(crate) fn load_bundle(path: &Path) -> Result<Bundle, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    let bundle: Bundle = serde_json::from_str(&data)
        .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))?;
    if bundle.tenant_id.is_empty() {
        return Err(format!("bundle '{}' has an empty tenant_id", path.display()));
    }
    Ok(bundle)
}
