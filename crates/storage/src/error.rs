/// All errors that can be returned by a VantageStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record with the given id in the tenant's scope.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A calculation run already holds the lock for this key. The caller
    /// must retry after the in-flight run completes.
    #[error("calculation already in progress for period {period_id}, rule set {rule_set_id}")]
    RunInProgress {
        period_id: String,
        rule_set_id: String,
    },

    /// Uniqueness backstop: a second live result for the same
    /// (tenant, entity, period, rule_set) key.
    #[error("duplicate result for entity {entity_id}, period {period_id}, rule set {rule_set_id}")]
    DuplicateResult {
        entity_id: String,
        period_id: String,
        rule_set_id: String,
    },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
