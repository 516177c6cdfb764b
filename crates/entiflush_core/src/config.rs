//! Flush configuration.

/// Which list is written first when a unit of work is flushed.
///
/// Updates are always written last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushOrder {
    /// Deletes, then inserts, then updates.
    #[default]
    DeletesFirst,
    /// Inserts, then deletes, then updates.
    InsertsFirst,
}

/// Configuration for flushing entity batches.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Order of the delete and insert lists.
    pub order: FlushOrder,

    /// Whether a self-referencing key that points outside the batch must be
    /// a key already written by this batch.
    ///
    /// When false, such keys are assumed to reference rows that already
    /// exist in the backend.
    pub strict_self_references: bool,

    /// Whether an update or delete that affects no row is an error.
    pub verify_affected_rows: bool,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            order: FlushOrder::DeletesFirst,
            strict_self_references: false,
            verify_affected_rows: false,
        }
    }
}

impl FlushConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the order of the delete and insert lists.
    #[must_use]
    pub const fn order(mut self, order: FlushOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets whether self references must resolve within the batch.
    #[must_use]
    pub const fn strict_self_references(mut self, value: bool) -> Self {
        self.strict_self_references = value;
        self
    }

    /// Sets whether writes that affect no row fail.
    #[must_use]
    pub const fn verify_affected_rows(mut self, value: bool) -> Self {
        self.verify_affected_rows = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FlushConfig::default();
        assert_eq!(config.order, FlushOrder::DeletesFirst);
        assert!(!config.strict_self_references);
        assert!(!config.verify_affected_rows);
    }

    #[test]
    fn builder_pattern() {
        let config = FlushConfig::new()
            .order(FlushOrder::InsertsFirst)
            .strict_self_references(true)
            .verify_affected_rows(true);

        assert_eq!(config.order, FlushOrder::InsertsFirst);
        assert!(config.strict_self_references);
        assert!(config.verify_affected_rows);
    }
}
