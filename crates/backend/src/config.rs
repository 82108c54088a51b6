//! Construction-time sizing for the speculative execution backend.
//!
//! Mirrors the embedding simulator's own configuration pattern: a
//! `serde`-deserializable struct with a per-field `#[serde(default = "...")]`
//! and a hand-written [`Default`] impl, so an integrating SoC crate can load
//! backend geometry from the same JSON/TOML file it uses for everything
//! else.

use serde::Deserialize;

mod defaults {
    /// Reorder buffer depth (number of in-flight instructions).
    pub const ROB_DEPTH: usize = 64;

    /// Execute-queue depth, shared by the in-order FIFO and the
    /// out-of-order double-buffer chain.
    pub const EXECUTE_QUEUE_DEPTH: usize = 16;

    /// Store-queue depth (in-flight, not-yet-retired stores).
    pub const STORE_QUEUE_DEPTH: usize = 16;
}

/// Which execute-queue implementation backs a reservation station
/// (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ExecuteQueueVariant {
    /// Circular-buffer FIFO; fixed issue-order dequeue.
    ///
    /// Used for instruction subclasses (memory ops) that must execute in
    /// issue order.
    #[default]
    InOrder,
    /// Chain of two-entry "double-buffer" cells with tail-to-head,
    /// oldest-ready arbitration.
    OutOfOrder,
}

/// Construction-time sizing for the backend's queues and buffers.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Reorder buffer depth.
    #[serde(default = "BackendConfig::default_rob_depth")]
    pub rob_depth: usize,

    /// Execute-queue depth.
    #[serde(default = "BackendConfig::default_execute_queue_depth")]
    pub execute_queue_depth: usize,

    /// Store-queue depth.
    #[serde(default = "BackendConfig::default_store_queue_depth")]
    pub store_queue_depth: usize,

    /// Which execute-queue implementation to instantiate.
    #[serde(default)]
    pub execute_queue_variant: ExecuteQueueVariant,
}

impl BackendConfig {
    fn default_rob_depth() -> usize {
        defaults::ROB_DEPTH
    }

    fn default_execute_queue_depth() -> usize {
        defaults::EXECUTE_QUEUE_DEPTH
    }

    fn default_store_queue_depth() -> usize {
        defaults::STORE_QUEUE_DEPTH
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            rob_depth: defaults::ROB_DEPTH,
            execute_queue_depth: defaults::EXECUTE_QUEUE_DEPTH,
            store_queue_depth: defaults::STORE_QUEUE_DEPTH,
            execute_queue_variant: ExecuteQueueVariant::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_in_order_execute_queue() {
        let config = BackendConfig::default();
        assert_eq!(config.execute_queue_variant, ExecuteQueueVariant::InOrder);
        assert_eq!(config.rob_depth, 64);
    }

    #[test]
    fn out_of_order_variant_is_distinct_from_default() {
        assert_ne!(
            ExecuteQueueVariant::OutOfOrder,
            ExecuteQueueVariant::default()
        );
    }
}
