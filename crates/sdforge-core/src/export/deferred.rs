//! Caret rules waiting on instances that could not be built yet

use crate::fisher::ArtifactRef;
use crate::model::Rule;

/// A caret rule postponed until every entity has been compiled
#[derive(Debug, Clone)]
pub struct DeferredRule {
    pub artifact: ArtifactRef,
    /// Name of the entity the rule belongs to
    pub entity: String,
    pub rule: Rule,
    /// The instance name that could not be resolved
    pub unresolved: String,
}

/// FIFO queue of deferred rules, drained exactly once per run
#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    items: Vec<DeferredRule>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DeferredRule) {
        tracing::debug!(
            entity = %item.entity,
            instance = %item.unresolved,
            "deferred caret rule until all definitions are compiled"
        );
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every queued rule, leaving the queue empty
    pub fn drain(&mut self) -> Vec<DeferredRule> {
        std::mem::take(&mut self.items)
    }
}
