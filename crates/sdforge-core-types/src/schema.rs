//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and diagnostic reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Definition identifiers
pub const FIELD_ENTITY_NAME: &str = "entity_name";
pub const FIELD_ENTITY_KIND: &str = "entity_kind";
pub const FIELD_RULE_PATH: &str = "rule_path";
pub const FIELD_LOCATION: &str = "location";

// Collection sizes
pub const FIELD_PROFILE_COUNT: &str = "profile_count";
pub const FIELD_EXTENSION_COUNT: &str = "extension_count";
pub const FIELD_LOGICAL_COUNT: &str = "logical_count";
pub const FIELD_RESOURCE_COUNT: &str = "resource_count";
pub const FIELD_DEFERRED_COUNT: &str = "deferred_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_DIAGNOSTIC: &str = "diagnostic";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        // Verify all constants are non-empty
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
        assert!(!EVENT_DIAGNOSTIC.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
        assert_ne!(EVENT_DIAGNOSTIC, EVENT_END_ERROR);
    }
}
