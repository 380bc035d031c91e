/// Rows written per store call during reconciliation.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Upper bound on recurrence iteration steps per event.
pub const DEFAULT_MAX_OCCURRENCES: usize = 5000;

/// Months before "now" that are still materialized.
pub const DEFAULT_PAST_MONTHS: u32 = 12;

/// Months after "now" that are materialized.
pub const DEFAULT_FUTURE_MONTHS: u32 = 24;

/// Link text used when an anchor in an annotation has no visible text.
pub const DEFAULT_LINK_TEXT: &str = "Enlace";
