pub mod events;
pub mod init;
pub mod parse;
pub mod set_override;
pub mod sync;

/// Days shown by `epacta events` when no end date is given
pub const EVENTS_DAYS: i64 = 7;
