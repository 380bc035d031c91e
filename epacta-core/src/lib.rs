//! Ingestion core for Epacta liturgical calendars.
//!
//! - `annotation` turns the " / " separated description convention into
//!   structured `EpactaMetadata`
//! - `expand` flattens an ICS feed into windowed occurrences
//! - `sync` reconciles those occurrences with a persisted `store`, keeping
//!   manual description overrides

pub mod annotation;
pub mod config;
pub mod constants;
pub mod date_range;
pub mod error;
pub mod event;
pub mod expand;
pub mod ics;
pub mod metadata;
pub mod store;
pub mod sync;

pub use config::{CalendarSource, EpactaConfig};
pub use error::{EpactaError, EpactaResult};
pub use event::CalendarEvent;
pub use expand::{ExpandLimits, FeedExpander};
pub use metadata::{EpactaMetadata, Exposicion, ExternalLink};
pub use store::{EventKey, EventStore, JsonFileStore, MemoryStore, StoredEvent};
pub use sync::{ReconcileStats, SyncReconciler};
