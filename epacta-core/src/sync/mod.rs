//! Reconciliation of the persisted cache with a freshly expanded feed.

mod reconcile;
mod stats;

pub use reconcile::SyncReconciler;
pub use stats::ReconcileStats;
