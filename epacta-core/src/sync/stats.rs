//! Counters reported by a reconciliation run.

use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Fresh events with no row yet.
    pub created: usize,
    /// Fresh events that replaced an existing row.
    pub updated: usize,
    pub deleted: usize,
    /// Updated rows whose manual override was kept and re-parsed.
    pub preserved_overrides: usize,
}

impl ReconcileStats {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl AddAssign for ReconcileStats {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.preserved_overrides += other.preserved_overrides;
    }
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted",
            self.created, self.updated, self.deleted
        )?;
        if self.preserved_overrides > 0 {
            write!(f, " ({} overrides kept)", self.preserved_overrides)?;
        }
        Ok(())
    }
}
