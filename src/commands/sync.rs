use anyhow::Result;
use chrono::Utc;
use epacta_core::config::{CalendarSource, EpactaConfig};
use epacta_core::event::CalendarEvent;
use epacta_core::store::EventStore;
use epacta_core::sync::{ReconcileStats, SyncReconciler};
use owo_colors::OwoColorize;

pub async fn run(config: &EpactaConfig, calendars: Vec<CalendarSource>, force: bool) -> Result<()> {
    let now = Utc::now();
    let limits = config.expand_limits();

    // Feeds are read and expanded in parallel; the store is written serially.
    let handles: Vec<_> = calendars
        .into_iter()
        .map(|calendar| {
            tokio::spawn(async move {
                let path = calendar.source_path();
                let result = tokio::fs::read_to_string(&path)
                    .await
                    .map(|content| calendar.expander(limits).expand_ics(&content, now))
                    .map_err(|e| anyhow::anyhow!("Could not read {}: {e}", path.display()));
                (calendar, result)
            })
        })
        .collect();

    let mut store = config.store();
    let reconciler = config.reconciler();
    let mut total = ReconcileStats::default();
    let mut failed: Vec<String> = Vec::new();
    let count = handles.len();

    for (i, handle) in handles.into_iter().enumerate() {
        let (calendar, result) = handle.await?;

        println!("{}", calendar.display_name().bold());

        // An unreadable feed only skips its calendar; a store failure fails the run.
        match result {
            Err(e) => {
                tracing::warn!(calendar_id = %calendar.id, error = %e, "Skipping calendar");
                println!("   {}", e.to_string().red());
            }
            Ok(events) => {
                let reconciler = reconciler.with_epacta_feed(calendar.epacta);
                match apply(&reconciler, &calendar, &events, &mut store, force) {
                    Ok(Some(stats)) => {
                        println!("   {}", stats.to_string().dimmed());
                        total += stats;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(calendar_id = %calendar.id, error = %e, "Reconciliation failed");
                        println!("   {}", e.to_string().red());
                        failed.push(calendar.id.clone());
                    }
                }
            }
        }

        if i + 1 < count {
            println!();
        }
    }

    if !total.is_empty() {
        println!("\nSynced {total}");
    }

    if !failed.is_empty() {
        anyhow::bail!("Could not update the cache of: {}", failed.join(", "));
    }

    Ok(())
}

/// Reconcile one calendar. `None` when skipped by the empty-feed guard.
#[tracing::instrument(skip_all, fields(calendar_id = %calendar.id, events = events.len()))]
fn apply<S: EventStore>(
    reconciler: &SyncReconciler,
    calendar: &CalendarSource,
    events: &[CalendarEvent],
    store: &mut S,
    force: bool,
) -> Result<Option<ReconcileStats>> {
    if events.is_empty() && !force {
        let cached = store.list_by_calendar(&calendar.id)?.len();
        if cached > 0 {
            println!(
                "   {}",
                format!(
                    "Feed produced no events; keeping {cached} cached events (use --force to delete them)"
                )
                .yellow()
            );
            return Ok(None);
        }
    }

    Ok(Some(reconciler.reconcile(&calendar.id, events, store)?))
}
