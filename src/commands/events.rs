use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use epacta_core::config::{CalendarSource, EpactaConfig};
use epacta_core::date_range::DateRange;
use epacta_core::store::{EventStore, StoredEvent};
use owo_colors::OwoColorize;

use super::EVENTS_DAYS;

pub fn run(
    config: &EpactaConfig,
    calendar: &CalendarSource,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let range = DateRange::from_args(from, to, Utc::now(), EVENTS_DAYS)
        .map_err(|e| anyhow::anyhow!(e))?;

    let events: Vec<StoredEvent> = config
        .store()
        .events(&calendar.id)?
        .into_iter()
        .filter(|e| range.contains(e.start_time))
        .collect();

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    // Group events by day and print
    let mut current_date: Option<String> = None;

    for event in &events {
        let date_label = format_date_label(event);

        if current_date.as_ref() != Some(&date_label) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", date_label.bold());
            current_date = Some(date_label);
        }

        let color = event
            .metadata
            .as_ref()
            .and_then(|m| m.color.as_deref())
            .map(|c| format!("[{c}]"))
            .unwrap_or_default();
        let edited = if event.description_override.is_some() {
            " (edited)"
        } else {
            ""
        };

        println!(
            "  {} {} {}{}",
            format_time(event),
            event.title,
            color.dimmed(),
            edited.yellow()
        );
        println!("          {}", event.external_uid.dimmed());

        if let Some(metadata) = &event.metadata {
            for alert in metadata.alerts() {
                println!("          {} {}", "!".red(), alert);
            }
        }
    }

    Ok(())
}

fn local(dt: DateTime<Utc>) -> DateTime<Local> {
    dt.with_timezone(&Local)
}

/// Day label such as "Today", "Tomorrow" or "Wed Feb 25"
fn format_date_label(event: &StoredEvent) -> String {
    let today = Local::now().date_naive();
    let date = if event.all_day {
        event.start_time.date_naive()
    } else {
        local(event.start_time).date_naive()
    };

    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d %Y").to_string(),
    }
}

fn format_time(event: &StoredEvent) -> String {
    if event.all_day {
        "all-day".to_string()
    } else {
        format!("{:>7}", local(event.start_time).format("%H:%M"))
    }
}
