use anyhow::Result;
use epacta_core::config::{CalendarSource, EpactaConfig};
use epacta_core::error::EpactaError;
use epacta_core::store::EventKey;
use owo_colors::OwoColorize;

pub fn run(
    config: &EpactaConfig,
    calendar: &CalendarSource,
    uid: &str,
    text: Option<&str>,
) -> Result<()> {
    let mut store = config.store();
    let key = EventKey::new(&calendar.id, uid);

    let reconciler = config.reconciler().with_epacta_feed(calendar.epacta);

    let row = match reconciler.set_override(&key, text, &mut store) {
        Ok(row) => row,
        Err(EpactaError::EventNotFound(key)) => anyhow::bail!(
            "No cached event '{}' in calendar '{}'. Run `epacta sync` or check `epacta events`.",
            key.external_uid,
            key.calendar_id
        ),
        Err(e) => return Err(e.into()),
    };

    if row.description_override.is_some() {
        println!("{} {}", "Overridden".green(), row.title);
    } else {
        println!("{} {}", "Restored upstream description of".green(), row.title);
    }
    println!("   {}", row.effective_description().dimmed());

    Ok(())
}
