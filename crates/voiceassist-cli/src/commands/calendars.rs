//! Calendar listing commands.
//!
//! Successful API calls go through the timing instrument, so each run logs
//! how long the calendar round-trip took.

use std::sync::Arc;

use chrono::{Duration, Local, Utc};

use voiceassist_calendar::{CalendarEvent, CalendarListEntry, CalendarService, CredentialProvider};
use voiceassist_core::TimingInstrument;

use crate::error::CliResult;

/// Lists the calendars on the user's calendar list.
pub async fn calendars(provider: &CredentialProvider, timing: &TimingInstrument) -> CliResult<()> {
    let service = Arc::new(provider.authenticate(None).await?);

    let list = timing.wrap_async_fallible("list_calendars", |service: Arc<CalendarService>| {
        async move { service.list_calendars().await }
    });
    let calendars = list(service).await?;

    if calendars.is_empty() {
        println!("No calendars.");
    }
    for calendar in &calendars {
        println!("{}", format_calendar(calendar));
    }
    Ok(())
}

/// Lists events from `calendar_id` over the next `days` days.
pub async fn events(
    provider: &CredentialProvider,
    timing: &TimingInstrument,
    calendar_id: String,
    days: u32,
    limit: Option<usize>,
) -> CliResult<()> {
    let service = Arc::new(provider.authenticate(None).await?);
    let now = Utc::now();
    let until = now + Duration::days(i64::from(days));

    let list = timing.wrap_async_fallible(
        "list_events",
        move |(service, calendar_id): (Arc<CalendarService>, String)| async move {
            service.list_events(&calendar_id, now, until, limit).await
        },
    );
    let events = list((service, calendar_id)).await?;

    if events.is_empty() {
        println!("No upcoming events.");
    }
    for event in &events {
        println!("{}", format_event(event));
    }
    Ok(())
}

fn format_calendar(calendar: &CalendarListEntry) -> String {
    let marker = if calendar.primary { "*" } else { " " };
    let name = if calendar.summary.is_empty() {
        calendar.id.as_str()
    } else {
        calendar.summary.as_str()
    };
    format!("{} {}  ({})", marker, name, calendar.id)
}

fn format_event(event: &CalendarEvent) -> String {
    let when = match (event.start.date_time, event.start.date) {
        (Some(start), _) => start.with_timezone(&Local).format("%a %d %b %H:%M").to_string(),
        (None, Some(date)) => format!("{} all day", date.format("%a %d %b")),
        (None, None) => "unknown time".to_string(),
    };
    let title = event.summary.as_deref().unwrap_or("(no title)");
    format!("{:<18}  {}", when, title)
}
