use chrono::{DateTime, Datelike, Local, Timelike};

use crate::mcp::error::{BackendError, BackendResult};
use crate::mcp::records::{decode, identified_by, DecodedRecord};
use crate::mcp::script::{self, quote};

const EVENT_FIELDS: &[&str] = &["title", "id"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub location: Option<String>,
    pub calendar: String,
    pub all_day: bool,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub all_day: bool,
    pub calendar: Option<String>,
}

/// Calendar.app access. Event queries print pseudo-records.
pub struct Calendar;

impl Calendar {
    pub fn new() -> Self {
        Self
    }

    pub async fn connect() -> BackendResult<Self> {
        script::probe("Calendar", r#"tell application "Calendar" to count every calendar"#).await?;
        Ok(Self::new())
    }

    pub async fn list(
        &self,
        from: DateTime<Local>,
        to: DateTime<Local>,
        limit: usize,
    ) -> BackendResult<Vec<Event>> {
        self.query(from, to, None, limit).await
    }

    pub async fn search(
        &self,
        text: &str,
        from: DateTime<Local>,
        to: DateTime<Local>,
        limit: usize,
    ) -> BackendResult<Vec<Event>> {
        self.query(from, to, Some(text), limit).await
    }

    /// Show the event with `event_id` in Calendar.
    pub async fn open(&self, event_id: &str) -> BackendResult<()> {
        let script = format!(
            r#"tell application "Calendar"
    activate
    repeat with c in every calendar
        set found to (every event of c whose uid is {id})
        if (count of found) > 0 then
            show item 1 of found
            return "ok"
        end if
    end repeat
    error "No event with id " & {id}
end tell"#,
            id = quote(event_id),
        );
        script::run_applescript(&script).await.map(|_| ())
    }

    /// Create an event and return its uid.
    pub async fn create(&self, event: &NewEvent) -> BackendResult<String> {
        if event.end < event.start {
            return Err(BackendError::Rejected("event ends before it starts".to_string()));
        }
        let target = match event.calendar.as_deref() {
            Some(name) => format!("calendar {}", quote(name)),
            None => "first calendar whose writable is true".to_string(),
        };
        let mut props = format!(
            "summary:{}, start date:startDate, end date:endDate, allday event:{}",
            quote(&event.title),
            event.all_day
        );
        if let Some(location) = event.location.as_deref() {
            props.push_str(&format!(", location:{}", quote(location)));
        }
        if let Some(notes) = event.notes.as_deref() {
            props.push_str(&format!(", description:{}", quote(notes)));
        }
        let script = format!(
            r#"{start}
{end}
tell application "Calendar"
    tell ({target})
        set e to make new event at end of events with properties {{{props}}}
        return uid of e
    end tell
end tell"#,
            start = date_script("startDate", &event.start),
            end = date_script("endDate", &event.end),
        );
        script::run_applescript(&script).await
    }

    async fn query(
        &self,
        from: DateTime<Local>,
        to: DateTime<Local>,
        text: Option<&str>,
        limit: usize,
    ) -> BackendResult<Vec<Event>> {
        let output = script::run_applescript(&events_script(from, to, text, limit)).await?;
        Ok(decode(&output, identified_by(EVENT_FIELDS))
            .map(|record| to_event(&record))
            .take(limit)
            .collect())
    }
}

fn to_event(record: &DecodedRecord) -> Event {
    Event {
        id: record.get_or("id", "").to_string(),
        title: record.get_or("title", "Untitled event").to_string(),
        start: record.get_or("start", "").to_string(),
        end: record.get_or("end", "").to_string(),
        location: record
            .get("location")
            .filter(|l| !l.is_empty() && *l != "missing value")
            .map(str::to_string),
        calendar: record.get_or("calendar", "").to_string(),
        all_day: record.get("allDay") == Some("true"),
    }
}

/// AppleScript statements that build a date in variable `var` from `at`.
/// Built field by field so the locale's date format never matters.
fn date_script(var: &str, at: &DateTime<Local>) -> String {
    format!(
        "set {var} to current date\n\
         set day of {var} to 1\n\
         set year of {var} to {year}\n\
         set month of {var} to {month}\n\
         set day of {var} to {day}\n\
         set time of {var} to {secs}",
        year = at.year(),
        month = at.month(),
        day = at.day(),
        secs = at.num_seconds_from_midnight(),
    )
}

fn events_script(
    from: DateTime<Local>,
    to: DateTime<Local>,
    text: Option<&str>,
    limit: usize,
) -> String {
    let filter = match text {
        Some(t) => format!(
            " and (summary contains {q} or location contains {q})",
            q = quote(t)
        ),
        None => String::new(),
    };
    format!(
        r#"on clean(t)
    set AppleScript's text item delimiters to {{",", "{{", "}}", return, linefeed}}
    set parts to text items of (t as text)
    set AppleScript's text item delimiters to " "
    set t to parts as text
    set AppleScript's text item delimiters to ""
    return t
end clean

{from_date}
{to_date}
tell application "Calendar"
    set out to ""
    set n to 0
    repeat with c in every calendar
        if n ≥ {limit} then exit repeat
        set evs to (every event of c whose start date ≥ fromDate and start date ≤ toDate{filter})
        repeat with e in evs
            if n ≥ {limit} then exit repeat
            set loc to ""
            try
                set loc to location of e
            end try
            set out to out & "{{id:" & (uid of e) & ", title:" & my clean(summary of e) & ", start:" & my clean((start date of e) as string) & ", end:" & my clean((end date of e) as string) & ", location:" & my clean(loc) & ", calendar:" & my clean(name of c) & ", allDay:" & (allday event of e) & "}}" & linefeed
            set n to n + 1
        end repeat
    end repeat
    return out
end tell"#,
        from_date = date_script("fromDate", &from),
        to_date = date_script("toDate", &to),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_records_map_to_events() {
        let output = "{id:ABC-1, title:Standup, start:Monday 1 January 2024 at 09:00:00, end:Monday 1 January 2024 at 09:15:00, location:missing value, calendar:Work, allDay:false}\n\
                      {location:nowhere}\n\
                      {id:ABC-2, title:Holiday, allDay:true, location:Beach}";
        let events: Vec<Event> = decode(output, identified_by(EVENT_FIELDS))
            .map(|r| to_event(&r))
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Standup");
        assert_eq!(events[0].location, None);
        assert!(!events[0].all_day);
        assert_eq!(events[1].location.as_deref(), Some("Beach"));
        assert!(events[1].all_day);
    }

    #[test]
    fn test_date_script_sets_every_field() {
        let at = Local.with_ymd_and_hms(2024, 3, 31, 14, 30, 0).unwrap();
        let script = date_script("d", &at);
        assert!(script.contains("set year of d to 2024"));
        assert!(script.contains("set month of d to 3"));
        assert!(script.contains("set day of d to 31"));
        assert!(script.contains("set time of d to 52200"));
    }

    #[test]
    fn test_events_script_filters_by_text() {
        let from = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Local.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        let script = events_script(from, to, Some("lunch"), 4);
        assert!(script.contains(r#"summary contains "lunch""#));
        assert!(script.contains("if n ≥ 4 then exit repeat"));
    }
}
