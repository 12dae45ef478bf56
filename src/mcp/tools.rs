//! The eight user-facing tools. Each one validates its arguments, resolves
//! its backend through the loader and formats the backend's answer as text.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::{json, Value};

use crate::mcp::backends::calendar::{Calendar, Event, NewEvent};
use crate::mcp::backends::contacts::Contacts;
use crate::mcp::backends::mail::{Email, Mail, OutgoingEmail};
use crate::mcp::backends::maps::{Maps, Transport};
use crate::mcp::backends::messages::Messages;
use crate::mcp::backends::notes::Notes;
use crate::mcp::backends::reminders::{NewReminder, Reminder, Reminders};
use crate::mcp::backends::web_search::WebSearch;
use crate::mcp::error::ToolError;
use crate::mcp::loader::Loader;
use crate::mcp::models::{
    CalendarArgs, ContactsArgs, MailArgs, MapsArgs, MessagesArgs, NotesArgs, RemindersArgs,
    WebSearchArgs,
};
use crate::mcp::toolkit::{parse_args, Tool, ToolRegistry};

const NOTE_PREVIEW_CHARS: usize = 100;

/// Registry with every tool wired to `loader`.
pub fn build_registry(loader: Arc<Loader>) -> ToolRegistry {
    let mut registry = ToolRegistry::new(Arc::clone(&loader));
    registry.register_tool(Box::new(ContactsTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(NotesTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(MessagesTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(MailTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(RemindersTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(CalendarTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(MapsTool::new(Arc::clone(&loader))));
    registry.register_tool(Box::new(WebSearchTool::new(loader)));
    registry
}

fn invalid(tool: &str, message: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: message.into(),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]` and
/// bare dates (midnight local time).
fn parse_datetime(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
}

fn required_datetime(tool: &str, field: &str, value: &str) -> Result<DateTime<Local>, ToolError> {
    parse_datetime(value).ok_or_else(|| invalid(tool, format!("{field} is not a valid date: {value}")))
}

/// Date window for calendar queries; defaults to the coming week.
fn date_window(
    tool: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(DateTime<Local>, DateTime<Local>), ToolError> {
    let from = match from {
        Some(v) => required_datetime(tool, "fromDate", v)?,
        None => start_of_today(),
    };
    let to = match to {
        Some(v) => required_datetime(tool, "toDate", v)?,
        None => from + Duration::days(7),
    };
    if to < from {
        return Err(invalid(tool, "toDate is before fromDate"));
    }
    Ok((from, to))
}

/// Local midnight today. Falls back to now when midnight does not exist
/// (DST transition at 00:00).
fn start_of_today() -> DateTime<Local> {
    let now = Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or(now)
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

pub struct ContactsTool {
    loader: Arc<Loader>,
}

impl ContactsTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for ContactsTool {
    fn name(&self) -> &str {
        "contacts"
    }

    fn description(&self) -> &str {
        "Search and retrieve contacts from Apple Contacts app"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Name to search for (optional - if not provided, returns all contacts). Can be partial name to search."}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: ContactsArgs = parse_args(self.name(), args)?;
        let contacts = self.loader.resolve_as::<Contacts>().await?;

        match args.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let numbers = contacts.find_numbers(name).await?;
                if numbers.is_empty() {
                    return Ok(format!("No contact found for \"{name}\"."));
                }
                Ok(format!("{}: {}", name, numbers.join(", ")))
            }
            None => {
                let all = contacts.all_numbers().await?;
                if all.is_empty() {
                    return Ok("No contacts with phone numbers found.".to_string());
                }
                Ok(all
                    .iter()
                    .map(|(name, numbers)| format!("{}: {}", name, numbers.join(", ")))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }
}

pub struct NotesTool {
    loader: Arc<Loader>,
}

impl NotesTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for NotesTool {
    fn name(&self) -> &str {
        "notes"
    }

    fn description(&self) -> &str {
        "Search, retrieve and create notes in Apple Notes app"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["search", "list", "create"]},
                "searchText": {"type": "string", "description": "Text to search for in notes (required for search)"},
                "title": {"type": "string", "description": "Title of the note (required for create)"},
                "body": {"type": "string", "description": "Content of the note (required for create)"},
                "folderName": {"type": "string", "description": "Folder for the new note; defaults to 'Claude'"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: NotesArgs = parse_args(self.name(), args)?;
        let notes = self.loader.resolve_as::<Notes>().await?;

        let (found, empty) = match args {
            NotesArgs::Create {
                title,
                body,
                folder_name,
            } => {
                let created = notes.create(&title, &body, &folder_name).await?;
                let folder_note = if created.created_folder {
                    " (new folder)"
                } else {
                    ""
                };
                return Ok(format!(
                    "Created note \"{}\" in folder \"{}\"{}.",
                    title, created.folder, folder_note
                ));
            }
            NotesArgs::Search { search_text } => (
                notes.search(&search_text).await?,
                format!("No notes found for \"{search_text}\"."),
            ),
            NotesArgs::List => (notes.list().await?, "No notes exist.".to_string()),
        };

        if found.is_empty() {
            return Ok(empty);
        }
        Ok(found
            .iter()
            .map(|n| format!("{}:\n{}", n.name, preview(&n.content, NOTE_PREVIEW_CHARS)))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

pub struct MessagesTool {
    loader: Arc<Loader>,
}

impl MessagesTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for MessagesTool {
    fn name(&self) -> &str {
        "messages"
    }

    fn description(&self) -> &str {
        "Interact with Apple Messages app - send, read, schedule messages and check unread messages"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["send", "read", "schedule", "unread"]},
                "phoneNumber": {"type": "string", "description": "Phone number (required for send, read, schedule)"},
                "message": {"type": "string", "description": "Message text (required for send and schedule)"},
                "limit": {"type": "number", "description": "Number of messages to read (optional, for read and unread)"},
                "scheduledTime": {"type": "string", "description": "ISO date string for when to send the message (required for schedule)"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: MessagesArgs = parse_args(self.name(), args)?;
        let messages = self.loader.resolve_as::<Messages>().await?;

        match args {
            MessagesArgs::Send {
                phone_number,
                message,
            } => {
                messages.send(&phone_number, &message).await?;
                Ok(format!("Message sent to {phone_number}."))
            }
            MessagesArgs::Schedule {
                phone_number,
                message,
                scheduled_time,
            } => {
                let at = required_datetime(self.name(), "scheduledTime", &scheduled_time)?;
                let scheduled = messages.schedule(&phone_number, &message, at)?;
                Ok(format!(
                    "Message {} scheduled to {} at {}.",
                    scheduled.id,
                    scheduled.phone_number,
                    scheduled.send_at.to_rfc3339()
                ))
            }
            MessagesArgs::Read {
                phone_number,
                limit,
            } => {
                let found = messages.read(&phone_number, limit).await?;
                if found.is_empty() {
                    return Ok(format!("No messages found for {phone_number}."));
                }
                Ok(format_messages(&found))
            }
            MessagesArgs::Unread { limit } => {
                let found = messages.unread(limit).await?;
                if found.is_empty() {
                    return Ok("No unread messages.".to_string());
                }
                Ok(format_messages(&found))
            }
        }
    }
}

fn format_messages(messages: &[crate::mcp::backends::messages::Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let who = if m.is_from_me != 0 { "Me" } else { m.sender.as_str() };
            format!(
                "[{}] {}: {}",
                m.date,
                who,
                m.content.as_deref().unwrap_or("[no text]")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct MailTool {
    loader: Arc<Loader>,
}

impl MailTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for MailTool {
    fn name(&self) -> &str {
        "mail"
    }

    fn description(&self) -> &str {
        "Interact with Apple Mail app - read unread emails, search emails, send emails and list accounts and mailboxes"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["unread", "search", "send", "mailboxes", "accounts", "latest"]},
                "account": {"type": "string", "description": "Email account to use (optional; required for latest)"},
                "mailbox": {"type": "string", "description": "Mailbox to use (optional)"},
                "limit": {"type": "number", "description": "Number of emails to retrieve"},
                "searchTerm": {"type": "string", "description": "Text to search for (required for search)"},
                "to": {"type": "string", "description": "Recipient address, comma separated for several (required for send)"},
                "subject": {"type": "string", "description": "Email subject (required for send)"},
                "body": {"type": "string", "description": "Email body (required for send)"},
                "cc": {"type": "string", "description": "CC addresses (optional)"},
                "bcc": {"type": "string", "description": "BCC addresses (optional)"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: MailArgs = parse_args(self.name(), args)?;
        let mail = self.loader.resolve_as::<Mail>().await?;

        match args {
            MailArgs::Unread {
                account,
                mailbox,
                limit,
            } => {
                let emails = mail
                    .unread(account.as_deref(), mailbox.as_deref(), limit)
                    .await?;
                Ok(format_emails(&emails, "No unread emails found."))
            }
            MailArgs::Search {
                search_term,
                account,
                limit,
            } => {
                let emails = mail.search(&search_term, account.as_deref(), limit).await?;
                Ok(format_emails(
                    &emails,
                    &format!("No emails found for \"{search_term}\"."),
                ))
            }
            MailArgs::Latest { account, limit } => {
                let emails = mail.latest(&account, limit).await?;
                Ok(format_emails(&emails, &format!("No emails in {account}.")))
            }
            MailArgs::Send {
                to,
                subject,
                body,
                cc,
                bcc,
            } => {
                mail.send(&OutgoingEmail {
                    to: to.clone(),
                    subject,
                    body,
                    cc,
                    bcc,
                })
                .await?;
                Ok(format!("Email sent to {to}."))
            }
            MailArgs::Mailboxes { account } => {
                let boxes = mail.mailboxes(account.as_deref()).await?;
                if boxes.is_empty() {
                    return Ok("No mailboxes found.".to_string());
                }
                Ok(format!("Mailboxes:\n{}", boxes.join("\n")))
            }
            MailArgs::Accounts => {
                let accounts = mail.accounts().await?;
                if accounts.is_empty() {
                    return Ok("No mail accounts configured.".to_string());
                }
                Ok(format!("Accounts:\n{}", accounts.join("\n")))
            }
        }
    }
}

fn format_emails(emails: &[Email], empty: &str) -> String {
    if emails.is_empty() {
        return empty.to_string();
    }
    emails
        .iter()
        .map(|e| {
            let mut out = format!(
                "Subject: {}\nFrom: {}\nDate: {}",
                e.subject, e.sender, e.date
            );
            if !e.mailbox.is_empty() {
                out.push_str(&format!("\nMailbox: {} ({})", e.mailbox, e.account));
            }
            if !e.preview.is_empty() {
                out.push_str(&format!("\n{}", e.preview));
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct RemindersTool {
    loader: Arc<Loader>,
}

impl RemindersTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for RemindersTool {
    fn name(&self) -> &str {
        "reminders"
    }

    fn description(&self) -> &str {
        "Search, create, and open reminders in Apple Reminders app"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["list", "search", "open", "create", "listById"]},
                "searchText": {"type": "string", "description": "Text to search for (required for search and open)"},
                "name": {"type": "string", "description": "Name of the reminder (required for create)"},
                "listName": {"type": "string", "description": "List to add the reminder to (optional for create)"},
                "listId": {"type": "string", "description": "ID of the list (required for listById)"},
                "notes": {"type": "string", "description": "Additional notes (optional for create)"},
                "dueDate": {"type": "string", "description": "Due date in ISO format (optional for create)"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: RemindersArgs = parse_args(self.name(), args)?;
        let reminders = self.loader.resolve_as::<Reminders>().await?;

        match args {
            RemindersArgs::List => {
                let lists = reminders.lists().await?;
                let open = reminders.open_items().await?;
                let mut out = format!(
                    "Lists:\n{}",
                    lists
                        .iter()
                        .map(|l| format!("- {} ({})", l.name, l.id))
                        .collect::<Vec<_>>()
                        .join("\n")
                );
                out.push_str("\n\nOpen reminders:\n");
                out.push_str(&format_reminders(&open, "None."));
                Ok(out)
            }
            RemindersArgs::Search { search_text } => {
                let found = reminders.search(&search_text).await?;
                Ok(format_reminders(
                    &found,
                    &format!("No reminders found for \"{search_text}\"."),
                ))
            }
            RemindersArgs::Open { search_text } => match reminders.open(&search_text).await? {
                Some(r) => Ok(format!("Opened reminder \"{}\".", r.name)),
                None => Ok(format!("No reminders found for \"{search_text}\".")),
            },
            RemindersArgs::Create {
                name,
                list_name,
                notes,
                due_date,
            } => {
                if let Some(due) = due_date.as_deref() {
                    required_datetime(self.name(), "dueDate", due)?;
                }
                let created = reminders
                    .create(&NewReminder {
                        name,
                        list_name,
                        notes,
                        due_date,
                    })
                    .await?;
                Ok(format!(
                    "Created reminder \"{}\" in list \"{}\".",
                    created.name, created.list_name
                ))
            }
            RemindersArgs::ListById { list_id } => {
                let found = reminders.by_list_id(&list_id).await?;
                Ok(format_reminders(&found, "The list has no reminders."))
            }
        }
    }
}

fn format_reminders(reminders: &[Reminder], empty: &str) -> String {
    if reminders.is_empty() {
        return empty.to_string();
    }
    reminders
        .iter()
        .map(|r| {
            let check = if r.completed { "x" } else { " " };
            let mut line = format!("[{}] {} ({})", check, r.name, r.list_name);
            if let Some(due) = r.due_date.as_deref() {
                line.push_str(&format!(" due {due}"));
            }
            if let Some(body) = r.body.as_deref().filter(|b| !b.is_empty()) {
                line.push_str(&format!("\n    {body}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct CalendarTool {
    loader: Arc<Loader>,
}

impl CalendarTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for CalendarTool {
    fn name(&self) -> &str {
        "calendar"
    }

    fn description(&self) -> &str {
        "Search, create, and open calendar events in Apple Calendar app"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["search", "open", "list", "create"]},
                "searchText": {"type": "string", "description": "Text to search for in event titles and locations (required for search)"},
                "eventId": {"type": "string", "description": "ID of the event to open (required for open)"},
                "limit": {"type": "number", "description": "Number of events to retrieve (optional, default 10)"},
                "fromDate": {"type": "string", "description": "Start of the window, ISO format (optional, default today)"},
                "toDate": {"type": "string", "description": "End of the window, ISO format (optional, default a week after fromDate)"},
                "title": {"type": "string", "description": "Title of the event (required for create)"},
                "startDate": {"type": "string", "description": "Start of the event, ISO format (required for create)"},
                "endDate": {"type": "string", "description": "End of the event, ISO format (required for create)"},
                "location": {"type": "string", "description": "Location of the event (optional for create)"},
                "notes": {"type": "string", "description": "Notes for the event (optional for create)"},
                "isAllDay": {"type": "boolean", "description": "Whether the event lasts all day (optional for create)"},
                "calendarName": {"type": "string", "description": "Calendar to add the event to (optional for create)"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: CalendarArgs = parse_args(self.name(), args)?;
        let calendar = self.loader.resolve_as::<Calendar>().await?;

        match args {
            CalendarArgs::Search {
                search_text,
                from_date,
                to_date,
                limit,
            } => {
                let (from, to) = date_window(self.name(), from_date.as_deref(), to_date.as_deref())?;
                let events = calendar.search(&search_text, from, to, limit).await?;
                Ok(format_events(
                    &events,
                    &format!("No events found for \"{search_text}\"."),
                ))
            }
            CalendarArgs::List {
                from_date,
                to_date,
                limit,
            } => {
                let (from, to) = date_window(self.name(), from_date.as_deref(), to_date.as_deref())?;
                let events = calendar.list(from, to, limit).await?;
                Ok(format_events(&events, "No events in that period."))
            }
            CalendarArgs::Open { event_id } => {
                calendar.open(&event_id).await?;
                Ok(format!("Opened event {event_id}."))
            }
            CalendarArgs::Create {
                title,
                start_date,
                end_date,
                location,
                notes,
                is_all_day,
                calendar_name,
            } => {
                let start = required_datetime(self.name(), "startDate", &start_date)?;
                let end = required_datetime(self.name(), "endDate", &end_date)?;
                let id = calendar
                    .create(&NewEvent {
                        title: title.clone(),
                        start,
                        end,
                        location,
                        notes,
                        all_day: is_all_day,
                        calendar: calendar_name,
                    })
                    .await?;
                Ok(format!("Created event \"{title}\" (id {id})."))
            }
        }
    }
}

fn format_events(events: &[Event], empty: &str) -> String {
    if events.is_empty() {
        return empty.to_string();
    }
    events
        .iter()
        .map(|e| {
            let when = if e.all_day {
                format!("{} (all day)", e.start)
            } else {
                format!("{} - {}", e.start, e.end)
            };
            let mut out = format!("{}\n  {}\n  Calendar: {}", e.title, when, e.calendar);
            if let Some(location) = e.location.as_deref() {
                out.push_str(&format!("\n  Location: {location}"));
            }
            out.push_str(&format!("\n  ID: {}", e.id));
            out
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct MapsTool {
    loader: Arc<Loader>,
}

impl MapsTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for MapsTool {
    fn name(&self) -> &str {
        "maps"
    }

    fn description(&self) -> &str {
        "Search locations, manage guides, save favorites, and get directions using Apple Maps"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["search", "save", "directions", "pin", "listGuides", "addToGuide", "createGuide"]},
                "query": {"type": "string", "description": "Search query for locations (required for search)"},
                "name": {"type": "string", "description": "Name of the location (required for save and pin)"},
                "address": {"type": "string", "description": "Address of the location (required for save, pin, addToGuide)"},
                "fromAddress": {"type": "string", "description": "Starting address (required for directions)"},
                "toAddress": {"type": "string", "description": "Destination address (required for directions)"},
                "transportType": {"type": "string", "enum": ["driving", "walking", "transit"], "description": "Type of transport (optional for directions)"},
                "guideName": {"type": "string", "description": "Name of the guide (required for createGuide and addToGuide)"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: MapsArgs = parse_args(self.name(), args)?;
        let maps = self.loader.resolve_as::<Maps>().await?;

        match args {
            MapsArgs::Search { query } => {
                let url = maps.search(&query).await?;
                Ok(format!("Showing results for \"{query}\" in Maps ({url})."))
            }
            MapsArgs::Save { name, address } => {
                let url = maps.save(&name, &address).await?;
                Ok(format!(
                    "Opened \"{name}\" at {address} in Maps ({url}); use the place card to add it to Favorites."
                ))
            }
            MapsArgs::Pin { name, address } => {
                let url = maps.pin(&name, &address).await?;
                Ok(format!("Dropped a pin for \"{name}\" at {address} ({url})."))
            }
            MapsArgs::Directions {
                from_address,
                to_address,
                transport_type,
            } => {
                let transport = Transport::parse(&transport_type).ok_or_else(|| {
                    invalid(
                        self.name(),
                        format!("unknown transportType \"{transport_type}\""),
                    )
                })?;
                let url = maps
                    .directions(&from_address, &to_address, transport)
                    .await?;
                Ok(format!(
                    "Showing {} directions from {} to {} ({url}).",
                    transport.as_str(),
                    from_address,
                    to_address
                ))
            }
            MapsArgs::ListGuides => {
                let url = maps.show_guides().await?;
                Ok(format!(
                    "Opened Guides in Maps ({url}). Guides cannot be read by automation; browse them in the app."
                ))
            }
            MapsArgs::AddToGuide {
                address,
                guide_name,
            } => {
                let url = maps.open_for_guide(&address).await?;
                Ok(format!(
                    "Opened {address} in Maps ({url}); choose \"Add to Guide\" and pick \"{guide_name}\"."
                ))
            }
            MapsArgs::CreateGuide { guide_name } => {
                let url = maps.show_guides().await?;
                Ok(format!(
                    "Opened Guides in Maps ({url}); choose \"New Guide\" and name it \"{guide_name}\"."
                ))
            }
        }
    }
}

pub struct WebSearchTool {
    loader: Arc<Loader>,
}

impl WebSearchTool {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "webSearch"
    }

    fn description(&self) -> &str {
        "Search the web and return result titles, links and snippets"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: WebSearchArgs = parse_args(self.name(), args)?;
        let search = self.loader.resolve_as::<WebSearch>().await?;

        let results = search.search(&args.query).await?;
        if results.is_empty() {
            return Ok(format!("No results found for \"{}\".", args.query));
        }
        Ok(results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::backend::BackendId;
    use crate::mcp::cache::testing::{FakeInitializer, Plan};
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime("2024-06-01T10:30:00Z").unwrap();
        assert_eq!(dt.with_timezone(&chrono::Utc).hour(), 10);

        let dt = parse_datetime("2024-06-01 08:15").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (8, 15));

        let dt = parse_datetime("2024-06-01").unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour()), (6, 1, 0));

        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn test_date_window_defaults_to_a_week() {
        let (from, to) = date_window("calendar", Some("2024-06-01"), None).unwrap();
        assert_eq!(to - from, Duration::days(7));
        assert!(date_window("calendar", Some("2024-06-08"), Some("2024-06-01")).is_err());
    }

    #[test]
    fn test_default_window_starts_at_midnight_today() {
        let before = Local::now();
        let (from, to) = date_window("calendar", None, None).unwrap();

        assert_eq!((from.hour(), from.minute(), from.second()), (0, 0, 0));
        assert!(from <= before);
        assert!(before - from < Duration::days(1));
        assert_eq!(to - from, Duration::days(7));
    }

    #[test]
    fn test_maps_search_takes_only_a_query() {
        let loader = Arc::new(Loader::new(Arc::new(FakeInitializer::new())));
        let schema = MapsTool::new(loader).input_schema();
        assert!(schema["properties"].get("limit").is_none());

        let args: MapsArgs =
            serde_json::from_value(json!({"operation": "search", "query": "coffee"})).unwrap();
        assert!(matches!(args, MapsArgs::Search { query } if query == "coffee"));
    }

    #[test]
    fn test_format_emails_lists_fields() {
        let emails = vec![Email {
            subject: "Hello".to_string(),
            sender: "a@b.com".to_string(),
            date: "Monday".to_string(),
            mailbox: "INBOX".to_string(),
            account: "Work".to_string(),
            preview: "Hi there".to_string(),
        }];
        let text = format_emails(&emails, "none");
        assert!(text.contains("Subject: Hello"));
        assert!(text.contains("Mailbox: INBOX (Work)"));
        assert_eq!(format_emails(&[], "none"), "none");
    }

    #[test]
    fn test_registry_lists_every_tool() {
        let loader = Arc::new(Loader::new(Arc::new(FakeInitializer::new())));
        let names: Vec<String> = build_registry(loader)
            .descriptors()
            .into_iter()
            .map(|d| d.name)
            .collect();
        for expected in [
            "calendar",
            "contacts",
            "mail",
            "maps",
            "messages",
            "notes",
            "reminders",
            "webSearch",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_is_reported_not_raised() {
        let init = FakeInitializer::new().with(BackendId::Mail, Plan::FailTimes(5));
        let loader = Arc::new(Loader::new(Arc::new(init)));
        loader.spawn();
        let registry = build_registry(loader);

        let resp = registry
            .invoke_tool("mail", json!({"operation": "accounts"}))
            .await;
        assert!(resp.is_error);
        assert!(resp.content[0].text.contains("mail backend"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_date_is_rejected_before_scripting() {
        let loader = Arc::new(Loader::new(Arc::new(FakeInitializer::new())));
        loader.spawn();
        let registry = build_registry(loader);

        let resp = registry
            .invoke_tool(
                "messages",
                json!({"operation": "schedule", "phoneNumber": "+1555", "message": "hi", "scheduledTime": "soon"}),
            )
            .await;
        assert!(resp.is_error);
        assert!(resp.content[0].text.contains("scheduledTime is not a valid date"));
    }
}
