use serde::Deserialize;
use serde_json::{Value, json};

use super::schema::{Field, FieldType};
use super::{ToolDef, ToolError, parse_args, to_result};
use crate::google::types::{Attendee, Event, EventDateTime, Reminders, SendUpdates};
use crate::google::{CalendarClient, EventQuery};

const SEND_UPDATES: FieldType = FieldType::Enum(SendUpdates::VALUES);

const LIST_EVENTS: &[Field] = &[
    Field::required("calendarId", FieldType::String, "Calendar ID, or \"primary\""),
    Field::optional("timeMin", FieldType::String, "Lower bound (RFC 3339) on event end time"),
    Field::optional("timeMax", FieldType::String, "Upper bound (RFC 3339) on event start time"),
    Field::optional("timeZone", FieldType::String, "IANA time zone used in the response"),
    Field::optional("maxResults", FieldType::Integer { max: None }, "Maximum number of events"),
    Field::optional("q", FieldType::String, "Free text filter"),
];

const SEARCH_EVENTS: &[Field] = &[
    Field::required("calendarId", FieldType::String, "Calendar ID, or \"primary\""),
    Field::required("query", FieldType::String, "Free text to search for"),
    Field::required("timeMin", FieldType::String, "Lower bound (RFC 3339) on event end time"),
    Field::required("timeMax", FieldType::String, "Upper bound (RFC 3339) on event start time"),
    Field::optional("timeZone", FieldType::String, "IANA time zone used in the response"),
    Field::optional("maxResults", FieldType::Integer { max: None }, "Maximum number of events (default 250)"),
];

const GET_EVENT: &[Field] = &[
    Field::required("calendarId", FieldType::String, "Calendar ID"),
    Field::required("eventId", FieldType::String, "Event ID"),
];

const CREATE_EVENT: &[Field] = &[
    Field::required("calendarId", FieldType::String, "Calendar ID, or \"primary\""),
    Field::required("summary", FieldType::String, "Event title"),
    Field::optional("description", FieldType::String, "Event description"),
    Field::required("start", FieldType::String, "Start time (RFC 3339)"),
    Field::required("end", FieldType::String, "End time (RFC 3339)"),
    Field::optional("timeZone", FieldType::String, "IANA time zone for start and end"),
    Field::optional("location", FieldType::String, "Event location"),
    Field::optional("attendees", FieldType::Attendees, "Guests to invite"),
    Field::optional("colorId", FieldType::String, "Event color ID (see list-colors)"),
    Field::optional("reminders", FieldType::Object, "Reminder settings"),
    Field::optional("recurrence", FieldType::StringList, "RRULE, EXRULE, RDATE or EXDATE lines"),
];

const UPDATE_EVENT: &[Field] = &[
    Field::required("calendarId", FieldType::String, "Calendar ID"),
    Field::required("eventId", FieldType::String, "Event ID"),
    Field::optional("summary", FieldType::String, "New title"),
    Field::optional("description", FieldType::String, "New description"),
    Field::optional("start", FieldType::String, "New start time (RFC 3339)"),
    Field::optional("end", FieldType::String, "New end time (RFC 3339)"),
    Field::optional("timeZone", FieldType::String, "IANA time zone for start and end"),
    Field::optional("location", FieldType::String, "New location"),
    Field::optional("attendees", FieldType::Attendees, "Replacement guest list"),
    Field::optional("colorId", FieldType::String, "New color ID"),
    Field::optional("reminders", FieldType::Object, "Reminder settings"),
    Field::optional("recurrence", FieldType::StringList, "Replacement recurrence lines"),
    Field::optional("sendUpdates", SEND_UPDATES, "Who to notify about the change"),
];

const DELETE_EVENT: &[Field] = &[
    Field::required("calendarId", FieldType::String, "Calendar ID"),
    Field::required("eventId", FieldType::String, "Event ID"),
    Field::optional("sendUpdates", SEND_UPDATES, "Who to notify about the cancellation"),
];

const MOVE_EVENT: &[Field] = &[
    Field::required("sourceCalendarId", FieldType::String, "Calendar the event is in now"),
    Field::required("targetCalendarId", FieldType::String, "Calendar to move it to"),
    Field::required("eventId", FieldType::String, "Event ID"),
];

pub fn tool_defs() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "list-events",
            description: "List events from a calendar within a time range",
            fields: LIST_EVENTS,
        },
        ToolDef {
            name: "create-event",
            description: "Create a new calendar event",
            fields: CREATE_EVENT,
        },
        ToolDef {
            name: "update-event",
            description: "Update an existing calendar event",
            fields: UPDATE_EVENT,
        },
        ToolDef {
            name: "delete-event",
            description: "Delete a calendar event",
            fields: DELETE_EVENT,
        },
        ToolDef {
            name: "search-events",
            description: "Search for events in a calendar by text query",
            fields: SEARCH_EVENTS,
        },
        ToolDef {
            name: "get-event",
            description: "Get details of a specific calendar event",
            fields: GET_EVENT,
        },
        ToolDef {
            name: "move-event",
            description: "Move an event from one calendar to another",
            fields: MOVE_EVENT,
        },
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsArgs {
    calendar_id: String,
    time_min: Option<String>,
    time_max: Option<String>,
    time_zone: Option<String>,
    max_results: Option<u32>,
    q: Option<String>,
}

pub async fn list_events(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: ListEventsArgs = parse_args(args)?;
    let query = EventQuery {
        time_min: args.time_min,
        time_max: args.time_max,
        time_zone: args.time_zone,
        max_results: args.max_results,
        q: args.q,
    };
    let events = client.list_events(&args.calendar_id, &query).await?;
    to_result(&events)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEventsArgs {
    calendar_id: String,
    query: String,
    time_min: String,
    time_max: String,
    time_zone: Option<String>,
    max_results: Option<u32>,
}

pub async fn search_events(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: SearchEventsArgs = parse_args(args)?;
    let window = EventQuery {
        time_min: Some(args.time_min),
        time_max: Some(args.time_max),
        time_zone: args.time_zone,
        max_results: args.max_results,
        q: None,
    };
    let events = client
        .search_events(&args.calendar_id, &args.query, window)
        .await?;
    to_result(&events)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRef {
    calendar_id: String,
    event_id: String,
}

pub async fn get_event(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: EventRef = parse_args(args)?;
    let event = client.get_event(&args.calendar_id, &args.event_id).await?;
    to_result(&event)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventArgs {
    calendar_id: String,
    summary: String,
    description: Option<String>,
    start: String,
    end: String,
    time_zone: Option<String>,
    location: Option<String>,
    attendees: Option<Vec<Attendee>>,
    color_id: Option<String>,
    reminders: Option<Reminders>,
    recurrence: Option<Vec<String>>,
}

pub async fn create_event(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: CreateEventArgs = parse_args(args)?;
    let zone = args.time_zone.as_deref();
    let event = Event {
        summary: Some(args.summary),
        description: args.description,
        location: args.location,
        color_id: args.color_id,
        start: Some(EventDateTime::timed(args.start, zone)),
        end: Some(EventDateTime::timed(args.end, zone)),
        attendees: args.attendees,
        reminders: args.reminders,
        recurrence: args.recurrence,
        ..Default::default()
    };
    let created = client.create_event(&args.calendar_id, &event).await?;
    to_result(&created)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateEventArgs {
    calendar_id: String,
    event_id: String,
    summary: Option<String>,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
    time_zone: Option<String>,
    location: Option<String>,
    attendees: Option<Vec<Attendee>>,
    color_id: Option<String>,
    reminders: Option<Reminders>,
    recurrence: Option<Vec<String>>,
    send_updates: Option<SendUpdates>,
}

impl UpdateEventArgs {
    /// The patch body: only what the caller supplied. A time zone on its own
    /// changes nothing; it qualifies a supplied start or end.
    fn changes(&self) -> Event {
        let zone = self.time_zone.as_deref();
        let timed = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| EventDateTime::timed(v, zone))
        };
        Event {
            summary: self.summary.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            color_id: self.color_id.clone(),
            start: timed(&self.start),
            end: timed(&self.end),
            attendees: self.attendees.clone(),
            reminders: self.reminders.clone(),
            recurrence: self.recurrence.clone(),
            ..Default::default()
        }
    }
}

pub async fn update_event(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: UpdateEventArgs = parse_args(args)?;
    let updated = client
        .update_event(
            &args.calendar_id,
            &args.event_id,
            &args.changes(),
            args.send_updates,
        )
        .await?;
    to_result(&updated)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteEventArgs {
    calendar_id: String,
    event_id: String,
    send_updates: Option<SendUpdates>,
}

pub async fn delete_event(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: DeleteEventArgs = parse_args(args)?;
    client
        .delete_event(&args.calendar_id, &args.event_id, args.send_updates)
        .await?;
    Ok(json!({"success": true}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveEventArgs {
    source_calendar_id: String,
    target_calendar_id: String,
    event_id: String,
}

pub async fn move_event(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: MoveEventArgs = parse_args(args)?;
    let moved = client
        .move_event(&args.source_calendar_id, &args.target_calendar_id, &args.event_id)
        .await?;
    to_result(&moved)
}
