use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::schema::{Field, FieldType};
use super::{ToolDef, ToolError, parse_args, to_result};
use crate::google::client::current_time;
use crate::google::types::{CalendarRef, FreeBusyRequest};
use crate::google::CalendarClient;

/// Answered locally, without credentials.
pub const GET_CURRENT_TIME: &str = "get-current-time";

const GET_FREEBUSY: &[Field] = &[
    Field::required("calendars", FieldType::CalendarRefs, "Calendars to query, as [{\"id\": ...}]"),
    Field::required("timeMin", FieldType::String, "Start of the interval (RFC 3339)"),
    Field::required("timeMax", FieldType::String, "End of the interval (RFC 3339)"),
    Field::optional("timeZone", FieldType::String, "IANA time zone used in the response"),
    Field::optional(
        "groupExpansionMax",
        FieldType::Integer { max: Some(100) },
        "Maximum calendars returned for a single group",
    ),
    Field::optional(
        "calendarExpansionMax",
        FieldType::Integer { max: Some(50) },
        "Maximum calendars to return free/busy for",
    ),
];

pub fn tool_defs() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "get-freebusy",
            description: "Query free/busy information for calendars",
            fields: GET_FREEBUSY,
        },
        ToolDef {
            name: GET_CURRENT_TIME,
            description: "Get current system time and timezone information",
            fields: &[],
        },
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyArgs {
    calendars: Vec<CalendarRef>,
    time_min: String,
    time_max: String,
    time_zone: Option<String>,
    group_expansion_max: Option<u32>,
    calendar_expansion_max: Option<u32>,
}

pub async fn get_freebusy(client: &CalendarClient, args: &Value) -> Result<Value, ToolError> {
    let args: FreeBusyArgs = parse_args(args)?;
    let request = FreeBusyRequest {
        time_min: args.time_min,
        time_max: args.time_max,
        time_zone: args.time_zone,
        group_expansion_max: args.group_expansion_max,
        calendar_expansion_max: args.calendar_expansion_max,
        items: args.calendars,
    };
    let response = client.free_busy(&request).await?;
    to_result(&response)
}

pub fn get_current_time(timezone: Option<&str>) -> Result<Value, ToolError> {
    to_result(&current_time(Utc::now(), timezone))
}
