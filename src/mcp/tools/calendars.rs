use serde_json::Value;

use super::{ToolDef, ToolError, to_result};
use crate::google::CalendarClient;

pub fn tool_defs() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "list-calendars",
            description: "List all available calendars",
            fields: &[],
        },
        ToolDef {
            name: "list-colors",
            description: "List color IDs for calendars and events",
            fields: &[],
        },
    ]
}

pub async fn list_calendars(client: &CalendarClient) -> Result<Value, ToolError> {
    let calendars = client.list_calendars().await?;
    to_result(&calendars)
}

pub async fn list_colors(client: &CalendarClient) -> Result<Value, ToolError> {
    let colors = client.list_colors().await?;
    to_result(&colors)
}
