pub mod availability;
pub mod calendars;
pub mod events;
pub mod schema;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::credentials::CredentialResolver;
use crate::error::CalendarError;
use crate::google::{CalendarClient, CalendarService};
use crate::identity::IdentityProvider;
use schema::Field;

/// A tool definition for the MCP tools/list response.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [Field],
}

impl ToolDef {
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": schema::to_json_schema(self.fields),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Every tool, in the order `tools/list` reports them.
pub fn all_tools() -> Vec<ToolDef> {
    let mut tools = Vec::new();
    tools.extend(calendars::tool_defs());
    tools.extend(events::tool_defs());
    tools.extend(availability::tool_defs());
    tools
}

/// Validates, authorizes and dispatches tool calls.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
    resolver: CredentialResolver,
    calendar: CalendarService,
    default_timezone: Option<String>,
}

impl ToolRegistry {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        calendar: CalendarService,
        client_id: impl Into<String>,
        default_timezone: Option<String>,
    ) -> Self {
        Self {
            tools: all_tools(),
            resolver: CredentialResolver::new(identity, client_id),
            calendar,
            default_timezone,
        }
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(ToolDef::to_json).collect()
    }

    /// Run one tool for one user. Arguments are checked against the tool's
    /// field table before any credential lookup or network traffic.
    pub async fn call(&self, user_id: &str, name: &str, args: &Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        schema::validate(tool.fields, args).map_err(ToolError::InvalidArguments)?;

        tracing::debug!(tool = name, user_id, "Calling tool");

        if name == availability::GET_CURRENT_TIME {
            return availability::get_current_time(self.default_timezone.as_deref());
        }

        let result = self.call_authorized(user_id, name, args).await;
        match &result {
            Err(ToolError::Calendar(CalendarError::ReauthRequired(reason))) => {
                tracing::warn!(tool = name, user_id, reason = %reason, "Google consent revoked");
                if let Err(err) = self.resolver.revoke(user_id).await {
                    tracing::warn!(user_id, error = %err, "Failed to clear stored Google tokens");
                }
            }
            Err(err) => tracing::warn!(tool = name, user_id, error = %err, "Tool call failed"),
            Ok(_) => {}
        }
        result
    }

    async fn call_authorized(
        &self,
        user_id: &str,
        name: &str,
        args: &Value,
    ) -> Result<Value, ToolError> {
        let auth = self.resolver.resolve(user_id).await?;
        let client = self.calendar.connect(auth).await?;
        dispatch(&client, name, args).await
    }
}

async fn dispatch(client: &CalendarClient, name: &str, args: &Value) -> Result<Value, ToolError> {
    match name {
        "list-calendars" => calendars::list_calendars(client).await,
        "list-colors" => calendars::list_colors(client).await,
        "list-events" => events::list_events(client, args).await,
        "search-events" => events::search_events(client, args).await,
        "get-event" => events::get_event(client, args).await,
        "create-event" => events::create_event(client, args).await,
        "update-event" => events::update_event(client, args).await,
        "delete-event" => events::delete_event(client, args).await,
        "move-event" => events::move_event(client, args).await,
        "get-freebusy" => availability::get_freebusy(client, args).await,
        _ => Err(ToolError::UnknownTool(name.to_string())),
    }
}

/// Decode already-validated arguments into a handler's input type.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn to_result<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    Ok(serde_json::to_value(value)?)
}
