use std::fmt;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::oauth::OAuthClient;
use super::types::{
    CalendarListEntry, Colors, ErrorEnvelope, Event, FreeBusyRequest, FreeBusyResponse, ListPage,
    SendUpdates,
};
use crate::config::GoogleConfig;
use crate::error::CalendarError;

/// Default page size for text searches.
pub const SEARCH_MAX_RESULTS: u32 = 250;

/// OAuth credentials authorizing calls for one request. Never persisted here.
#[derive(Clone, Default)]
pub struct AuthInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthInfo {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The provider operations, used to pick how an error status is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    ListCalendars,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ListColors,
    FreeBusy,
    SearchEvents,
    GetEvent,
    MoveEvent,
}

impl Operation {
    fn not_found_subject(self) -> &'static str {
        match self {
            Operation::ListEvents | Operation::CreateEvent | Operation::SearchEvents => "Calendar",
            Operation::GetEvent | Operation::UpdateEvent | Operation::DeleteEvent => "Event",
            Operation::MoveEvent => "Event or calendar",
            Operation::ListCalendars | Operation::ListColors | Operation::FreeBusy => "Resource",
        }
    }
}

/// Map a failed provider response onto the error taxonomy.
fn classify(op: Operation, status: StatusCode, body: &str) -> CalendarError {
    match status {
        StatusCode::UNAUTHORIZED => CalendarError::AuthenticationExpired,
        StatusCode::NOT_FOUND => CalendarError::NotFound(op.not_found_subject()),
        StatusCode::FORBIDDEN if op == Operation::MoveEvent => CalendarError::PermissionDenied,
        _ => {
            let message = serde_json::from_str::<ErrorEnvelope>(body)
                .ok()
                .map(|e| e.error.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected response")
                        .to_string()
                });
            CalendarError::Provider {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Filters for an events listing. Instances of recurring events are always
/// expanded and ordered by start time.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub time_zone: Option<String>,
    pub max_results: Option<u32>,
    pub q: Option<String>,
}

impl EventQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        let optional = [
            ("timeMin", self.time_min.clone()),
            ("timeMax", self.time_max.clone()),
            ("timeZone", self.time_zone.clone()),
            ("maxResults", self.max_results.map(|n| n.to_string())),
            ("q", self.q.clone()),
        ];
        params.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        params
    }
}

/// Builds authenticated [`CalendarClient`]s.
#[derive(Debug, Clone)]
pub struct CalendarService {
    http: reqwest::Client,
    base_url: Url,
    oauth: OAuthClient,
}

impl CalendarService {
    pub fn new(
        http: reqwest::Client,
        config: &GoogleConfig,
        oauth: OAuthClient,
    ) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(config.calendar_api_base.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        Ok(Self {
            http,
            base_url,
            oauth,
        })
    }

    /// Seed a client with the given credentials, refreshing them once first
    /// if they have already expired.
    pub async fn connect(&self, auth: AuthInfo) -> Result<CalendarClient, CalendarError> {
        let mut client = CalendarClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            credentials: Some(auth),
        };
        client.ensure_fresh(&self.oauth, Utc::now()).await?;
        Ok(client)
    }
}

/// A Calendar API client bound to one set of credentials.
#[derive(Debug)]
pub struct CalendarClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<AuthInfo>,
}

impl CalendarClient {
    /// Single-attempt refresh. A rejected refresh token drops the credentials
    /// so nothing further can be sent with them.
    async fn ensure_fresh(
        &mut self,
        oauth: &OAuthClient,
        now: DateTime<Utc>,
    ) -> Result<(), CalendarError> {
        let creds = self
            .credentials
            .as_mut()
            .filter(|c| !c.access_token.trim().is_empty())
            .ok_or(CalendarError::NoTokenAvailable)?;

        if !creds.is_expired(now) {
            return Ok(());
        }
        let Some(refresh_token) = creds.refresh_token.clone() else {
            return Err(CalendarError::AuthenticationExpired);
        };

        match oauth.refresh(&refresh_token).await {
            Ok(tokens) => {
                creds.expires_at = tokens.expires_at(now);
                creds.access_token = tokens.access_token;
                if let Some(rotated) = tokens.refresh_token {
                    creds.refresh_token = Some(rotated);
                }
                if let Some(scope) = tokens.scope {
                    creds.scopes = scope.split_whitespace().map(str::to_string).collect();
                }
                Ok(())
            }
            Err(err) if err.is_invalid_grant() => {
                tracing::warn!(error = %err, "Refresh token rejected, clearing credentials");
                self.credentials = None;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_calendars(&self) -> Result<Vec<CalendarListEntry>, CalendarError> {
        let url = self.url(&["users", "me", "calendarList"]);
        let page: ListPage<CalendarListEntry> = self
            .send_json(Operation::ListCalendars, self.http.get(url))
            .await?;
        Ok(page.items)
    }

    pub async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<Event>, CalendarError> {
        self.events_page(Operation::ListEvents, calendar_id, query)
            .await
    }

    /// Free-text search within a window, defaulting to 250 results.
    pub async fn search_events(
        &self,
        calendar_id: &str,
        text: &str,
        mut query: EventQuery,
    ) -> Result<Vec<Event>, CalendarError> {
        query.q = Some(text.to_string());
        query.max_results = Some(query.max_results.unwrap_or(SEARCH_MAX_RESULTS));
        self.events_page(Operation::SearchEvents, calendar_id, &query)
            .await
    }

    async fn events_page(
        &self,
        op: Operation,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<Event>, CalendarError> {
        let url = self.url(&["calendars", calendar_id, "events"]);
        let page: ListPage<Event> = self
            .send_json(op, self.http.get(url).query(&query.params()))
            .await?;
        Ok(page.items)
    }

    pub async fn create_event(
        &self,
        calendar_id: &str,
        event: &Event,
    ) -> Result<Event, CalendarError> {
        let url = self.url(&["calendars", calendar_id, "events"]);
        self.send_json(Operation::CreateEvent, self.http.post(url).json(event))
            .await
    }

    /// Patch an event. Only the fields set on `changes` are sent.
    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        changes: &Event,
        send_updates: Option<SendUpdates>,
    ) -> Result<Event, CalendarError> {
        let url = self.url(&["calendars", calendar_id, "events", event_id]);
        let request = self
            .http
            .patch(url)
            .query(&send_updates_param(send_updates))
            .json(changes);
        self.send_json(Operation::UpdateEvent, request).await
    }

    pub async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        send_updates: Option<SendUpdates>,
    ) -> Result<(), CalendarError> {
        let url = self.url(&["calendars", calendar_id, "events", event_id]);
        let request = self
            .http
            .delete(url)
            .query(&send_updates_param(send_updates));
        self.send(Operation::DeleteEvent, request).await?;
        Ok(())
    }

    pub async fn list_colors(&self) -> Result<Colors, CalendarError> {
        let url = self.url(&["colors"]);
        self.send_json(Operation::ListColors, self.http.get(url))
            .await
    }

    pub async fn free_busy(
        &self,
        request: &FreeBusyRequest,
    ) -> Result<FreeBusyResponse, CalendarError> {
        let url = self.url(&["freeBusy"]);
        self.send_json(Operation::FreeBusy, self.http.post(url).json(request))
            .await
    }

    pub async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Event, CalendarError> {
        let url = self.url(&["calendars", calendar_id, "events", event_id]);
        self.send_json(Operation::GetEvent, self.http.get(url))
            .await
    }

    /// Change an event's organizer calendar.
    pub async fn move_event(
        &self,
        source_calendar_id: &str,
        target_calendar_id: &str,
        event_id: &str,
    ) -> Result<Event, CalendarError> {
        let url = self.url(&["calendars", source_calendar_id, "events", event_id, "move"]);
        let request = self
            .http
            .post(url)
            .query(&[("destination", target_calendar_id)]);
        self.send_json(Operation::MoveEvent, request).await
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked to be a base URL in CalendarService::new.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: Operation,
        request: RequestBuilder,
    ) -> Result<T, CalendarError> {
        let response = self.send(op, request).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send(&self, op: Operation, request: RequestBuilder) -> Result<Response, CalendarError> {
        let token = self
            .credentials
            .as_ref()
            .map(|c| c.access_token.as_str())
            .ok_or(CalendarError::NoTokenAvailable)?;

        let response = request
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify(op, status, &body);
        tracing::debug!(?op, status = status.as_u16(), error = %err, "Calendar API call failed");
        Err(err)
    }
}

fn send_updates_param(send_updates: Option<SendUpdates>) -> Vec<(&'static str, &'static str)> {
    send_updates
        .map(|s| vec![("sendUpdates", s.as_str())])
        .unwrap_or_default()
}

/// The server's view of "now".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTime {
    pub current_time: String,
    pub local_time: String,
    pub timezone: String,
    pub timestamp: i64,
}

/// Describe `now` without touching the network. `timezone` names the zone to
/// report; without one the host's IANA zone is used, or its UTC offset when
/// the host zone cannot be determined.
pub fn current_time(now: DateTime<Utc>, timezone: Option<&str>) -> CurrentTime {
    let local = now.with_timezone(&Local);
    let timezone = match timezone {
        Some(zone) => zone.to_string(),
        None => iana_time_zone::get_timezone().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Host time zone unknown, reporting offset");
            local.format("%:z").to_string()
        }),
    };
    CurrentTime {
        current_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        local_time: local.format("%Y-%m-%d %H:%M:%S").to_string(),
        timezone,
        timestamp: now.timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::testing;
    use crate::google::types::{Attendee, CalendarRef, EventDateTime};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn live_auth(token: &str) -> AuthInfo {
        AuthInfo {
            access_token: token.to_string(),
            refresh_token: Some("rt-1".to_string()),
            client_id: Some("test-client-id".to_string()),
            scopes: vec![],
            expires_at: Some(Utc::now() + Duration::hours(1)),
        }
    }

    fn expired_auth() -> AuthInfo {
        AuthInfo {
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            ..live_auth("at-stale")
        }
    }

    async fn connect(server: &MockServer, auth: AuthInfo) -> Result<CalendarClient, CalendarError> {
        testing::calendar_service(&server.uri()).connect(auth).await
    }

    // ---- Credential handling ----

    #[tokio::test]
    async fn test_live_token_does_not_refresh() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        assert_eq!(client.credentials.as_ref().unwrap().access_token, "at-1");
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-fresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/users/me/calendarList"))
            .and(header("authorization", "Bearer at-fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "primary", "summary": "Me", "accessRole": "owner", "primary": true}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, expired_auth()).await.unwrap();
        let creds = client.credentials.as_ref().unwrap();
        assert_eq!(creds.access_token, "at-fresh");
        assert_eq!(creds.refresh_token.as_deref(), Some("rt-1"));
        assert!(!creds.is_expired(Utc::now()));

        let calendars = client.list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].primary, Some(true));
    }

    #[tokio::test]
    async fn test_invalid_grant_requires_reauth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/calendar/v3/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let service = testing::calendar_service(&server.uri());
        let mut client = CalendarClient {
            http: reqwest::Client::new(),
            base_url: Url::parse(&format!("{}/calendar/v3", server.uri())).unwrap(),
            credentials: Some(expired_auth()),
        };
        let err = client
            .ensure_fresh(&service.oauth, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::ReauthRequired(ref r) if r.contains("invalid_grant")));
        assert!(client.credentials.as_ref().is_none());
        assert!(matches!(
            client.list_calendars().await,
            Err(CalendarError::NoTokenAvailable)
        ));
    }

    #[tokio::test]
    async fn test_refresh_server_error_does_not_use_stale_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let err = connect(&server, expired_auth()).await.unwrap_err();
        assert!(matches!(err, CalendarError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let server = MockServer::start().await;
        let auth = AuthInfo {
            refresh_token: None,
            ..expired_auth()
        };
        let err = connect(&server, auth).await.unwrap_err();
        assert!(matches!(err, CalendarError::AuthenticationExpired));
    }

    #[tokio::test]
    async fn test_empty_token_fails_fast() {
        let server = MockServer::start().await;
        let err = connect(&server, testing::bearer("  ")).await.unwrap_err();
        assert!(matches!(err, CalendarError::NoTokenAvailable));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", live_auth("secret-access"));
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("rt-1"));
    }

    // ---- Operations ----

    #[tokio::test]
    async fn test_list_events_expands_and_orders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("timeMin", "2024-01-01T00:00:00Z"))
            .and(query_param("maxResults", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "a", "summary": "First", "start": {"dateTime": "2024-01-01T09:00:00Z"}},
                    {"id": "b", "summary": "Second", "start": {"dateTime": "2024-01-01T11:00:00Z"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let query = EventQuery {
            time_min: Some("2024-01-01T00:00:00Z".into()),
            max_results: Some(10),
            ..Default::default()
        };
        let events = client.list_events("primary", &query).await.unwrap();
        let ids: Vec<_> = events.iter().filter_map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_search_defaults_to_250_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(query_param("q", "standup"))
            .and(query_param("maxResults", "250"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let events = client
            .search_events("primary", "standup", EventQuery::default())
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_create_event_echoes_fields() {
        let server = MockServer::start().await;
        let sent = json!({
            "summary": "Sync",
            "start": {"dateTime": "2024-01-01T10:00:00Z"},
            "end": {"dateTime": "2024-01-01T10:30:00Z"},
            "attendees": [{"email": "bob@example.com"}]
        });
        let mut created = sent.clone();
        created["id"] = json!("evt123");
        created["status"] = json!("confirmed");

        Mock::given(method("POST"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(body_json(&sent))
            .respond_with(ResponseTemplate::new(200).set_body_json(&created))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let event = Event {
            summary: Some("Sync".into()),
            start: Some(EventDateTime::timed("2024-01-01T10:00:00Z", None)),
            end: Some(EventDateTime::timed("2024-01-01T10:30:00Z", None)),
            attendees: Some(vec![Attendee {
                email: "bob@example.com".into(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let result = client.create_event("primary", &event).await.unwrap();
        assert_eq!(result.id.as_deref(), Some("evt123"));
        assert_eq!(result.summary.as_deref(), Some("Sync"));
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/calendar/v3/calendars/primary/events/evt1"))
            .and(query_param("sendUpdates", "none"))
            .and(body_json(json!({"location": "Room 4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "evt1", "summary": "Sync", "location": "Room 4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let changes = Event {
            location: Some("Room 4".into()),
            ..Default::default()
        };
        let event = client
            .update_event("primary", "evt1", &changes, Some(SendUpdates::None))
            .await
            .unwrap();
        assert_eq!(event.summary.as_deref(), Some("Sync"));
    }

    #[tokio::test]
    async fn test_delete_event() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendar/v3/calendars/primary/events/evt1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        client.delete_event("primary", "evt1", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_free_busy_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendar/v3/freeBusy"))
            .and(body_json(json!({
                "timeMin": "2024-01-01T00:00:00Z",
                "timeMax": "2024-01-02T00:00:00Z",
                "items": [{"id": "primary"}, {"id": "team"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "calendar#freeBusy",
                "timeMin": "2024-01-01T00:00:00Z",
                "timeMax": "2024-01-02T00:00:00Z",
                "calendars": {
                    "primary": {"busy": [{"start": "2024-01-01T10:00:00Z", "end": "2024-01-01T11:00:00Z"}]},
                    "team": {"busy": []}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let response = client
            .free_busy(&FreeBusyRequest {
                time_min: "2024-01-01T00:00:00Z".into(),
                time_max: "2024-01-02T00:00:00Z".into(),
                time_zone: None,
                group_expansion_max: None,
                calendar_expansion_max: None,
                items: vec![
                    CalendarRef { id: "primary".into() },
                    CalendarRef { id: "team".into() },
                ],
            })
            .await
            .unwrap();
        assert_eq!(response.calendars["primary"].busy.len(), 1);
        assert_eq!(response.extra["kind"], "calendar#freeBusy");
    }

    // ---- Error normalization ----

    #[tokio::test]
    async fn test_get_missing_event_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "Not Found"}
            })))
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let err = client.get_event("primary", "missing").await.unwrap_err();
        assert!(matches!(err, CalendarError::NotFound("Event")));
    }

    #[tokio::test]
    async fn test_move_forbidden_is_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendar/v3/calendars/primary/events/evt1/move"))
            .and(query_param("destination", "readonly"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Forbidden"}
            })))
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let err = client
            .move_event("primary", "readonly", "evt1")
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_forbidden_elsewhere_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/colors"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Rate Limit Exceeded"}
            })))
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-1")).await.unwrap();
        let err = client.list_colors().await.unwrap_err();
        assert!(matches!(
            err,
            CalendarError::Provider { status: 403, ref message } if message == "Rate Limit Exceeded"
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = connect(&server, live_auth("at-revoked")).await.unwrap();
        let err = client.list_calendars().await.unwrap_err();
        assert!(matches!(err, CalendarError::AuthenticationExpired));
    }

    // ---- Current time ----

    #[test]
    fn test_current_time_is_pure() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let t = current_time(now, Some("Europe/Berlin"));
        assert_eq!(t.current_time, "2024-01-01T10:00:00.000Z");
        assert_eq!(t.timezone, "Europe/Berlin");
        assert_eq!(t.timestamp, 1_704_103_200_000);
    }

    #[test]
    fn test_current_time_reports_host_zone() {
        let t = current_time(Utc::now(), None);
        match iana_time_zone::get_timezone() {
            Ok(zone) => assert_eq!(t.timezone, zone),
            Err(_) => assert!(t.timezone.starts_with('+') || t.timezone.starts_with('-')),
        }
    }
}
