//! Authenticated handle to the Google Calendar API.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::CalendarAuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::tokens::Credential;

/// Page size requested from list endpoints.
const PAGE_SIZE: usize = 250;

/// A calendar API client bound to one valid credential and one API version.
#[derive(Debug, Clone)]
pub struct CalendarService {
    credential: Credential,
    base_url: String,
    http_client: reqwest::Client,
}

impl CalendarService {
    /// Builds the handle.
    ///
    /// Fails if the credential is not valid at this moment, so a handle
    /// always starts out usable.
    pub fn new(
        credential: Credential,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> AuthResult<Self> {
        if !credential.is_valid() {
            return Err(AuthError::service(
                "cannot build calendar service from an invalid credential",
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AuthError::service(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            credential,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn api_name(&self) -> &'static str {
        CalendarAuthConfig::API_NAME
    }

    pub fn api_version(&self) -> &'static str {
        CalendarAuthConfig::API_VERSION
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn scopes(&self) -> &[String] {
        &self.credential.scopes
    }

    /// Lists the calendars on the user's calendar list.
    pub async fn list_calendars(&self) -> AuthResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("maxResults", PAGE_SIZE.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: CalendarListResponse = self.get_json(&url, &query).await?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("listed {} calendars", calendars.len());
        Ok(calendars)
    }

    /// Lists events starting in `[time_min, time_max)`, recurring events
    /// expanded into instances and ordered by start time. Cancelled events
    /// are skipped.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: Option<usize>,
    ) -> AuthResult<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );
        let page_size = max_results.map_or(PAGE_SIZE, |max| max.min(PAGE_SIZE));
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", page_size.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: EventListResponse = self.get_json(&url, &query).await?;
            events.extend(
                page.items
                    .into_iter()
                    .filter(|e| e.status.as_deref() != Some("cancelled")),
            );

            if let Some(max) = max_results
                && events.len() >= max
            {
                events.truncate(max);
                break;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("fetched {} events from calendar {}", events.len(), calendar_id);
        Ok(events)
    }

    async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> AuthResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let access_token = self.credential.access_token.as_deref().unwrap_or_default();

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                AuthError::network(format!("calendar request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::service("access token expired or invalid"));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::service(
                "access denied - the granted scopes do not cover this request",
            ));
        }

        let body = response.text().await.map_err(|e| {
            AuthError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            return Err(AuthError::service(format!("API error ({}): {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            AuthError::invalid_response(format!("failed to parse response: {}", e)).with_source(e)
        })
    }
}

/// An entry of the user's calendar list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub description: Option<String>,
    #[serde(default)]
    pub primary: bool,
    pub time_zone: Option<String>,
    pub access_role: Option<String>,
}

/// One event instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub html_link: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// Event start or end: a timestamp, or a date for all-day events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientSecrets;
    use crate::error::AuthErrorKind;
    use mockito::Matcher;

    fn credential(expires_in: i64) -> Credential {
        Credential::from_grant(
            &ClientSecrets::new("id", "secret"),
            "at",
            Some("rt".to_string()),
            Some(expires_in),
            vec!["cal.readonly".to_string()],
        )
        .unwrap()
    }

    fn service(base_url: &str) -> CalendarService {
        CalendarService::new(credential(3600), base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn refuses_invalid_credential() {
        let err = CalendarService::new(credential(-300), "http://localhost", Duration::from_secs(5))
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::Service);
    }

    #[test]
    fn exposes_api_identity_and_scopes() {
        let service = service("http://localhost/calendar/v3/");
        assert_eq!(service.api_name(), "calendar");
        assert_eq!(service.api_version(), "v3");
        assert_eq!(service.scopes(), ["cal.readonly".to_string()]);
        assert_eq!(service.base_url, "http://localhost/calendar/v3");
    }

    #[test]
    fn event_time_all_day() {
        let all_day = EventTime {
            date: NaiveDate::from_ymd_opt(2024, 3, 15),
            ..Default::default()
        };
        assert!(all_day.is_all_day());
        assert!(!EventTime::default().is_all_day());
    }

    #[tokio::test]
    async fn list_calendars_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::Regex("^maxResults=250$".into()))
            .match_header("authorization", "Bearer at")
            .with_status(200)
            .with_body(
                r#"{"items": [{"id": "primary@example.com", "summary": "Me", "primary": true,
                    "timeZone": "Europe/Paris", "accessRole": "owner"}],
                    "nextPageToken": "p2"}"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "team@example.com", "summary": "Team"}]}"#)
            .create_async()
            .await;

        let calendars = service(&server.url()).list_calendars().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(calendars.len(), 2);
        assert!(calendars[0].primary);
        assert_eq!(calendars[0].time_zone.as_deref(), Some("Europe/Paris"));
        assert_eq!(calendars[1].summary, "Team");
        assert!(!calendars[1].primary);
    }

    #[tokio::test]
    async fn list_events_skips_cancelled() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
                Matcher::UrlEncoded("maxResults".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"items": [
                    {"id": "e1", "summary": "Standup", "status": "confirmed",
                     "start": {"dateTime": "2024-03-15T10:00:00+01:00"},
                     "end": {"dateTime": "2024-03-15T10:15:00+01:00"}},
                    {"id": "e2", "status": "cancelled",
                     "start": {"dateTime": "2024-03-15T11:00:00Z"},
                     "end": {"dateTime": "2024-03-15T12:00:00Z"}},
                    {"id": "e3", "summary": "Offsite", "status": "confirmed",
                     "start": {"date": "2024-03-16"}, "end": {"date": "2024-03-17"}}
                ]}"#,
            )
            .create_async()
            .await;

        let now = Utc::now();
        let events = service(&server.url())
            .list_events("primary", now, now + chrono::Duration::days(1), Some(10))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary.as_deref(), Some("Standup"));
        assert_eq!(
            events[0].start.date_time.unwrap().to_rfc3339(),
            "2024-03-15T09:00:00+00:00"
        );
        assert!(events[1].start.is_all_day());
    }

    #[tokio::test]
    async fn unauthorized_is_a_service_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = service(&server.url()).list_calendars().await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::Service);
        assert!(err.message().contains("expired or invalid"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = service(&server.url()).list_calendars().await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidResponse);
    }
}
