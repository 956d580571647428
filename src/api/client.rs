use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::api::models::{ClassTeacherAssignment, Contact, NewThread, RespondBody, Thread, ThreadResponse};
use crate::error::ApiError;

/// Keys under which list endpoints have been seen to wrap their payload.
const LIST_KEYS: [&str; 4] = ["data", "contacts", "requests", "threads"];

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub http: HttpClient,
    base_api: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClient::new(),
            base_api: Self::base_api(base_url),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, base_api: Self::base_api(base_url) })
    }

    fn base_api(base_url: &str) -> String {
        let trimmed = crate::utils::normalize_url(base_url);
        let trimmed = trimmed.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    /// Append `segments` to the API base, percent-encoding each one so ids
    /// containing `/`, `?` or `#` stay inside their segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_api)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::BadBase(self.base_api.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let endpoint = self.endpoint(segments)?;
        log::debug!("GET {endpoint}");
        let resp = self.http.get(endpoint).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        Ok(resp.json::<Value>().await?)
    }

    async fn post_json<B: serde::Serialize>(&self, segments: &[&str], body: &B) -> Result<Value, ApiError> {
        let endpoint = self.endpoint(segments)?;
        log::debug!("POST {endpoint}");
        let resp = self.http.post(endpoint).json(body).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Accepts a bare array or an object wrapping one; items that fail to decode are skipped.
    fn decode_list<T: DeserializeOwned>(json: Value) -> Result<Vec<T>, ApiError> {
        let items = match json {
            Value::Array(arr) => arr,
            Value::Object(mut map) => LIST_KEYS
                .iter()
                .find_map(|k| match map.remove(*k) {
                    Some(Value::Array(arr)) => Some(arr),
                    _ => None,
                })
                .ok_or_else(|| ApiError::Decode("expected a list".into()))?,
            other => return Err(ApiError::Decode(format!("expected a list, got {other}"))),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<T>(item) {
                Ok(v) => out.push(v),
                Err(e) => log::warn!("skipping malformed list item: {e}"),
            }
        }
        Ok(out)
    }

    /// Accepts either the thread itself or an object wrapping it.
    fn decode_thread(json: Value) -> Option<Thread> {
        let candidate = json
            .as_object()
            .and_then(|map| {
                ["data", "request", "thread"]
                    .iter()
                    .find_map(|k| map.get(*k).filter(|v| v.is_object()).cloned())
            })
            .unwrap_or(json);
        serde_json::from_value(candidate).ok()
    }

    pub async fn contacts_general(&self) -> Result<Vec<Contact>, ApiError> {
        Self::decode_list(self.get_json(&["chats", "contacts"]).await?)
    }

    pub async fn contacts_admin(&self) -> Result<Vec<Contact>, ApiError> {
        Self::decode_list(self.get_json(&["chats", "contacts", "admin"]).await?)
    }

    pub async fn contacts_teacher(&self, staff_id: &str) -> Result<Vec<Contact>, ApiError> {
        Self::decode_list(self.get_json(&["chats", "contacts", "teacher", staff_id]).await?)
    }

    pub async fn contacts_guardian(&self, username: &str) -> Result<Vec<Contact>, ApiError> {
        Self::decode_list(self.get_json(&["chats", "contacts", "guardian", username]).await?)
    }

    pub async fn class_teachers(&self) -> Result<Vec<ClassTeacherAssignment>, ApiError> {
        Self::decode_list(self.get_json(&["class-teachers"]).await?)
    }

    /// All threads in which `local_id` is either sender or recipient.
    pub async fn threads_for(&self, local_id: &str) -> Result<Vec<Thread>, ApiError> {
        Self::decode_list(self.get_json(&["chats", "user", local_id]).await?)
    }

    pub async fn create_thread(&self, body: &NewThread) -> Result<Thread, ApiError> {
        let json = self.post_json(&["chats", "requests"], body).await?;
        Self::decode_thread(json).ok_or_else(|| ApiError::Decode("no thread in response".into()))
    }

    /// Returns the updated thread when the server echoes it back.
    pub async fn respond(&self, thread_id: &str, responses: Vec<ThreadResponse>) -> Result<Option<Thread>, ApiError> {
        let body = RespondBody { responses };
        let json = self.post_json(&["chats", "requests", thread_id, "respond"], &body).await?;
        Ok(Self::decode_thread(json))
    }
}
