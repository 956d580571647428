use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Director,
    Guardian,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Teacher, Role::Director, Role::Guardian, Role::Admin];

    /// Directory ordering: teachers first, then directors.
    pub fn rank(self) -> u8 {
        match self {
            Role::Teacher => 0,
            Role::Director => 1,
            Role::Admin => 2,
            Role::Guardian => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Director => "director",
            Role::Guardian => "guardian",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub name: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Ward>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// One row of the class-teacher assignment table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTeacherAssignment {
    pub class: String,
    pub teacher_id: String,
    pub teacher_name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Pending,
    Responded,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub answer: String,
    pub timestamp: String,
}

/// A message thread ("request"): one or more questions and the answers to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(alias = "_id")]
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    #[serde(deserialize_with = "non_empty_questions")]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<Vec<ThreadResponse>>,
    pub status: ThreadStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

fn non_empty_questions<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    let questions = Vec::<String>::deserialize(de)?;
    if questions.is_empty() {
        return Err(serde::de::Error::invalid_length(0, &"at least one question"));
    }
    Ok(questions)
}

/// Naive layouts seen from SQL-backed servers; read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// RFC 3339, a naive date-time, or epoch milliseconds. Anything else becomes
/// `None` so the thread survives and only its ordering suffers.
fn lenient_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let parsed = match Value::deserialize(de)? {
        Value::Null => return Ok(None),
        Value::String(raw) => parse_timestamp(&raw),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };
    if parsed.is_none() {
        log::debug!("unreadable created_at, thread will sort last");
    }
    Ok(parsed)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.and_utc())
}

impl Thread {
    /// The party on the other side of this thread as seen from `local`.
    pub fn counterpart_of(&self, local: &str) -> &str {
        if self.sender_id == local { &self.recipient_id } else { &self.sender_id }
    }

    pub fn has_responses(&self) -> bool {
        self.responses.as_ref().is_some_and(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub sender_id: String,
    pub recipient_id: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondBody {
    pub responses: Vec<ThreadResponse>,
}
