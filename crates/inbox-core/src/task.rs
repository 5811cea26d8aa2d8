use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Parses a user-supplied id, ignoring surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::MissingId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskId {
    type Error = InputError;

    /// Stored ids are taken as written; only a blank id is refused.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(InputError::MissingId);
        }
        Ok(Self(value))
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Dismissed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four inbox tabs. `ALL` is the display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Urgent,
    Lead,
    Invoice,
    Personal,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Urgent,
        Category::Lead,
        Category::Invoice,
        Category::Personal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Urgent => "urgent",
            Category::Lead => "lead",
            Category::Invoice => "invoice",
            Category::Personal => "personal",
        }
    }
}

impl FromStr for Category {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| InputError::UnknownCategory(wanted.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    Rule,
    Ai,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,

    pub lead_email: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub last_body: String,

    #[serde(default)]
    pub ai_suggested_message: String,

    pub status: Status,

    #[serde(default)]
    pub category: Option<Category>,

    #[serde(default)]
    pub category_confidence: Option<f64>,

    #[serde(default)]
    pub category_source: Option<CategorySource>,

    #[serde(default)]
    pub thread_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new_pending(id: TaskId, lead_email: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            lead_email,
            reason: String::new(),
            last_body: String::new(),
            ai_suggested_message: String::new(),
            status: Status::Pending,
            category: None,
            category_confidence: None,
            category_source: None,
            thread_id: None,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }
}
