use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    pub created_at: i64,

    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl Task {
    /// Builds an active task. `text` is expected to be already normalized.
    pub fn new(id: String, text: String, now: i64) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }

    /// Copy with `completed` flipped; `completed_at` follows the new state.
    pub fn toggled(&self, now: i64) -> Self {
        let completed = !self.completed;
        Self {
            completed,
            completed_at: completed.then_some(now),
            ..self.clone()
        }
    }

    pub fn with_text(&self, text: String) -> Self {
        Self {
            text,
            ..self.clone()
        }
    }
}

/// Trimmed task text, or `None` when nothing but whitespace remains.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn format_timestamp(ms: i64, tz: Tz) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|at| at.with_timezone(&tz).format("%d %b %Y %H:%M").to_string())
        .unwrap_or_default()
}
