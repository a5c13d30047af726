use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::extract::dates;

/// Identity: (external module id, course). `due_date` keeps the scraped
/// text; `None` means unknown, which is distinct from "no deadline".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub module_id: i64,
    pub course_id: i64,
    pub title: String,
    pub url: String,
    pub due_date: Option<String>,
    pub is_completed: bool,
}

impl Assignment {
    /// Best-effort parse of the stored due-date text. `None` when the text
    /// is absent or matches no supported format.
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        self.due_date.as_deref().and_then(dates::parse_date)
    }
}

/// Identity: (external module id, course). Lectures with tracking disabled
/// can never be driven to completed by the watch emulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoLecture {
    pub module_id: i64,
    pub course_id: i64,
    pub title: String,
    pub url: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_completed: bool,
    pub has_tracking: bool,
}

impl VideoLecture {
    pub fn available_until(&self) -> Option<NaiveDateTime> {
        self.end_date.as_deref().and_then(dates::parse_date)
    }
}

/// Identity: (external module id, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResource {
    pub module_id: i64,
    pub course_id: i64,
    pub title: String,
    pub url: String,
    pub is_completed: bool,
}

/// Identity: (external board id, course). Owns its posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub board_id: i64,
    pub course_id: i64,
    pub title: String,
    pub url: String,
}

/// Identity: the source URL. The site exposes no reliable numeric id for
/// posts, and titles and dates can collide across distinct posts.
/// `content` is fetched once on first sight and cached; a populated value
/// is never re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub board_id: i64,
    pub url: String,
    pub title: String,
    pub writer: String,
    pub date: String,
    pub content: Option<String>,
}
