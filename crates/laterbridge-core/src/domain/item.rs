//! Reading-list items and feed pages
//!
//! These are the canonical shapes. Provider JSON is mapped onto them by the
//! client's normalization layer; nothing here knows about provider field names.

use serde::{Deserialize, Serialize};

/// Where an item sits in the reader's library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Queued,
    ToRead,
    Archived,
    FeedRecommended,
}

impl ItemStatus {
    /// Numeric library state used by the provider
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Queued),
            2 => Some(Self::ToRead),
            3 => Some(Self::Archived),
            4 => Some(Self::FeedRecommended),
            _ => None,
        }
    }

    /// Textual status, tolerant of case and separator differences
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "queued" | "queue" | "inbox" => Some(Self::Queued),
            "toread" | "later" | "readlater" => Some(Self::ToRead),
            "archived" | "archive" => Some(Self::Archived),
            "feed" | "feedrecommended" | "recommended" => Some(Self::FeedRecommended),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::ToRead => "to-read",
            Self::Archived => "archived",
            Self::FeedRecommended => "feed-recommended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Item {
    /// Primary identifier, always rendered as a string
    pub id: String,
    /// Alternate identifier some provider responses carry (content id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    pub status: ItemStatus,
    /// Read progress in `[0, 1]`
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

impl Item {
    /// Whole-number percentage of the item that has been read
    pub fn progress_percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// One page of the reading-list feed.
///
/// `next_cursor == None` is the only end-of-feed signal; an empty page that
/// still carries a cursor must be followed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedPage {
    pub items: Vec<Item>,
    pub next_cursor: Option<String>,
}

impl FeedPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Identifiers the provider assigned to a newly saved URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_id: Option<String>,
}
