//! Domain models, device-agnostic: map ABS entities and the other clients'
//! DTOs into the shapes the sync engine actually reasons about (spec §3, §9
//! "Duck-typed dict positions").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct SeriesRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum FileKind {
    Epub,
    Pdf,
    M4b,
    Mp3,
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct FileRef {
    pub kind: FileKind,
    pub url: String,
    pub size: Option<u64>,
    pub mime: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub series: Option<SeriesRef>,
    pub cover_url: Option<String>,
    pub formats: Vec<FileRef>,
    pub description: Option<String>,
}

/// The closed set of external services the core speaks to (spec §4.3).
/// Ordering is significant: it is the deterministic leader tie-break
/// (SPEC_FULL §9 Open Question 1) when `last_updated` and normalized
/// percentage are both equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClientName {
    Abs,
    KoReaderSync,
    Storyteller,
    Booklore,
    Hardcover,
}

impl ClientName {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientName::Abs => "abs",
            ClientName::KoReaderSync => "kosync",
            ClientName::Storyteller => "storyteller",
            ClientName::Booklore => "booklore",
            ClientName::Hardcover => "hardcover",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "abs" => ClientName::Abs,
            "kosync" => ClientName::KoReaderSync,
            "storyteller" => ClientName::Storyteller,
            "booklore" => ClientName::Booklore,
            "hardcover" => ClientName::Hardcover,
            _ => return None,
        })
    }

    /// Audiobook-coordinate clients report `timestamp`; text-coordinate
    /// clients report `percentage` plus a rich locator.
    pub fn is_audio(self) -> bool {
        matches!(self, ClientName::Abs)
    }
}

/// A position inside an ebook: character offset, percentage, and any of the
/// representations downstream clients understand (spec §4.5, GLOSSARY
/// "Locator").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub char_offset: Option<i64>,
    pub percentage: Option<f64>,
    pub xpath: Option<String>,
    pub css_selector: Option<String>,
    pub fragment: Option<String>,
    pub cfi: Option<String>,
}

/// Sum type replacing the source's duck-typed position dict (SPEC_FULL §9,
/// Design Notes "Duck-typed dict positions").
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPosition {
    Audio {
        timestamp_seconds: f64,
    },
    Text {
        percentage: f64,
        locator: Option<Locator>,
    },
}

impl ClientPosition {
    /// Normalize to a 0.0-1.0 fraction of the book (spec §4.8 step 3).
    /// Audio positions require a known `duration_seconds` to contribute.
    pub fn normalized_percentage(&self, duration_seconds: Option<f64>) -> Option<f64> {
        match self {
            ClientPosition::Audio { timestamp_seconds } => {
                let duration = duration_seconds?;
                if duration <= 0.0 {
                    return None;
                }
                Some((timestamp_seconds / duration).clamp(0.0, 1.0))
            }
            ClientPosition::Text { percentage, .. } => Some(percentage.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientState {
    pub book_id: String,
    pub client_name: ClientName,
    /// Monotonic wall-clock, seconds since epoch.
    pub last_updated: i64,
    pub position: ClientPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Audiobook,
    EbookOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    Pending,
    Processing,
    Active,
    FailedRetryLater,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Mapping {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub sync_mode: SyncMode,
    pub status: MappingStatus,
    pub duration_seconds: Option<f64>,
    pub alignment_ref: Option<String>,
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mapping {
    pub fn is_syncable(&self) -> bool {
        matches!(self.status, MappingStatus::Active)
    }
}

/// A candidate mapping surfaced at the edge of the trigger layer (C7) when a
/// client reports an external id with no matching `book_id` (spec §3
/// "Suggestion", optional).
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub id: uuid::Uuid,
    pub source_client: ClientName,
    pub external_id: String,
    pub candidate_book_id: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}
