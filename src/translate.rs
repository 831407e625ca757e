//! Translator (C6, spec §4.6): converts the elected leader's position into a
//! locator each follower can write back, bridging audio and text coordinate
//! systems via the alignment map (C4) and text locator (C5).

use crate::align::AlignmentMap;
use crate::client::Client;
use crate::domain::models::{ClientName, ClientPosition, Mapping};
use crate::errors::{SyncError, SyncResult};
use crate::locate::{ParsedDocument, TextLocator};

pub struct Translator {
    locator: TextLocator,
}

/// Context the sync engine hands in per follower; what's available depends
/// on the mapping's sync mode and whether alignment has been built yet.
pub struct TranslationContext<'a> {
    pub alignment: Option<&'a AlignmentMap>,
    /// The canonical ebook, parsed once and cached (spec §5 "bounded LRU").
    pub ebook: Option<&'a ParsedDocument>,
    pub duration_seconds: Option<f64>,
    /// Set when the leader's own alignment came from the follower's
    /// forced-alignment data (spec §4.6 "Storyteller-native fast path").
    pub native_fast_path: bool,
}

impl Translator {
    pub fn new(fuzzy_window_fraction: f64, fuzzy_threshold: u8) -> Self {
        Translator {
            locator: TextLocator::new(fuzzy_window_fraction, fuzzy_threshold),
        }
    }

    /// `leader_client` is used to pull a text snippet around the leader's
    /// own reported position when crossing from audio to text coordinates.
    pub async fn translate(
        &self,
        book: &Mapping,
        leader_position: &ClientPosition,
        leader_client: &dyn Client,
        follower: ClientName,
        ctx: &TranslationContext<'_>,
    ) -> SyncResult<ClientPosition> {
        let follower_is_audio = follower.is_audio();
        let leader_is_audio = matches!(leader_position, ClientPosition::Audio { .. });

        if follower_is_audio == leader_is_audio {
            return self.pass_through(leader_position, ctx.duration_seconds);
        }

        if ctx.native_fast_path && follower == ClientName::Storyteller {
            return self.native_fast_path(leader_position, ctx.duration_seconds);
        }

        match leader_position {
            ClientPosition::Audio { timestamp_seconds } => {
                self.audio_to_text(book, *timestamp_seconds, leader_client, ctx)
                    .await
            }
            ClientPosition::Text { .. } => {
                self.text_to_audio(book, leader_position, leader_client, ctx)
                    .await
            }
        }
    }

    fn pass_through(
        &self,
        leader_position: &ClientPosition,
        duration_seconds: Option<f64>,
    ) -> SyncResult<ClientPosition> {
        match leader_position {
            ClientPosition::Audio { .. } => Ok(leader_position.clone()),
            ClientPosition::Text { percentage, locator } => Ok(ClientPosition::Text {
                percentage: *percentage,
                locator: locator.clone(),
            }),
        }
        .map(|p| {
            // Percentage is already normalized against known duration by the
            // caller; nothing further to convert for same-coordinate passthrough.
            let _ = duration_seconds;
            p
        })
    }

    fn native_fast_path(
        &self,
        leader_position: &ClientPosition,
        duration_seconds: Option<f64>,
    ) -> SyncResult<ClientPosition> {
        let percentage = leader_position
            .normalized_percentage(duration_seconds)
            .ok_or_else(|| {
                SyncError::InvalidData("native fast path requires known duration".into())
            })?;
        Ok(ClientPosition::Text {
            percentage,
            locator: None,
        })
    }

    async fn audio_to_text(
        &self,
        book: &Mapping,
        timestamp_seconds: f64,
        leader_client: &dyn Client,
        ctx: &TranslationContext<'_>,
    ) -> SyncResult<ClientPosition> {
        let alignment = ctx
            .alignment
            .ok_or_else(|| SyncError::Fatal("no alignment map built for this book".into()))?;
        let ebook = ctx
            .ebook
            .ok_or_else(|| SyncError::Fatal("no parsed ebook available for this book".into()))?;

        let hint_char = alignment.time_to_char(timestamp_seconds);
        let hint_pct = if ebook.full_text.chars().count() > 0 {
            Some(hint_char as f64 / ebook.full_text.chars().count() as f64)
        } else {
            None
        };

        let snippet = leader_client
            .text_at(
                book,
                &ClientPosition::Audio {
                    timestamp_seconds,
                },
            )
            .await?;

        let locator = self.locator.locate(ebook, &snippet, hint_pct)?;
        let percentage = locator.percentage.unwrap_or(0.0);
        Ok(ClientPosition::Text {
            percentage,
            locator: Some(locator),
        })
    }

    async fn text_to_audio(
        &self,
        book: &Mapping,
        leader_position: &ClientPosition,
        leader_client: &dyn Client,
        ctx: &TranslationContext<'_>,
    ) -> SyncResult<ClientPosition> {
        let ClientPosition::Text { percentage, .. } = leader_position else {
            return Err(SyncError::InvalidData(
                "text_to_audio requires a text position".into(),
            ));
        };
        let alignment = ctx
            .alignment
            .ok_or_else(|| SyncError::Fatal("no alignment map built for this book".into()))?;
        let ebook = ctx
            .ebook
            .ok_or_else(|| SyncError::Fatal("no parsed ebook available for this book".into()))?;

        let snippet = leader_client.text_at(book, leader_position).await?;

        let locator = self.locator.locate(ebook, &snippet, Some(*percentage))?;
        let char_offset = locator.char_offset.ok_or_else(|| {
            SyncError::NotFound("locate did not resolve a char offset for the leader's position".into())
        })?;

        let timestamp_seconds = alignment.char_to_time(char_offset);
        Ok(ClientPosition::Audio { timestamp_seconds })
    }
}
