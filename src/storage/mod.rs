//! Progress store (C1, spec §4.1): durable home for mappings, per-client
//! state, and the alignment/transcription artifacts the other components
//! build on. Backed by sea-orm against sqlite, per the teacher's persistence
//! stack.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::models::{
    ClientName, ClientPosition, ClientState, Locator, Mapping, MappingStatus, Suggestion, SyncMode,
};
use crate::errors::{SyncError, SyncResult};

pub struct Store {
    db: Arc<DatabaseConnection>,
}

impl Store {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Store { db }
    }

    pub async fn load_mapping(&self, book_id: &str) -> SyncResult<Option<Mapping>> {
        let model = entities::mapping::Entity::find_by_id(book_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(model.map(mapping_from_model))
    }

    /// Mappings eligible for a sync cycle: status `active` only (spec §4.1
    /// "all with status = active").
    pub async fn list_active_mappings(&self) -> SyncResult<Vec<Mapping>> {
        let models = entities::mapping::Entity::find()
            .filter(entities::mapping::Column::Status.eq("active"))
            .order_by_asc(entities::mapping::Column::BookId)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(mapping_from_model).collect())
    }

    /// Create or replace a mapping. Enforces the "one mapping per book_id"
    /// invariant by upserting on the primary key.
    pub async fn upsert_mapping(&self, mapping: &Mapping) -> SyncResult<()> {
        let am = entities::mapping::ActiveModel {
            book_id: Set(mapping.book_id.clone()),
            title: Set(mapping.title.clone()),
            author: Set(mapping.author.clone()),
            sync_mode: Set(sync_mode_str(mapping.sync_mode).to_string()),
            status: Set(status_str(mapping.status).to_string()),
            duration_seconds: Set(mapping.duration_seconds),
            alignment_ref: Set(mapping.alignment_ref.clone()),
            consecutive_failures: Set(mapping.consecutive_failures as i32),
            created_at: Set(mapping.created_at),
            updated_at: Set(Utc::now()),
        };

        let exists = entities::mapping::Entity::find_by_id(mapping.book_id.clone())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
            .is_some();

        if exists {
            entities::mapping::Entity::update(am)
                .filter(entities::mapping::Column::BookId.eq(mapping.book_id.clone()))
                .exec(self.db.as_ref())
                .await
                .map_err(db_err)?;
        } else {
            am.insert(self.db.as_ref()).await.map_err(db_err)?;
        }
        Ok(())
    }

    pub async fn set_mapping_status(
        &self,
        book_id: &str,
        status: MappingStatus,
        bump_failures: bool,
    ) -> SyncResult<()> {
        let existing = entities::mapping::Entity::find_by_id(book_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
            .ok_or_else(|| SyncError::NotFound(book_id.to_string()))?;

        let consecutive_failures = if bump_failures {
            existing.consecutive_failures + 1
        } else if matches!(status, MappingStatus::Active) {
            0
        } else {
            existing.consecutive_failures
        };

        let am = entities::mapping::ActiveModel {
            book_id: Set(book_id.to_string()),
            status: Set(status_str(status).to_string()),
            consecutive_failures: Set(consecutive_failures),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        entities::mapping::Entity::update(am)
            .filter(entities::mapping::Column::BookId.eq(book_id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn read_state(
        &self,
        book_id: &str,
        client: ClientName,
    ) -> SyncResult<Option<ClientState>> {
        let model = entities::client_state::Entity::find_by_id((
            book_id.to_string(),
            client.as_str().to_string(),
        ))
        .one(self.db.as_ref())
        .await
        .map_err(db_err)?;
        model.map(state_from_model).transpose()
    }

    pub async fn write_state(&self, state: &ClientState) -> SyncResult<()> {
        let (timestamp_seconds, percentage, locator_json) = match &state.position {
            ClientPosition::Audio { timestamp_seconds } => (Some(*timestamp_seconds), None, None),
            ClientPosition::Text { percentage, locator } => (
                None,
                Some(*percentage),
                locator
                    .as_ref()
                    .map(|l| serde_json::to_value(l).unwrap_or(serde_json::Value::Null)),
            ),
        };

        let am = entities::client_state::ActiveModel {
            book_id: Set(state.book_id.clone()),
            client_name: Set(state.client_name.as_str().to_string()),
            last_updated: Set(state.last_updated),
            percentage: Set(percentage),
            timestamp_seconds: Set(timestamp_seconds),
            locator_json: Set(locator_json),
        };

        let exists = entities::client_state::Entity::find_by_id((
            state.book_id.clone(),
            state.client_name.as_str().to_string(),
        ))
        .one(self.db.as_ref())
        .await
        .map_err(db_err)?
        .is_some();

        if exists {
            entities::client_state::Entity::update(am)
                .filter(entities::client_state::Column::BookId.eq(state.book_id.clone()))
                .filter(
                    entities::client_state::Column::ClientName
                        .eq(state.client_name.as_str().to_string()),
                )
                .exec(self.db.as_ref())
                .await
                .map_err(db_err)?;
        } else {
            am.insert(self.db.as_ref()).await.map_err(db_err)?;
        }
        Ok(())
    }

    pub async fn reset_state(&self, book_id: &str, client: ClientName) -> SyncResult<()> {
        entities::client_state::Entity::delete_by_id((
            book_id.to_string(),
            client.as_str().to_string(),
        ))
        .exec(self.db.as_ref())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Look up a mapping by a client's external identifier (spec §3 "book
    /// mapping" invariant: unique per client namespace).
    pub async fn find_book_by_external_id(
        &self,
        client: ClientName,
        external_id: &str,
    ) -> SyncResult<Option<String>> {
        let model = entities::external_identifier::Entity::find()
            .filter(
                entities::external_identifier::Column::ClientName
                    .eq(client.as_str().to_string()),
            )
            .filter(entities::external_identifier::Column::ExternalId.eq(external_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(model.map(|m| m.book_id))
    }

    pub async fn link_external_id(
        &self,
        book_id: &str,
        client: ClientName,
        external_id: &str,
    ) -> SyncResult<()> {
        let am = entities::external_identifier::ActiveModel {
            book_id: Set(book_id.to_string()),
            client_name: Set(client.as_str().to_string()),
            external_id: Set(external_id.to_string()),
        };
        am.insert(self.db.as_ref()).await.map_err(db_err)?;
        Ok(())
    }

    /// Replace the queryable anchor index for a book (spec §3 "Alignment
    /// map" — the JSON file under `alignments/` stays the durable artifact
    /// consulted on restart; this table is the queryable index over it).
    pub async fn save_alignment_anchors(
        &self,
        book_id: &str,
        anchors: &[crate::align::Anchor],
    ) -> SyncResult<()> {
        entities::alignment_anchor::Entity::delete_many()
            .filter(entities::alignment_anchor::Column::BookId.eq(book_id.to_string()))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        for (ordinal, anchor) in anchors.iter().enumerate() {
            let am = entities::alignment_anchor::ActiveModel {
                id: sea_orm::NotSet,
                book_id: Set(book_id.to_string()),
                ordinal: Set(ordinal as i32),
                char_offset: Set(anchor.char_offset),
                audio_timestamp_seconds: Set(anchor.audio_timestamp_seconds),
            };
            am.insert(self.db.as_ref()).await.map_err(db_err)?;
        }
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> SyncResult<Option<String>> {
        let model = entities::setting::Entity::find_by_id(key.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(model.map(|m| m.value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()> {
        let am = entities::setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
        };
        let exists = entities::setting::Entity::find_by_id(key.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
            .is_some();
        if exists {
            entities::setting::Entity::update(am)
                .filter(entities::setting::Column::Key.eq(key))
                .exec(self.db.as_ref())
                .await
                .map_err(db_err)?;
        } else {
            am.insert(self.db.as_ref()).await.map_err(db_err)?;
        }
        Ok(())
    }

    /// Record a candidate mapping surfaced at the edge of C7 (spec §3
    /// "Suggestion", optional). Idempotent per `(source_client, external_id)`.
    pub async fn create_suggestion(&self, suggestion: &Suggestion) -> SyncResult<()> {
        let existing = entities::suggestion::Entity::find()
            .filter(
                entities::suggestion::Column::SourceClient
                    .eq(suggestion.source_client.as_str().to_string()),
            )
            .filter(entities::suggestion::Column::ExternalId.eq(suggestion.external_id.clone()))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Ok(());
        }

        let am = entities::suggestion::ActiveModel {
            id: Set(suggestion.id),
            source_client: Set(suggestion.source_client.as_str().to_string()),
            external_id: Set(suggestion.external_id.clone()),
            candidate_book_id: Set(suggestion.candidate_book_id.clone()),
            confidence: Set(suggestion.confidence),
            created_at: Set(suggestion.created_at),
        };
        am.insert(self.db.as_ref()).await.map_err(db_err)?;
        Ok(())
    }

    pub async fn list_suggestions(&self) -> SyncResult<Vec<Suggestion>> {
        let models = entities::suggestion::Entity::find()
            .order_by_desc(entities::suggestion::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;
        models
            .into_iter()
            .map(|m| {
                let source_client = ClientName::parse(&m.source_client).ok_or_else(|| {
                    SyncError::Fatal(format!("unknown client_name in store: {}", m.source_client))
                })?;
                Ok(Suggestion {
                    id: m.id,
                    source_client,
                    external_id: m.external_id,
                    candidate_book_id: m.candidate_book_id,
                    confidence: m.confidence,
                    created_at: m.created_at,
                })
            })
            .collect()
    }
}

fn db_err(e: sea_orm::DbErr) -> SyncError {
    SyncError::Fatal(e.to_string())
}

fn status_str(status: MappingStatus) -> &'static str {
    match status {
        MappingStatus::Pending => "pending",
        MappingStatus::Processing => "processing",
        MappingStatus::Active => "active",
        MappingStatus::FailedRetryLater => "failed_retry_later",
        MappingStatus::Disabled => "disabled",
    }
}

fn parse_status(s: &str) -> MappingStatus {
    match s {
        "processing" => MappingStatus::Processing,
        "active" => MappingStatus::Active,
        "failed_retry_later" => MappingStatus::FailedRetryLater,
        "disabled" => MappingStatus::Disabled,
        _ => MappingStatus::Pending,
    }
}

fn sync_mode_str(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Audiobook => "audiobook",
        SyncMode::EbookOnly => "ebook_only",
    }
}

fn parse_sync_mode(s: &str) -> SyncMode {
    match s {
        "ebook_only" => SyncMode::EbookOnly,
        _ => SyncMode::Audiobook,
    }
}

fn mapping_from_model(m: entities::mapping::Model) -> Mapping {
    Mapping {
        book_id: m.book_id,
        title: m.title,
        author: m.author,
        sync_mode: parse_sync_mode(&m.sync_mode),
        status: parse_status(&m.status),
        duration_seconds: m.duration_seconds,
        alignment_ref: m.alignment_ref,
        consecutive_failures: m.consecutive_failures.max(0) as u32,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn state_from_model(m: entities::client_state::Model) -> SyncResult<ClientState> {
    let client_name = ClientName::parse(&m.client_name)
        .ok_or_else(|| SyncError::Fatal(format!("unknown client_name in store: {}", m.client_name)))?;

    let position = if let Some(timestamp_seconds) = m.timestamp_seconds {
        ClientPosition::Audio { timestamp_seconds }
    } else {
        let percentage = m.percentage.unwrap_or(0.0);
        let locator: Option<Locator> = m
            .locator_json
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SyncError::Fatal(format!("corrupt locator_json: {e}")))?;
        ClientPosition::Text { percentage, locator }
    };

    Ok(ClientState {
        book_id: m.book_id,
        client_name,
        last_updated: m.last_updated,
        position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use migration::MigratorTrait;
    use sea_orm::Database;

    async fn test_db() -> Arc<DatabaseConnection> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Arc::new(db)
    }

    fn sample_mapping(book_id: &str) -> Mapping {
        Mapping {
            book_id: book_id.to_string(),
            title: "Test Book".to_string(),
            author: Some("Author".to_string()),
            sync_mode: SyncMode::Audiobook,
            status: MappingStatus::Active,
            duration_seconds: Some(3600.0),
            alignment_ref: None,
            consecutive_failures: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn roundtrips_a_mapping() {
        let store = Store::new(test_db().await);
        let mapping = sample_mapping("book1");
        store.upsert_mapping(&mapping).await.unwrap();
        let loaded = store.load_mapping("book1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Test Book");
        assert_eq!(loaded.status, MappingStatus::Active);
    }

    #[tokio::test]
    async fn roundtrips_audio_and_text_state() {
        let store = Store::new(test_db().await);
        store.upsert_mapping(&sample_mapping("book1")).await.unwrap();

        let audio = ClientState {
            book_id: "book1".to_string(),
            client_name: ClientName::Abs,
            last_updated: 1000,
            position: ClientPosition::Audio {
                timestamp_seconds: 120.0,
            },
        };
        store.write_state(&audio).await.unwrap();
        let loaded = store
            .read_state("book1", ClientName::Abs)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.position, ClientPosition::Audio { timestamp_seconds: 120.0 });

        let text = ClientState {
            book_id: "book1".to_string(),
            client_name: ClientName::KoReaderSync,
            last_updated: 1001,
            position: ClientPosition::Text {
                percentage: 0.42,
                locator: Some(Locator {
                    xpath: Some("/body/p[3]".to_string()),
                    ..Default::default()
                }),
            },
        };
        store.write_state(&text).await.unwrap();
        let loaded = store
            .read_state("book1", ClientName::KoReaderSync)
            .await
            .unwrap()
            .unwrap();
        match loaded.position {
            ClientPosition::Text { percentage, locator } => {
                assert!((percentage - 0.42).abs() < 1e-9);
                assert_eq!(locator.unwrap().xpath.unwrap(), "/body/p[3]");
            }
            _ => panic!("expected text position"),
        }
    }

    #[tokio::test]
    async fn list_active_mappings_only_returns_active() {
        let store = Store::new(test_db().await);
        store.upsert_mapping(&sample_mapping("book1")).await.unwrap();

        let mut disabled = sample_mapping("book2");
        disabled.status = MappingStatus::Disabled;
        store.upsert_mapping(&disabled).await.unwrap();

        let mut pending = sample_mapping("book3");
        pending.status = MappingStatus::Pending;
        store.upsert_mapping(&pending).await.unwrap();

        let mut failed = sample_mapping("book4");
        failed.status = MappingStatus::FailedRetryLater;
        store.upsert_mapping(&failed).await.unwrap();

        let active = store.list_active_mappings().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].book_id, "book1");
    }

    #[tokio::test]
    async fn external_identifier_lookup_roundtrips() {
        let store = Store::new(test_db().await);
        store.upsert_mapping(&sample_mapping("book1")).await.unwrap();
        store
            .link_external_id("book1", ClientName::Hardcover, "hc-42")
            .await
            .unwrap();
        let found = store
            .find_book_by_external_id(ClientName::Hardcover, "hc-42")
            .await
            .unwrap();
        assert_eq!(found, Some("book1".to_string()));
    }

    #[tokio::test]
    async fn save_alignment_anchors_replaces_the_prior_set() {
        let store = Store::new(test_db().await);
        store.upsert_mapping(&sample_mapping("book1")).await.unwrap();

        let first = vec![
            crate::align::Anchor {
                char_offset: 0,
                audio_timestamp_seconds: 0.0,
            },
            crate::align::Anchor {
                char_offset: 100,
                audio_timestamp_seconds: 12.5,
            },
        ];
        store.save_alignment_anchors("book1", &first).await.unwrap();

        let second = vec![crate::align::Anchor {
            char_offset: 50,
            audio_timestamp_seconds: 6.0,
        }];
        store.save_alignment_anchors("book1", &second).await.unwrap();

        let rows = entities::alignment_anchor::Entity::find()
            .filter(entities::alignment_anchor::Column::BookId.eq("book1"))
            .all(store.db.as_ref())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].char_offset, 50);
    }

    #[tokio::test]
    async fn suggestion_creation_is_idempotent_per_client_and_external_id() {
        let store = Store::new(test_db().await);
        store.upsert_mapping(&sample_mapping("book1")).await.unwrap();

        let suggestion = Suggestion {
            id: uuid::Uuid::new_v4(),
            source_client: ClientName::Hardcover,
            external_id: "hc-99".to_string(),
            candidate_book_id: "book1".to_string(),
            confidence: 0.5,
            created_at: Utc::now(),
        };
        store.create_suggestion(&suggestion).await.unwrap();
        store.create_suggestion(&suggestion).await.unwrap();

        let all = store.list_suggestions().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].external_id, "hc-99");
        assert_eq!(all[0].source_client, ClientName::Hardcover);
    }
}
