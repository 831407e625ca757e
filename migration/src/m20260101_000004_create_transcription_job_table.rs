use crate::m20260101_000001_create_mapping_table::Mapping;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TranscriptionJob::Table)
                    .if_not_exists()
                    .col(string(TranscriptionJob::BookId).primary_key())
                    .col(string(TranscriptionJob::State))
                    .col(integer(TranscriptionJob::RetryCount).default(0))
                    .col(string_null(TranscriptionJob::LastError))
                    .col(timestamp_null(TranscriptionJob::LastAttempt))
                    .col(json_binary(TranscriptionJob::ChunkDone))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transcription_job_book_id")
                            .from(TranscriptionJob::Table, TranscriptionJob::BookId)
                            .to(Mapping::Table, Mapping::BookId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TranscriptionJob::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TranscriptionJob {
    Table,
    BookId,
    State,
    RetryCount,
    LastError,
    LastAttempt,
    ChunkDone,
}
