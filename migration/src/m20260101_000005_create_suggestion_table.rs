use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Suggestion::Table)
                    .if_not_exists()
                    .col(uuid(Suggestion::Id).primary_key())
                    .col(string(Suggestion::SourceClient))
                    .col(string(Suggestion::ExternalId))
                    .col(string(Suggestion::CandidateBookId))
                    .col(double(Suggestion::Confidence))
                    .col(timestamp(Suggestion::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Suggestion::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Suggestion {
    Table,
    Id,
    SourceClient,
    ExternalId,
    CandidateBookId,
    Confidence,
    CreatedAt,
}
