use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mapping::Table)
                    .if_not_exists()
                    .col(string(Mapping::BookId).primary_key())
                    .col(string(Mapping::Title))
                    .col(string_null(Mapping::Author))
                    .col(string(Mapping::SyncMode))
                    .col(string(Mapping::Status))
                    .col(double_null(Mapping::DurationSeconds))
                    .col(string_null(Mapping::AlignmentRef))
                    .col(integer(Mapping::ConsecutiveFailures).default(0))
                    .col(timestamp(Mapping::CreatedAt))
                    .col(timestamp(Mapping::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mapping::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Mapping {
    Table,
    BookId,
    Title,
    Author,
    SyncMode,
    Status,
    DurationSeconds,
    AlignmentRef,
    ConsecutiveFailures,
    CreatedAt,
    UpdatedAt,
}
