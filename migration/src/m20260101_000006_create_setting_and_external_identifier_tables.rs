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
                    .table(Setting::Table)
                    .if_not_exists()
                    .col(string(Setting::Key).primary_key())
                    .col(string(Setting::Value))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExternalIdentifier::Table)
                    .if_not_exists()
                    .col(string(ExternalIdentifier::BookId))
                    .col(string(ExternalIdentifier::ClientName))
                    .col(string(ExternalIdentifier::ExternalId))
                    .primary_key(
                        Index::create()
                            .col(ExternalIdentifier::BookId)
                            .col(ExternalIdentifier::ClientName),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_external_identifier_book_id")
                            .from(ExternalIdentifier::Table, ExternalIdentifier::BookId)
                            .to(Mapping::Table, Mapping::BookId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_external_identifier_client_external")
                    .table(ExternalIdentifier::Table)
                    .col(ExternalIdentifier::ClientName)
                    .col(ExternalIdentifier::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExternalIdentifier::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Setting::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Setting {
    Table,
    Key,
    Value,
}

#[derive(DeriveIden)]
enum ExternalIdentifier {
    Table,
    BookId,
    ClientName,
    ExternalId,
}
