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
                    .table(ClientState::Table)
                    .if_not_exists()
                    .col(string(ClientState::BookId))
                    .col(string(ClientState::ClientName))
                    .col(big_integer(ClientState::LastUpdated))
                    .col(double_null(ClientState::Percentage))
                    .col(double_null(ClientState::TimestampSeconds))
                    .col(json_binary_null(ClientState::LocatorJson))
                    .primary_key(
                        Index::create()
                            .col(ClientState::BookId)
                            .col(ClientState::ClientName),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_client_state_book_id")
                            .from(ClientState::Table, ClientState::BookId)
                            .to(Mapping::Table, Mapping::BookId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClientState::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ClientState {
    Table,
    BookId,
    ClientName,
    LastUpdated,
    Percentage,
    TimestampSeconds,
    LocatorJson,
}
