pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_mapping_table;
mod m20260101_000002_create_client_state_table;
mod m20260101_000003_create_alignment_anchor_table;
mod m20260101_000004_create_transcription_job_table;
mod m20260101_000005_create_suggestion_table;
mod m20260101_000006_create_setting_and_external_identifier_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_mapping_table::Migration),
            Box::new(m20260101_000002_create_client_state_table::Migration),
            Box::new(m20260101_000003_create_alignment_anchor_table::Migration),
            Box::new(m20260101_000004_create_transcription_job_table::Migration),
            Box::new(m20260101_000005_create_suggestion_table::Migration),
            Box::new(m20260101_000006_create_setting_and_external_identifier_tables::Migration),
        ]
    }
}
