pub mod alignment_anchor;
pub mod client_state;
pub mod external_identifier;
pub mod mapping;
pub mod setting;
pub mod suggestion;
pub mod transcription_job;

pub mod prelude {
    pub use super::alignment_anchor::Entity as AlignmentAnchor;
    pub use super::client_state::Entity as ClientState;
    pub use super::external_identifier::Entity as ExternalIdentifier;
    pub use super::mapping::Entity as Mapping;
    pub use super::setting::Entity as Setting;
    pub use super::suggestion::Entity as Suggestion;
    pub use super::transcription_job::Entity as TranscriptionJob;
}
