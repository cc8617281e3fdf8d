use std::io;

use thiserror::Error;

use crate::person::PersonId;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error.
    #[error("SQLx error: {source}")]
    Sqlx { source: sqlx::Error },

    /// Represents a failure to create or write the temporary copy of an
    /// upload.
    #[error("Failed to write temporary file: {0}")]
    TemporaryFileError(#[source] io::Error),

    /// Represents a failure to read a GEDCOM file.
    #[error("Failed to read GEDCOM file: {0}")]
    UnreadableFile(#[source] io::Error),

    /// Represents a GEDCOM file whose structure could not be parsed.
    #[error("Malformed GEDCOM at line {line}: {reason}")]
    MalformedGedcom { line: usize, reason: String },

    /// Represents a person with neither a first name nor a last name.
    #[error("Person has neither a first name nor a last name")]
    MissingName,

    /// Represents a person recorded as dying before being born.
    #[error("Death date {death} precedes birth date {birth}")]
    DeathBeforeBirth { birth: String, death: String },

    /// Represents an attempt to relate a person to themselves.
    #[error("Person {0} cannot have a relationship with themselves")]
    SelfRelationship(PersonId),

    /// Represents an attempt to relate persons belonging to different
    /// owners.
    #[error("Persons {person_a} and {person_b} do not belong to the same owner")]
    OwnerMismatch { person_a: PersonId, person_b: PersonId },

    /// Represents a relationship whose two directions are not reciprocal.
    #[error("{a_to_b} and {b_to_a} are not reciprocal relationship kinds")]
    NonReciprocalKinds { a_to_b: String, b_to_a: String },

    /// Represents a relationship kind not known to this library.
    #[error("Unknown relationship kind {0:?}")]
    UnknownRelationshipKind(String),

    /// Represents a directory name already used by the same owner.
    #[error("Directory name already exists")]
    DirectoryNameAlreadyExists,

    /// Represents a relationship already stored for the same pair.
    #[error("Relationship already exists")]
    RelationshipAlreadyExists,

    /// Represents a failure injected by the in-memory store.
    #[error("Simulated storage failure: {0}")]
    SimulatedFailure(String),
}

impl From<sqlx::Error> for BackendError {
    fn from(source: sqlx::Error) -> Self {
        BackendError::Sqlx { source }
    }
}

#[cfg(test)]
mod tests {
    use super::BackendError;

    #[test]
    fn messages_include_context() {
        let error = BackendError::MalformedGedcom {
            line: 7,
            reason: "expected a level number".to_owned(),
        };

        assert_eq!(
            error.to_string(),
            "Malformed GEDCOM at line 7: expected a level number"
        );
        assert_eq!(
            BackendError::SelfRelationship(3).to_string(),
            "Person 3 cannot have a relationship with themselves"
        );
    }
}
