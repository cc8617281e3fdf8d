//! Reconciles a GEDCOM file into an owner's persons and relationships.
//!
//! An import runs inside one transaction. Individuals are imported first,
//! then families are turned into relationships between them. A record that
//! cannot be imported is rolled back on its own and reported in
//! [`ImportStats::errors`]; anything else aborts the whole import.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use log::{debug, error, info, o, warn, Logger};
use serde::Serialize;
use tempfile::TempPath;
use uuid::Uuid;

use crate::db::{Db, Session};
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::gedcom::{Document, Parser};
use crate::person::{OwnerId, Person};
use crate::relationship::{NewRelationship, RelationshipKind};

mod families;
mod individuals;

const RELATIONSHIP_NOTES: &str = "Imported from GEDCOM";

/// What an import did.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub persons_created: usize,
    pub relationships_created: usize,

    /// One entry per skipped record, unresolved reference or parser
    /// warning.
    pub errors: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Clean,
    WithWarnings,
}

impl ImportStats {
    pub fn outcome(&self) -> ImportOutcome {
        if self.errors.is_empty() {
            ImportOutcome::Clean
        } else {
            ImportOutcome::WithWarnings
        }
    }
}

/// State belonging to a single import.
pub(crate) struct ImportRun {
    owner: OwnerId,
    logger: Logger,

    /// Imported persons by GEDCOM pointer.
    person_map: HashMap<String, Person>,
    stats: ImportStats,
}

impl ImportRun {
    fn new(owner: OwnerId, logger: Logger) -> Self {
        ImportRun {
            owner,
            logger,
            person_map: HashMap::new(),
            stats: ImportStats::default(),
        }
    }

    fn record_error(&mut self, message: String) {
        self.stats.errors.push(message);
    }

    fn person(&self, pointer: &str) -> Option<Person> {
        self.person_map.get(pointer).cloned()
    }
}

pub struct GedcomImporter {
    logger: Logger,
    db: Arc<dyn Db + Send + Sync>,
    parser: Parser,
    owner: OwnerId,
}

impl GedcomImporter {
    pub fn new(environment: &Environment, owner: OwnerId) -> Self {
        let run_id = Uuid::new_v4().to_string();

        GedcomImporter {
            logger: environment
                .logger
                .new(o!("owner_id" => owner, "run" => run_id)),
            db: environment.db.clone(),
            parser: Parser::new(environment.config.parse_mode),
            owner,
        }
    }

    /// Imports an uploaded GEDCOM file. On error nothing is stored.
    pub async fn import<R: Read>(&self, mut upload: R) -> Result<ImportStats, BackendError> {
        let logger = &self.logger;

        debug!(logger, "Copying upload...");
        let path = copy_to_temporary_file(&mut upload).map_err(|e| {
            error!(logger, "Failed to copy upload: {}", e);
            e
        })?;

        debug!(logger, "Parsing GEDCOM..."; "mode" => format!("{:?}", self.parser.mode()));
        let parsed = self.parser.parse_file(&path);

        if let Err(e) = path.close() {
            warn!(logger, "Failed to remove temporary file: {}", e);
        }

        let document = parsed.map_err(|e| {
            error!(logger, "Failed to parse GEDCOM: {}", e);
            e
        })?;

        debug!(logger, "Beginning transaction...");
        let mut session = self.db.begin().await.map_err(|e| {
            error!(logger, "Failed to begin transaction: {}", e);
            e
        })?;

        let mut run = ImportRun::new(self.owner, logger.clone());

        match reconcile(session.as_mut(), &document, &mut run).await {
            Ok(()) => {
                debug!(logger, "Committing...");
                session.commit().await.map_err(|e| {
                    error!(logger, "Failed to commit import: {}", e);
                    e
                })?;
            }
            Err(e) => {
                error!(logger, "GEDCOM import failed: {}", e);

                if let Err(rollback) = session.rollback().await {
                    error!(logger, "Failed to roll back import: {}", rollback);
                }

                return Err(e);
            }
        }

        let stats = run.stats;

        info!(
            logger,
            "GEDCOM import finished";
            "persons_created" => stats.persons_created,
            "relationships_created" => stats.relationships_created,
            "errors" => stats.errors.len()
        );

        Ok(stats)
    }
}

fn copy_to_temporary_file(upload: &mut impl Read) -> Result<TempPath, BackendError> {
    let mut file = tempfile::Builder::new()
        .prefix("gedcom-")
        .suffix(".ged")
        .tempfile()
        .map_err(BackendError::TemporaryFileError)?;

    std::io::copy(upload, &mut file).map_err(BackendError::TemporaryFileError)?;
    file.flush().map_err(BackendError::TemporaryFileError)?;

    Ok(file.into_temp_path())
}

async fn reconcile(
    session: &mut (dyn Session + Send),
    document: &Document,
    run: &mut ImportRun,
) -> Result<(), BackendError> {
    for warning in document.warnings() {
        warn!(run.logger, "Tolerated malformed GEDCOM"; "line" => warning.line, "reason" => &warning.message);
        run.record_error(format!("GEDCOM {}", warning));
    }

    individuals::import_individuals(session, document, run).await?;
    info!(run.logger, "Imported persons"; "count" => run.stats.persons_created);

    families::import_families(session, document, run).await?;
    info!(run.logger, "Imported relationships"; "count" => run.stats.relationships_created);

    Ok(())
}

/// Relates `a` to `b` as `kind` unless the two are already related in
/// either direction.
async fn relate(
    session: &mut (dyn Session + Send),
    run: &mut ImportRun,
    a: &Person,
    b: &Person,
    kind: RelationshipKind,
) -> Result<(), BackendError> {
    let logger = run.logger.new(o!("person_a" => a.id(), "person_b" => b.id()));

    if session.find_relationship(run.owner, a.id(), b.id()).await?.is_some() {
        debug!(logger, "Relationship already exists");
        return Ok(());
    }

    let relationship =
        match NewRelationship::new(run.owner, a, b, kind, RELATIONSHIP_NOTES.to_owned()) {
            Ok(relationship) => relationship,
            Err(e) => {
                warn!(logger, "Invalid relationship: {}", e);
                run.record_error(format!("Relationship {} <-> {}: {}", a, b, e));
                return Ok(());
            }
        };

    session.savepoint().await?;

    match session.create_relationship(relationship).await {
        Ok(created) => {
            session.release_savepoint().await?;
            run.stats.relationships_created += 1;
            debug!(logger, "Created relationship"; "id" => created.id(), "kind" => kind.as_str());
        }
        Err(BackendError::RelationshipAlreadyExists) => {
            session.rollback_to_savepoint().await?;
            debug!(logger, "Relationship already exists");
        }
        Err(e) => {
            session.rollback_to_savepoint().await?;
            error!(logger, "Failed to create relationship: {}", e);
            run.record_error(format!("Relationship {} <-> {}: {}", a, b, e));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ImportOutcome, ImportStats};

    #[test]
    fn outcome_depends_on_errors() {
        let mut stats = ImportStats {
            persons_created: 3,
            relationships_created: 2,
            errors: vec![],
        };
        assert_eq!(stats.outcome(), ImportOutcome::Clean);

        stats.errors.push("Family @F1@: child @I9@ not found".to_owned());
        assert_eq!(stats.outcome(), ImportOutcome::WithWarnings);
    }

    #[test]
    fn serializes_as_json() {
        let stats = ImportStats {
            persons_created: 1,
            relationships_created: 0,
            errors: vec!["No families found in GEDCOM file".to_owned()],
        };

        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            serde_json::json!({
                "persons_created": 1,
                "relationships_created": 0,
                "errors": ["No families found in GEDCOM file"],
            })
        );
    }
}
