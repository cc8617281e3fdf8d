use log::{debug, error, info, o, trace, warn, Logger};

use super::{relate, ImportRun};
use crate::db::Session;
use crate::errors::BackendError;
use crate::gedcom::records::find_families;
use crate::gedcom::{Document, ParsedFamily};
use crate::person::Person;
use crate::relationship::RelationshipKind;

const NO_FAMILIES: &str = "No families found in GEDCOM file";

/// Turns every family into spouse and parent relationships between
/// already imported persons.
pub(super) async fn import_families(
    session: &mut (dyn Session + Send),
    document: &Document,
    run: &mut ImportRun,
) -> Result<(), BackendError> {
    let (strategy, elements) = match find_families(document) {
        Some(found) => found,
        None => {
            warn!(run.logger, "No families found");
            run.record_error(NO_FAMILIES.to_owned());
            return Ok(());
        }
    };

    info!(run.logger, "Found families"; "count" => elements.len(), "strategy" => strategy);

    for element in elements {
        let family = ParsedFamily::from_element(document, element);
        let label = family.label();

        let created_before = run.stats.relationships_created;
        session.savepoint().await?;

        match reconcile_family(session, run, &family).await {
            Ok(()) => session.release_savepoint().await?,
            Err(e) => {
                session.rollback_to_savepoint().await?;
                run.stats.relationships_created = created_before;
                error!(run.logger, "Failed to import family: {}", e; "family" => &label);
                run.record_error(format!("Family {}: {}", label, e));
            }
        }
    }

    Ok(())
}

async fn reconcile_family(
    session: &mut (dyn Session + Send),
    run: &mut ImportRun,
    family: &ParsedFamily,
) -> Result<(), BackendError> {
    let label = family.label();
    let logger = run.logger.new(o!("family" => label.clone()));

    trace!(
        logger,
        "Resolving family members";
        "husband" => format!("{:?}", family.husband),
        "wife" => format!("{:?}", family.wife),
        "children" => family.children.len()
    );

    let husband = resolve(run, &logger, &label, "husband", family.husband.as_deref());
    let wife = resolve(run, &logger, &label, "wife", family.wife.as_deref());

    if let (Some(husband), Some(wife)) = (&husband, &wife) {
        relate(session, run, husband, wife, RelationshipKind::Spouse).await?;
    }

    for pointer in &family.children {
        let child = match resolve(run, &logger, &label, "child", Some(pointer)) {
            Some(child) => child,
            None => continue,
        };

        if husband.is_none() && wife.is_none() {
            warn!(logger, "Child has no known parent"; "child" => pointer);
            continue;
        }

        for parent in husband.iter().chain(wife.iter()) {
            relate(session, run, parent, &child, RelationshipKind::Parent).await?;
        }
    }

    debug!(logger, "Reconciled family");

    Ok(())
}

/// Looks up a family member among the persons imported by this run,
/// reporting pointers that were not imported.
fn resolve(
    run: &mut ImportRun,
    logger: &Logger,
    label: &str,
    role: &str,
    pointer: Option<&str>,
) -> Option<Person> {
    let pointer = pointer?;
    let person = run.person(pointer);

    if person.is_none() {
        warn!(logger, "Unresolved family member"; "role" => role, "pointer" => pointer);
        run.record_error(format!("Family {}: {} {} not found", label, role, pointer));
    }

    person
}
