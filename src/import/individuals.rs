use log::{debug, error, o, warn};
use time::Date;

use super::ImportRun;
use crate::date::parse_gedcom_date;
use crate::db::Session;
use crate::directory_name::{base_directory_name, unique_directory_name};
use crate::errors::BackendError;
use crate::gedcom::{Document, ParsedIndividual};
use crate::normalization::normalize_name;
use crate::person::{NewPerson, Person};

/// Creates a person for every named individual, in file order, and maps
/// their pointers for the family phase.
pub(super) async fn import_individuals(
    session: &mut (dyn Session + Send),
    document: &Document,
    run: &mut ImportRun,
) -> Result<(), BackendError> {
    for element in document.individuals() {
        let individual = ParsedIndividual::from_element(element);
        let label = individual.label();

        if !individual.has_name() {
            warn!(run.logger, "Skipping individual without a name"; "individual" => &label);
            run.record_error(format!("Person {}: {}", label, BackendError::MissingName));
            continue;
        }

        session.savepoint().await?;

        match create_person(session, run, &individual).await {
            Ok(person) => {
                session.release_savepoint().await?;
                run.stats.persons_created += 1;

                if let Some(pointer) = individual.pointer {
                    run.person_map.insert(pointer, person);
                }
            }
            Err(e) => {
                session.rollback_to_savepoint().await?;

                match e {
                    BackendError::MissingName | BackendError::DeathBeforeBirth { .. } => {
                        warn!(run.logger, "Skipping individual: {}", e; "individual" => &label)
                    }
                    _ => error!(run.logger, "Failed to import individual: {}", e; "individual" => &label),
                }

                run.record_error(format!("Person {}: {}", label, e));
            }
        }
    }

    Ok(())
}

async fn create_person(
    session: &mut (dyn Session + Send),
    run: &ImportRun,
    individual: &ParsedIndividual,
) -> Result<Person, BackendError> {
    let logger = run.logger.new(o!("individual" => individual.label()));

    let first_name = normalize_name(&individual.first_name);
    let last_name = normalize_name(&individual.last_name);
    let birth_date = date(run, individual.birth_date.as_deref(), "birth");
    let death_date = date(run, individual.death_date.as_deref(), "death");

    let base = base_directory_name(&first_name, &last_name, birth_date);

    let mut person = NewPerson::new(
        run.owner,
        first_name,
        last_name,
        birth_date,
        death_date,
        base,
        format!("Imported from GEDCOM ({})", individual.label()),
    );
    person.validate()?;

    person.directory_name = unique_directory_name(session, run.owner, person.directory_name()).await?;

    let person = session.create_person(person).await?;
    debug!(logger, "Created person"; "id" => person.id(), "directory_name" => person.directory_name());

    Ok(person)
}

fn date(run: &ImportRun, raw: Option<&str>, event: &str) -> Option<Date> {
    let raw = raw?;
    let parsed = parse_gedcom_date(raw);

    if parsed.is_none() {
        warn!(run.logger, "Ignoring unparseable date"; "event" => event, "date" => raw);
    }

    parsed
}
