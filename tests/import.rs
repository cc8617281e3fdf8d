use std::fs::File;
use std::sync::Arc;

use genealogy::db::mock::{Failures, MemoryDb};
use genealogy::db::Db;
use genealogy::environment::{Config, Environment};
use genealogy::errors::BackendError;
use genealogy::gedcom::ParseMode;
use genealogy::import::{GedcomImporter, ImportOutcome, ImportStats};
use genealogy::person::Person;
use genealogy::relationship::{find_relatives, Relationship, RelationshipKind};

const OWNER: i64 = 1;

fn environment(db: &Arc<MemoryDb>, parse_mode: ParseMode) -> Environment {
    let db: Arc<dyn Db + Send + Sync> = db.clone();

    Environment::new(Arc::new(log::discard_logger()), db, Config::new(parse_mode))
}

async fn import_fixture_with(
    db: &Arc<MemoryDb>,
    parse_mode: ParseMode,
    name: &str,
) -> Result<ImportStats, BackendError> {
    let path = format!("tests/fixtures/{}", name);
    let file = File::open(&path).unwrap_or_else(|e| panic!("open {}: {}", path, e));

    GedcomImporter::new(&environment(db, parse_mode), OWNER)
        .import(file)
        .await
}

async fn import_fixture(db: &Arc<MemoryDb>, name: &str) -> ImportStats {
    import_fixture_with(db, ParseMode::Lenient, name)
        .await
        .expect("import fixture")
}

fn person<'a>(persons: &'a [Person], first_name: &str) -> &'a Person {
    persons
        .iter()
        .find(|p| p.first_name() == first_name)
        .unwrap_or_else(|| panic!("no person named {}", first_name))
}

fn assert_reciprocal_and_unique(relationships: &[Relationship]) {
    for (i, r) in relationships.iter().enumerate() {
        assert!(r.person_a() < r.person_b());
        assert_eq!(r.a_to_b().reciprocal(), r.b_to_a());

        for other in &relationships[i + 1..] {
            assert!(
                !(other.owner_id() == r.owner_id() && other.joins(r.person_a(), r.person_b())),
                "duplicate relationship {:?} and {:?}",
                r,
                other
            );
        }
    }
}

#[tokio::test]
async fn spouses_are_related_once() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "spouses.ged").await;

    assert_eq!(stats.persons_created, 2);
    assert_eq!(stats.relationships_created, 1);
    assert_eq!(stats.outcome(), ImportOutcome::Clean);

    let persons = db.all_persons();
    let anna = person(&persons, "Anna");
    let erik = person(&persons, "Erik");

    assert_eq!(anna.last_name(), "Svensson");
    assert_eq!(anna.directory_name(), "anna_svensson_1930-05-12");
    assert_eq!(anna.notes(), "Imported from GEDCOM (@I1@)");
    assert_eq!(erik.directory_name(), "erik_svensson");
    assert_eq!(erik.birth_date(), None);

    let relationships = db.all_relationships();
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].a_to_b(), RelationshipKind::Spouse);
    assert_eq!(relationships[0].b_to_a(), RelationshipKind::Spouse);
    assert!(relationships[0].joins(erik.id(), anna.id()));
}

#[tokio::test]
async fn dangling_child_is_reported() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "dangling_child.ged").await;

    assert_eq!(stats.persons_created, 2);
    assert_eq!(stats.relationships_created, 1);
    assert_eq!(stats.errors, vec!["Family @F1@: child @I3@ not found"]);
    assert_eq!(stats.outcome(), ImportOutcome::WithWarnings);

    let relationships = db.all_relationships();
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].a_to_b(), RelationshipKind::Spouse);
}

#[tokio::test]
async fn nameless_individual_is_skipped() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "nameless.ged").await;

    assert_eq!(stats.persons_created, 2);
    assert_eq!(
        stats.errors,
        vec![
            "Person @I2@: Person has neither a first name nor a last name",
            "Family @F1@: wife @I2@ not found",
        ]
    );

    let persons = db.all_persons();
    assert_eq!(persons.len(), 2);

    // the child still gets the parent that was imported
    let erik = person(&persons, "Erik");
    let lars = person(&persons, "Lars");
    let relationships = db.all_relationships();

    assert_eq!(relationships.len(), 1);
    assert_eq!(stats.relationships_created, 1);

    let parents = find_relatives(db.as_ref(), OWNER, lars.id(), Some(RelationshipKind::Parent))
        .await
        .unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].person_id, erik.id());
}

#[tokio::test]
async fn importing_twice_duplicates_persons_but_not_relationships() {
    let db = Arc::new(MemoryDb::new());

    let first = import_fixture(&db, "spouses.ged").await;
    let relationships_after_first = db.all_relationships();

    let second = import_fixture(&db, "spouses.ged").await;

    assert_eq!(first.persons_created, 2);
    assert_eq!(second.persons_created, 2);

    let mut directory_names: Vec<_> = db
        .all_persons()
        .iter()
        .map(|p| p.directory_name().to_owned())
        .collect();
    directory_names.sort();
    assert_eq!(
        directory_names,
        vec![
            "anna_svensson_1930-05-12",
            "anna_svensson_1930-05-12_1",
            "erik_svensson",
            "erik_svensson_1",
        ]
    );

    // the second run relates its own new persons, never the first run's
    // pair again
    let relationships = db.all_relationships();
    assert_eq!(second.relationships_created, 1);
    assert_eq!(relationships.len(), 2);
    assert_eq!(&relationships[..1], &relationships_after_first[..]);
    assert_reciprocal_and_unique(&relationships);
}

#[tokio::test]
async fn repeated_families_are_deduplicated() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "lind_family.ged").await;

    assert_eq!(stats.persons_created, 5);
    assert_eq!(stats.relationships_created, 5);
    assert!(stats.errors.is_empty(), "{:?}", stats.errors);

    let persons = db.all_persons();
    assert_eq!(person(&persons, "Gustav Adolf").last_name(), "Lind");

    let relationships = db.all_relationships();
    assert_eq!(relationships.len(), 5);
    assert_reciprocal_and_unique(&relationships);

    let per = person(&persons, "Per");
    let children = find_relatives(db.as_ref(), OWNER, per.id(), Some(RelationshipKind::Child))
        .await
        .unwrap();
    let mut children: Vec<_> = children.iter().map(|r| r.person_id).collect();
    children.sort();
    assert_eq!(
        children,
        vec![person(&persons, "Olle").id(), person(&persons, "Stina").id()]
    );

    let spouses = find_relatives(db.as_ref(), OWNER, per.id(), Some(RelationshipKind::Spouse))
        .await
        .unwrap();
    assert_eq!(spouses.len(), 1);
    assert_eq!(spouses[0].person_id, person(&persons, "Maja").id());
}

#[tokio::test]
async fn children_found_through_back_references() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "back_references.ged").await;

    assert_eq!(stats.persons_created, 3);
    assert_eq!(stats.relationships_created, 3);

    let persons = db.all_persons();
    let olle = person(&persons, "Olle");
    let parents = find_relatives(db.as_ref(), OWNER, olle.id(), Some(RelationshipKind::Parent))
        .await
        .unwrap();
    assert_eq!(parents.len(), 2);
}

#[tokio::test]
async fn files_without_families_still_import_persons() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "no_families.ged").await;

    assert_eq!(stats.persons_created, 2);
    assert_eq!(stats.relationships_created, 0);
    assert_eq!(stats.errors, vec!["No families found in GEDCOM file"]);

    let persons = db.all_persons();
    let asa = person(&persons, "Åsa");
    assert_eq!(asa.directory_name(), "asa_oberg_1901-03-03");
    assert_eq!(asa.age(), Some(78));
    assert_eq!(asa.years_display().as_deref(), Some("1901-1980 (78 years)"));
}

#[tokio::test]
async fn lenient_parsing_reports_malformed_lines() {
    let db = Arc::new(MemoryDb::new());

    let stats = import_fixture(&db, "malformed.ged").await;

    assert_eq!(stats.persons_created, 2);
    assert_eq!(stats.relationships_created, 1);
    assert_eq!(stats.errors.len(), 3);
    assert!(stats.errors.iter().all(|e| e.starts_with("GEDCOM Line ")));
}

#[tokio::test]
async fn strict_parsing_rejects_malformed_files() {
    let db = Arc::new(MemoryDb::new());

    let result = import_fixture_with(&db, ParseMode::Strict, "malformed.ged").await;

    assert!(matches!(result, Err(BackendError::MalformedGedcom { line: 1, .. })));
    assert!(db.all_persons().is_empty());

    // well-formed files are unaffected
    let stats = import_fixture_with(&db, ParseMode::Strict, "spouses.ged")
        .await
        .unwrap();
    assert_eq!(stats.persons_created, 2);
}

#[tokio::test]
async fn failed_person_is_skipped() {
    let db = Arc::new(MemoryDb::with_failures(Failures {
        person_directory_names: vec!["erik_svensson".to_owned()],
        ..Default::default()
    }));

    let stats = import_fixture(&db, "spouses.ged").await;

    assert_eq!(stats.persons_created, 1);
    assert_eq!(stats.relationships_created, 0);
    assert_eq!(stats.errors.len(), 2);
    assert!(stats.errors[0].starts_with("Person @I2@: Simulated storage failure"));
    assert_eq!(stats.errors[1], "Family @F1@: husband @I2@ not found");

    let persons = db.all_persons();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].first_name(), "Anna");
}

#[tokio::test]
async fn failed_family_is_rolled_back_alone() {
    // persons are numbered in file order, so Olle is 3
    let db = Arc::new(MemoryDb::with_failures(Failures {
        find_relationship_for: vec![3],
        ..Default::default()
    }));

    let stats = import_fixture(&db, "two_families.ged").await;

    assert_eq!(stats.persons_created, 5);
    assert_eq!(stats.relationships_created, 1);
    assert_eq!(stats.errors.len(), 1);
    assert!(
        stats.errors[0].starts_with("Family @F1@: Simulated storage failure"),
        "{:?}",
        stats.errors
    );

    // the spouse relationship created before the failure is gone too
    let persons = db.all_persons();
    let relationships = db.all_relationships();
    assert_eq!(relationships.len(), 1);
    assert!(relationships[0].joins(person(&persons, "Karl").id(), person(&persons, "Eva").id()));
    assert_eq!(relationships[0].a_to_b(), RelationshipKind::Spouse);
}

#[tokio::test]
async fn duplicate_caught_by_constraint_is_skipped() {
    let db = Arc::new(MemoryDb::with_failures(Failures {
        hide_relationships: true,
        ..Default::default()
    }));

    let stats = import_fixture(&db, "lind_family.ged").await;

    assert_eq!(stats.persons_created, 5);
    assert_eq!(stats.relationships_created, 5);
    assert!(stats.errors.is_empty(), "{:?}", stats.errors);

    let relationships = db.all_relationships();
    assert_eq!(relationships.len(), 5);
    assert_reciprocal_and_unique(&relationships);
}

#[tokio::test]
async fn failed_commit_stores_nothing() {
    let db = Arc::new(MemoryDb::with_failures(Failures {
        commit: true,
        ..Default::default()
    }));

    let result = import_fixture_with(&db, ParseMode::Lenient, "lind_family.ged").await;

    assert!(matches!(result, Err(BackendError::SimulatedFailure(_))));
    assert!(db.all_persons().is_empty());
    assert!(db.all_relationships().is_empty());
}

#[tokio::test]
async fn owners_are_isolated() {
    let db = Arc::new(MemoryDb::new());

    import_fixture(&db, "spouses.ged").await;

    let other = GedcomImporter::new(&environment(&db, ParseMode::Lenient), OWNER + 1)
        .import(File::open("tests/fixtures/spouses.ged").unwrap())
        .await
        .unwrap();

    assert_eq!(other.relationships_created, 1);

    let others = db.persons(OWNER + 1).await.unwrap();
    assert_eq!(others.len(), 2);
    assert!(others.iter().all(|p| p.owner_id() == OWNER + 1));
    assert_eq!(db.persons(OWNER).await.unwrap().len(), 2);
    assert!(others.iter().all(|p| !p.directory_name().ends_with("_1")));
}
