//! An in-memory store with the same transactional behavior as the
//! Postgres one, for tests.

use std::sync::{Arc, RwLock};

use futures::future::{self, BoxFuture, FutureExt};

use crate::errors::BackendError;
use crate::person::{NewPerson, OwnerId, Person, PersonId};
use crate::relationship::{NewRelationship, Relationship};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    persons: Vec<Person>,
    relationships: Vec<Relationship>,
    last_person_id: PersonId,
    last_relationship_id: i64,
}

/// Operations the store should refuse, for exercising error paths.
#[derive(Clone, Debug, Default)]
pub struct Failures {
    /// Creating a person with one of these directory names fails.
    pub person_directory_names: Vec<String>,

    /// Looking up a relationship involving one of these persons fails.
    pub find_relationship_for: Vec<PersonId>,

    /// Relationship lookups find nothing, so only the unique constraint
    /// catches duplicates.
    pub hide_relationships: bool,

    /// Committing fails.
    pub commit: bool,
}

#[derive(Default)]
pub struct MemoryDb {
    state: Arc<RwLock<MemoryState>>,
    failures: Failures,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(failures: Failures) -> Self {
        MemoryDb {
            failures,
            ..Default::default()
        }
    }

    /// Returns every committed person, across owners.
    pub fn all_persons(&self) -> Vec<Person> {
        self.state.read().unwrap().persons.clone()
    }

    /// Returns every committed relationship, across owners.
    pub fn all_relationships(&self) -> Vec<Relationship> {
        self.state.read().unwrap().relationships.clone()
    }
}

impl super::Db for MemoryDb {
    fn begin(&self) -> BoxFuture<Result<Box<dyn super::Session + Send>, BackendError>> {
        let session = MemorySession {
            shared: self.state.clone(),
            staged: self.state.read().unwrap().clone(),
            savepoints: vec![],
            failures: self.failures.clone(),
        };

        future::ready(Ok(Box::new(session) as Box<dyn super::Session + Send>)).boxed()
    }

    fn persons(&self, owner: OwnerId) -> BoxFuture<Result<Vec<Person>, BackendError>> {
        let persons = self
            .all_persons()
            .into_iter()
            .filter(|p| p.owner_id == owner)
            .collect();

        future::ready(Ok(persons)).boxed()
    }

    fn relationships_of(
        &self,
        owner: OwnerId,
        person: PersonId,
    ) -> BoxFuture<Result<Vec<Relationship>, BackendError>> {
        let relationships = self
            .all_relationships()
            .into_iter()
            .filter(|r| r.owner_id == owner && (r.person_a == person || r.person_b == person))
            .collect();

        future::ready(Ok(relationships)).boxed()
    }
}

struct MemorySession {
    shared: Arc<RwLock<MemoryState>>,
    staged: MemoryState,
    savepoints: Vec<MemoryState>,
    failures: Failures,
}

impl MemorySession {
    fn insert_person(&mut self, person: NewPerson) -> Result<Person, BackendError> {
        if self
            .failures
            .person_directory_names
            .iter()
            .any(|name| *name == person.directory_name)
        {
            return Err(BackendError::SimulatedFailure(format!(
                "refused to create person {}",
                person.directory_name
            )));
        }

        if person.first_name.is_empty() && person.last_name.is_empty() {
            return Err(BackendError::MissingName);
        }

        let taken = self
            .staged
            .persons
            .iter()
            .any(|p| p.owner_id == person.owner_id && p.directory_name == person.directory_name);

        if taken {
            return Err(BackendError::DirectoryNameAlreadyExists);
        }

        self.staged.last_person_id += 1;

        let age = person.age(crate::person::today());
        let person = Person::from_new(self.staged.last_person_id, person, age);
        self.staged.persons.push(person.clone());

        Ok(person)
    }

    fn insert_relationship(
        &mut self,
        relationship: NewRelationship,
    ) -> Result<Relationship, BackendError> {
        let endpoints_exist = [relationship.person_a, relationship.person_b]
            .iter()
            .all(|id| self.staged.persons.iter().any(|p| p.id == *id));

        if !endpoints_exist {
            return Err(BackendError::SimulatedFailure(format!(
                "no such persons {} and {}",
                relationship.person_a, relationship.person_b
            )));
        }

        let taken = self.staged.relationships.iter().any(|r| {
            r.owner_id == relationship.owner_id
                && r.person_a == relationship.person_a
                && r.person_b == relationship.person_b
        });

        if taken {
            return Err(BackendError::RelationshipAlreadyExists);
        }

        self.staged.last_relationship_id += 1;

        let relationship = Relationship::from_new(self.staged.last_relationship_id, relationship);
        self.staged.relationships.push(relationship.clone());

        Ok(relationship)
    }

    fn pop_savepoint(&mut self) -> Result<MemoryState, BackendError> {
        self.savepoints
            .pop()
            .ok_or_else(|| BackendError::SimulatedFailure("no savepoint".to_owned()))
    }
}

impl super::Session for MemorySession {
    fn create_person(&mut self, person: NewPerson) -> BoxFuture<Result<Person, BackendError>> {
        future::ready(self.insert_person(person)).boxed()
    }

    fn directory_name_exists(
        &mut self,
        owner: OwnerId,
        directory_name: &str,
    ) -> BoxFuture<Result<bool, BackendError>> {
        let exists = self
            .staged
            .persons
            .iter()
            .any(|p| p.owner_id == owner && p.directory_name == directory_name);

        future::ready(Ok(exists)).boxed()
    }

    fn find_relationship(
        &mut self,
        owner: OwnerId,
        x: PersonId,
        y: PersonId,
    ) -> BoxFuture<Result<Option<Relationship>, BackendError>> {
        if self
            .failures
            .find_relationship_for
            .iter()
            .any(|id| *id == x || *id == y)
        {
            return future::ready(Err(BackendError::SimulatedFailure(format!(
                "refused to look up relationship between {} and {}",
                x, y
            ))))
            .boxed();
        }

        if self.failures.hide_relationships {
            return future::ready(Ok(None)).boxed();
        }

        let found = self
            .staged
            .relationships
            .iter()
            .find(|r| r.owner_id == owner && r.joins(x, y))
            .cloned();

        future::ready(Ok(found)).boxed()
    }

    fn create_relationship(
        &mut self,
        relationship: NewRelationship,
    ) -> BoxFuture<Result<Relationship, BackendError>> {
        future::ready(self.insert_relationship(relationship)).boxed()
    }

    fn savepoint(&mut self) -> BoxFuture<Result<(), BackendError>> {
        self.savepoints.push(self.staged.clone());

        future::ready(Ok(())).boxed()
    }

    fn release_savepoint(&mut self) -> BoxFuture<Result<(), BackendError>> {
        future::ready(self.pop_savepoint().map(|_| ())).boxed()
    }

    fn rollback_to_savepoint(&mut self) -> BoxFuture<Result<(), BackendError>> {
        let result = self.pop_savepoint().map(|state| {
            self.staged = state;
        });

        future::ready(result).boxed()
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
        let MemorySession {
            shared,
            staged,
            savepoints,
            failures,
        } = *self;

        let result = if failures.commit {
            Err(BackendError::SimulatedFailure("commit refused".to_owned()))
        } else if !savepoints.is_empty() {
            Err(BackendError::SimulatedFailure(format!(
                "{} savepoints still open",
                savepoints.len()
            )))
        } else {
            *shared.write().unwrap() = staged;
            Ok(())
        };

        future::ready(result).boxed()
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
        future::ready(Ok(())).boxed()
    }
}
