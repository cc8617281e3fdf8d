use futures::future::BoxFuture;

use crate::errors::BackendError;
use crate::person::{NewPerson, OwnerId, Person, PersonId};
use crate::relationship::{NewRelationship, Relationship};

pub mod mock;

/// The schema the stores expect.
pub const SCHEMA: &str = include_str!("../migrations/20261018000000_create_persons/up.sql");

pub trait Db {
    /// Opens a transaction. Nothing written through the session is
    /// visible to other sessions until it commits.
    fn begin(&self) -> BoxFuture<Result<Box<dyn Session + Send>, BackendError>>;

    fn persons(&self, owner: OwnerId) -> BoxFuture<Result<Vec<Person>, BackendError>>;

    /// Returns every relationship `person` takes part in, on either side.
    fn relationships_of(
        &self,
        owner: OwnerId,
        person: PersonId,
    ) -> BoxFuture<Result<Vec<Relationship>, BackendError>>;
}

/// A single transaction against the store.
pub trait Session {
    fn create_person(&mut self, person: NewPerson) -> BoxFuture<Result<Person, BackendError>>;

    fn directory_name_exists(
        &mut self,
        owner: OwnerId,
        directory_name: &str,
    ) -> BoxFuture<Result<bool, BackendError>>;

    /// Looks for a relationship between `x` and `y` stored in either order.
    fn find_relationship(
        &mut self,
        owner: OwnerId,
        x: PersonId,
        y: PersonId,
    ) -> BoxFuture<Result<Option<Relationship>, BackendError>>;

    fn create_relationship(
        &mut self,
        relationship: NewRelationship,
    ) -> BoxFuture<Result<Relationship, BackendError>>;

    /// Marks a point to roll back to without abandoning the transaction.
    /// Savepoints nest.
    fn savepoint(&mut self) -> BoxFuture<Result<(), BackendError>>;

    fn release_savepoint(&mut self) -> BoxFuture<Result<(), BackendError>>;

    /// Undoes everything since the most recent savepoint and discards it.
    fn rollback_to_savepoint(&mut self) -> BoxFuture<Result<(), BackendError>>;

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>>;

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
        Executor, Postgres, Transaction,
    };
    use time::Date;

    use crate::errors::BackendError;
    use crate::person::{NewPerson, OwnerId, Person, PersonId};
    use crate::relationship::{NewRelationship, Relationship, RelationshipKind};

    const PERSONS_DIRECTORY_NAME_CONSTRAINT: &str = "persons_directory_name";
    const RELATIONSHIPS_PAIR_CONSTRAINT: &str = "person_relationships_pair";

    const SAVEPOINT: &[&str] = &["SAVEPOINT import_record"];
    const RELEASE_SAVEPOINT: &[&str] = &["RELEASE SAVEPOINT import_record"];
    // a rolled back savepoint stays defined until released, and savepoints
    // sharing a name are resolved newest first
    const ROLLBACK_TO_SAVEPOINT: &[&str] = &[
        "ROLLBACK TO SAVEPOINT import_record",
        "RELEASE SAVEPOINT import_record",
    ];

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }

        /// Applies the schema. Only meant for empty databases.
        pub async fn initialize(&self) -> Result<(), BackendError> {
            (&self.pool)
                .execute(super::SCHEMA)
                .await
                .map_err(map_sqlx_error)?;

            Ok(())
        }
    }

    pub struct PgSession {
        tx: Transaction<'static, Postgres>,
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn begin(&self) -> BoxFuture<Result<Box<dyn super::Session + Send>, BackendError>> {
            async move {
                let tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                Ok(Box::new(PgSession { tx }) as Box<dyn super::Session + Send>)
            }
            .boxed()
        }

        fn persons(&self, owner: OwnerId) -> BoxFuture<Result<Vec<Person>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_persons.sql"));

                let persons = query
                    .bind(owner)
                    .try_map(|row: PgRow| person_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(persons)
            }
            .boxed()
        }

        fn relationships_of(
            &self,
            owner: OwnerId,
            person: PersonId,
        ) -> BoxFuture<Result<Vec<Relationship>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_relationships.sql"));

                let relationships = query
                    .bind(owner)
                    .bind(person)
                    .try_map(|row: PgRow| relationship_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(relationships)
            }
            .boxed()
        }
    }

    impl super::Session for PgSession {
        fn create_person(&mut self, person: NewPerson) -> BoxFuture<Result<Person, BackendError>> {
            async move {
                let age = person.age(crate::person::today());
                let query = sqlx::query_as(include_str!("queries/create_person.sql"));

                let (id,): (PersonId,) = query
                    .bind(person.owner_id)
                    .bind(&person.first_name)
                    .bind(&person.last_name)
                    .bind(person.birth_date)
                    .bind(person.death_date)
                    .bind(age)
                    .bind(&person.directory_name)
                    .bind(&person.notes)
                    .fetch_one(&mut self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Person::from_new(id, person, age))
            }
            .boxed()
        }

        fn directory_name_exists(
            &mut self,
            owner: OwnerId,
            directory_name: &str,
        ) -> BoxFuture<Result<bool, BackendError>> {
            let directory_name = directory_name.to_owned();

            async move {
                let query = sqlx::query_as(include_str!("queries/directory_name_exists.sql"));

                let (exists,): (bool,) = query
                    .bind(owner)
                    .bind(directory_name)
                    .fetch_one(&mut self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(exists)
            }
            .boxed()
        }

        fn find_relationship(
            &mut self,
            owner: OwnerId,
            x: PersonId,
            y: PersonId,
        ) -> BoxFuture<Result<Option<Relationship>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/find_relationship.sql"));

                let relationship = query
                    .bind(owner)
                    .bind(x)
                    .bind(y)
                    .try_map(|row: PgRow| relationship_from_row(&row))
                    .fetch_optional(&mut self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(relationship)
            }
            .boxed()
        }

        fn create_relationship(
            &mut self,
            relationship: NewRelationship,
        ) -> BoxFuture<Result<Relationship, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/create_relationship.sql"));

                let (id,): (i64,) = query
                    .bind(relationship.owner_id)
                    .bind(relationship.person_a)
                    .bind(relationship.person_b)
                    .bind(relationship.a_to_b.as_str())
                    .bind(relationship.b_to_a.as_str())
                    .bind(&relationship.notes)
                    .fetch_one(&mut self.tx)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Relationship::from_new(id, relationship))
            }
            .boxed()
        }

        fn savepoint(&mut self) -> BoxFuture<Result<(), BackendError>> {
            self.execute_statements(SAVEPOINT)
        }

        fn release_savepoint(&mut self) -> BoxFuture<Result<(), BackendError>> {
            self.execute_statements(RELEASE_SAVEPOINT)
        }

        fn rollback_to_savepoint(&mut self) -> BoxFuture<Result<(), BackendError>> {
            self.execute_statements(ROLLBACK_TO_SAVEPOINT)
        }

        fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
            async move { self.tx.commit().await.map_err(map_sqlx_error) }.boxed()
        }

        fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), BackendError>> {
            async move { self.tx.rollback().await.map_err(map_sqlx_error) }.boxed()
        }
    }

    impl PgSession {
        fn execute_statements(
            &mut self,
            statements: &'static [&'static str],
        ) -> BoxFuture<Result<(), BackendError>> {
            async move {
                for statement in statements {
                    sqlx::query(statement)
                        .execute(&mut self.tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                Ok(())
            }
            .boxed()
        }
    }

    fn person_from_row(row: &PgRow) -> Result<Person, sqlx::Error> {
        let birth_date: Option<Date> = try_get(row, "birth_date")?;
        let death_date: Option<Date> = try_get(row, "death_date")?;

        Ok(Person {
            id: try_get(row, "id")?,
            owner_id: try_get(row, "owner_id")?,
            first_name: try_get(row, "first_name")?,
            last_name: try_get(row, "last_name")?,
            birth_date,
            death_date,
            age: try_get(row, "age")?,
            directory_name: try_get(row, "directory_name")?,
            notes: try_get(row, "notes")?,
        })
    }

    fn relationship_from_row(row: &PgRow) -> Result<Relationship, sqlx::Error> {
        let kind = |column: &str| -> Result<RelationshipKind, sqlx::Error> {
            let raw: String = try_get(row, column)?;

            // the table's check constraint makes this unreachable, but
            // the column is still plain text
            raw.parse::<RelationshipKind>()
                .map_err(|e: BackendError| sqlx::Error::Decode(Box::new(e)))
        };

        Ok(Relationship {
            id: try_get(row, "id")?,
            owner_id: try_get(row, "owner_id")?,
            person_a: try_get(row, "person_a_id")?,
            person_b: try_get(row, "person_b_id")?,
            a_to_b: kind("relationship_a_to_b")?,
            b_to_a: kind("relationship_b_to_a")?,
            notes: try_get(row, "notes")?,
        })
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(PERSONS_DIRECTORY_NAME_CONSTRAINT) => {
                BackendError::DirectoryNameAlreadyExists
            }
            Error::Database(ref e) if e.constraint() == Some(RELATIONSHIPS_PAIR_CONSTRAINT) => {
                BackendError::RelationshipAlreadyExists
            }
            _ => BackendError::Sqlx { source: error },
        }
    }
}
