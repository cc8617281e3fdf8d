use serde::Serialize;
use time::Date;

use crate::date;
use crate::errors::BackendError;

/// The ID of a person. IDs are assigned sequentially by the store, which
/// gives persons the total order used to store relationships canonically.
pub type PersonId = i64;

/// The ID of the researcher owning a set of persons.
pub type OwnerId = i64;

/// How far back a birth date may lie for a living person to be given an
/// age.
const MAX_LIVING_AGE_YEARS: i32 = 100;

/// A person as stored in the database.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Person {
    pub(crate) id: PersonId,
    pub(crate) owner_id: OwnerId,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    #[serde(serialize_with = "date::serialize_option")]
    pub(crate) birth_date: Option<Date>,
    #[serde(serialize_with = "date::serialize_option")]
    pub(crate) death_date: Option<Date>,
    /// Calculated when the person is stored.
    pub(crate) age: Option<i32>,
    pub(crate) directory_name: String,
    pub(crate) notes: String,
}

impl Person {
    pub fn from_new(id: PersonId, person: NewPerson, age: Option<i32>) -> Self {
        Person {
            id,
            owner_id: person.owner_id,
            first_name: person.first_name,
            last_name: person.last_name,
            birth_date: person.birth_date,
            death_date: person.death_date,
            age,
            directory_name: person.directory_name,
            notes: person.notes,
        }
    }

    pub fn id(&self) -> PersonId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn birth_date(&self) -> Option<Date> {
        self.birth_date
    }

    pub fn death_date(&self) -> Option<Date> {
        self.death_date
    }

    pub fn age(&self) -> Option<i32> {
        self.age
    }

    pub fn directory_name(&self) -> &str {
        &self.directory_name
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Returns the display name, falling back to the directory name.
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.directory_name.clone(),
        }
    }

    /// Formats the birth and death years with the stored age, e.g.
    /// `1950-2020 (70 years)`. An age of zero is left out.
    pub fn years_display(&self) -> Option<String> {
        let birth_year = self.birth_date?.year();

        let years = match self.death_date {
            Some(death) => format!("{}-{}", birth_year, death.year()),
            None => birth_year.to_string(),
        };

        Some(match self.age {
            Some(age) if age > 0 => format!("{} ({} years)", years, age),
            _ => years,
        })
    }

    /// Returns the path of the person's directory relative to the media
    /// root.
    pub fn directory_path(&self) -> String {
        format!("persons/{}", self.directory_name)
    }
}

impl std::fmt::Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.full_name(), self.id)
    }
}

/// A person that has not been stored yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPerson {
    pub(crate) owner_id: OwnerId,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) birth_date: Option<Date>,
    pub(crate) death_date: Option<Date>,
    pub(crate) directory_name: String,
    pub(crate) notes: String,
}

impl NewPerson {
    pub fn new(
        owner_id: OwnerId,
        first_name: String,
        last_name: String,
        birth_date: Option<Date>,
        death_date: Option<Date>,
        directory_name: String,
        notes: String,
    ) -> Self {
        NewPerson {
            owner_id,
            first_name,
            last_name,
            birth_date,
            death_date,
            directory_name,
            notes,
        }
    }

    pub fn directory_name(&self) -> &str {
        &self.directory_name
    }

    /// Checks that the person can be stored.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.first_name.is_empty() && self.last_name.is_empty() {
            return Err(BackendError::MissingName);
        }

        if let (Some(birth), Some(death)) = (self.birth_date, self.death_date) {
            if death < birth {
                return Err(BackendError::DeathBeforeBirth {
                    birth: date::iso(birth),
                    death: date::iso(death),
                });
            }
        }

        Ok(())
    }

    /// Returns the age to store for this person as of `today`.
    pub fn age(&self, today: Date) -> Option<i32> {
        calculate_age(self.birth_date, self.death_date, today)
    }
}

/// Calculates a person's age: at death if they have died, otherwise as of
/// `today`, unless they would be older than a hundred.
pub fn calculate_age(birth: Option<Date>, death: Option<Date>, today: Date) -> Option<i32> {
    let birth = birth?;

    let end = match death {
        Some(death) => death,
        None => {
            if birth < years_before(today, MAX_LIVING_AGE_YEARS) {
                return None;
            }

            today
        }
    };

    let mut age = end.year() - birth.year();

    if (end.month(), end.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }

    Some(age).filter(|age| *age >= 0)
}

fn years_before(date: Date, years: i32) -> Date {
    let year = date.year() - years;

    Date::try_from_ymd(year, date.month(), date.day())
        // only 29 February can fail, and only in non-leap target years
        .or_else(|_| Date::try_from_ymd(year, date.month(), date.day() - 1))
        .unwrap_or(date)
}

/// Today's date in UTC.
pub fn today() -> Date {
    time::OffsetDateTime::now_utc().date()
}
