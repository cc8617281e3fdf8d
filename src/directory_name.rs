//! Filesystem-safe, per-owner-unique slugs for persons.

use time::Date;

use crate::date;
use crate::db::Session;
use crate::errors::BackendError;
use crate::normalization::normalize_name;
use crate::person::OwnerId;

const UNKNOWN: &str = "unknown";

/// Builds the directory name for a person before uniqueness is taken
/// into account, e.g. `anna_svensson_1930-05-12`.
pub fn base_directory_name(first_name: &str, last_name: &str, birth_date: Option<Date>) -> String {
    let parts: Vec<String> = [first_name, last_name]
        .iter()
        .map(|name| slug(name))
        .filter(|part| !part.is_empty())
        .collect();

    let name = if parts.is_empty() {
        UNKNOWN.to_owned()
    } else {
        parts.join("_")
    };

    match birth_date {
        Some(birth_date) => format!("{}_{}", name, date::iso(birth_date)),
        None => name,
    }
}

fn slug(name: &str) -> String {
    normalize_name(name)
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .map(|c| match c {
            'å' | 'ä' => 'a',
            'ö' => 'o',
            c => c,
        })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Appends `_1`, `_2`, … to `base` until no person of `owner` visible to
/// `session` uses it.
pub async fn unique_directory_name(
    session: &mut (dyn Session + Send),
    owner: OwnerId,
    base: &str,
) -> Result<String, BackendError> {
    let mut candidate = base.to_owned();
    let mut counter = 1;

    while session.directory_name_exists(owner, &candidate).await? {
        candidate = format!("{}_{}", base, counter);
        counter += 1;
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::Date;

    use super::{base_directory_name, unique_directory_name};
    use crate::db::mock::MemoryDb;
    use crate::db::Db;
    use crate::person::NewPerson;

    #[test]
    fn names_and_birth_date() {
        let birth = Date::try_from_ymd(1930, 5, 12).ok();

        assert_eq!(
            base_directory_name("Anna", "Svensson", birth),
            "anna_svensson_1930-05-12"
        );
        assert_eq!(base_directory_name("Erik", "Svensson", None), "erik_svensson");
    }

    #[test]
    fn replaces_swedish_vowels_and_strips_punctuation() {
        assert_eq!(base_directory_name("Åsa Märta", "Öberg", None), "asa_marta_oberg");
        assert_eq!(base_directory_name("Jean-Luc", "O'Brien (Jr.)", None), "jean-luc_obrien_jr");
        assert_eq!(base_directory_name("A\u{030a}ke", "", None), "ake");
    }

    #[test]
    fn keeps_other_letters() {
        assert_eq!(base_directory_name("José", "Müller", None), "josé_müller");
    }

    #[test]
    fn unknown_without_names() {
        assert_eq!(base_directory_name("", "  ", None), "unknown");
        assert_eq!(
            base_directory_name("?", "!", Date::try_from_ymd(1801, 1, 1).ok()),
            "unknown_1801-01-01"
        );
    }

    #[tokio::test]
    async fn suffixes_collisions_against_live_session() {
        let db = MemoryDb::new();
        let mut session = db.begin().await.unwrap();

        let first = unique_directory_name(session.as_mut(), 1, "erik").await.unwrap();
        assert_eq!(first, "erik");

        // the same name again, before anything is stored
        assert_eq!(unique_directory_name(session.as_mut(), 1, "erik").await.unwrap(), "erik");

        for name in &["erik", "erik_1"] {
            let person = NewPerson::new(
                1,
                "Erik".to_owned(),
                String::new(),
                None,
                None,
                name.to_string(),
                String::new(),
            );
            session.create_person(person).await.unwrap();
        }

        assert_eq!(unique_directory_name(session.as_mut(), 1, "erik").await.unwrap(), "erik_2");
        assert_eq!(unique_directory_name(session.as_mut(), 2, "erik").await.unwrap(), "erik");
    }

    proptest! {
        #[test]
        fn always_filesystem_safe(first in ".*", last in ".*") {
            let name = base_directory_name(&first, &last, None);

            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'));
        }
    }
}
