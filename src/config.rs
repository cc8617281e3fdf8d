use std::env;

use crate::gedcom::ParseMode;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable, or `default` if it
/// is not set.
pub fn get_variable_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Interprets the value of `GENEALOGY_GEDCOM_STRICT`.
pub fn parse_mode(strict: &str) -> ParseMode {
    match strict.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => ParseMode::Strict,
        _ => ParseMode::Lenient,
    }
}
