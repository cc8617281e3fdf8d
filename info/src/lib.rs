//! Build information stamped into log records and CLI output.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const REVISION: Option<&str> = option_env!("GENEALOGY_REVISION");

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("GENEALOGY_BUILD_TIMESTAMP");

/// Formats the build information as a single line, e.g. for `--version`
/// style output.
pub fn describe() -> String {
    format!(
        "{} (revision {}, built {})",
        VERSION,
        REVISION.unwrap_or("unknown"),
        BUILD_TIMESTAMP.unwrap_or("unknown")
    )
}
