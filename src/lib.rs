pub mod config;
pub mod date;
pub mod db;
pub mod directory_name;
pub mod environment;
pub mod errors;
pub mod gedcom;
pub mod import;
pub mod normalization;
pub mod person;
pub mod relationship;
