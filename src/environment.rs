use std::sync::Arc;

use log::Logger;

use crate::db::Db;
use crate::gedcom::ParseMode;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, db: Arc<dyn Db + Send + Sync>, config: Config) -> Self {
        Self { logger, db, config }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub(crate) parse_mode: ParseMode,
}

impl Config {
    pub fn new(parse_mode: ParseMode) -> Self {
        Self { parse_mode }
    }
}
