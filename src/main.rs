use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use structopt::StructOpt;

use genealogy::config::{get_variable, get_variable_or, parse_mode};
use genealogy::db::PgDb;
use genealogy::environment::{Config, Environment};
use genealogy::errors::BackendError;
use genealogy::import::GedcomImporter;
use genealogy::person::{OwnerId, PersonId};
use genealogy::relationship::{find_relatives, RelationshipKind};
use log::{debug, error, info, initialize_logger};

#[derive(Debug, StructOpt)]
#[structopt(name = "genealogy", about = "Manage family trees imported from GEDCOM files")]
enum Opt {
    /// Create the database schema
    InitDb,

    /// Import a GEDCOM file for an owner and print what was created
    Import {
        /// The owner to import persons and relationships for
        #[structopt(long)]
        owner: OwnerId,

        /// The GEDCOM file to import
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },

    /// Print the relatives of a person
    Relatives {
        #[structopt(long)]
        owner: OwnerId,

        #[structopt(long)]
        person: PersonId,

        /// Only list relatives of this kind, e.g. PARENT for the person's parents
        #[structopt(long)]
        kind: Option<RelationshipKind>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = Arc::new(initialize_logger());
    debug!(logger, "Starting..."; "build" => info::describe());

    debug!(logger, "Creating database pool...");
    let connection_string = get_variable("GENEALOGY_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from GENEALOGY_DB_CONNECTION_STRING");
    let db = Arc::new(PgDb::new(pool));

    match opt {
        Opt::InitDb => {
            info!(logger, "Creating schema...");
            db.initialize().await?;
        }
        Opt::Import { owner, file } => {
            let config = Config::new(parse_mode(&get_variable_or("GENEALOGY_GEDCOM_STRICT", "0")));
            let environment = Environment::new(logger.clone(), db, config);

            info!(logger, "Importing GEDCOM file..."; "file" => file.display().to_string(), "owner_id" => owner);
            let upload = File::open(&file).map_err(BackendError::UnreadableFile)?;

            let stats = GedcomImporter::new(&environment, owner)
                .import(upload)
                .await
                .map_err(|e| {
                    error!(logger, "Import failed: {}", e);
                    e
                })?;

            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Opt::Relatives {
            owner,
            person,
            kind,
        } => {
            let relatives = find_relatives(db.as_ref(), owner, person, kind).await?;

            println!("{}", serde_json::to_string_pretty(&relatives)?);
        }
    }

    Ok(())
}
