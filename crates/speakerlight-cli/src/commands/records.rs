use clap::Subcommand;
use speakerlight_core::{Database, RecordSink};
use tracing::info;

#[derive(Subcommand)]
pub enum RecordsAction {
    /// List session records, newest first
    List {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a record's summary line for pasting elsewhere
    Copy {
        /// Record id or unique id prefix
        id: String,
    },
    /// Delete all session records
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: RecordsAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;

    match action {
        RecordsAction::List { limit, json } => {
            let mut records = db.list()?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("no records");
            } else {
                for record in &records {
                    let id = record.id.to_string();
                    println!("{}  {}", &id[..8], record.summary());
                }
            }
        }
        RecordsAction::Copy { id } => match db.find(&id)? {
            Some(record) => println!("{}", record.summary()),
            None => return Err(format!("no unique record matches '{id}'").into()),
        },
        RecordsAction::Clear { yes } => {
            let count = db.count()?;
            if !yes {
                return Err(format!(
                    "refusing to delete {count} record(s) without --yes; this cannot be undone"
                )
                .into());
            }
            let removed = db.clear()?;
            info!(removed, "session records cleared");
            println!("cleared {removed} record(s)");
        }
    }
    Ok(())
}
