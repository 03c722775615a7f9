use clap::Subcommand;
use medimind_core::local_now;
use medimind_core::storage::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's adherence counts
    Today,
    /// Per-day adherence counts, oldest first
    Days {
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Most recent dose history entries
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let today = local_now().date();

    match action {
        StatsAction::Today => {
            let stats = db.adherence_on(today)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Days { days } => {
            let stats = db.adherence_range(today, days)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::History { limit } => {
            let records = db.history(limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
