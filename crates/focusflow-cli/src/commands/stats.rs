use chrono::{Duration, Utc};
use clap::Subcommand;
use focusflow_core::{Database, SessionLog, SessionStats, TimerMode};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today {
        /// Only count one mode (focus or pomodoro)
        #[arg(long)]
        mode: Option<TimerMode>,
    },
    /// Stats for the last seven days, today included
    Week {
        /// Only count one mode (focus or pomodoro)
        #[arg(long)]
        mode: Option<TimerMode>,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let today = Utc::now().date_naive();

    let (mode, from) = match action {
        StatsAction::Today { mode } => (mode, today),
        StatsAction::Week { mode } => (mode, today - Duration::days(6)),
    };
    let records = db.records_between(mode, from, today)?;
    let stats = SessionStats::from_records(&records);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
