use std::sync::Arc;

use clap::Subcommand;
use focusflow_core::{Config, Database, Ports, SessionTimer, SnapshotStore, SystemClock};

use super::session::{self, TerminalHooks};

#[derive(Subcommand)]
pub enum PomodoroAction {
    /// Run interactive Pomodoro cycles, continuing from the saved position
    Run {
        /// Attach a task title to the logged work phases
        #[arg(long)]
        task: Option<String>,
    },
    /// Print the saved Pomodoro position as JSON
    Status,
    /// Forget the saved position and start the next run from cycle one
    Clear,
}

pub fn run(action: PomodoroAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);

    match action {
        PomodoroAction::Run { task } => {
            let settings = Config::load()?.timer_settings();
            let step = i64::from(settings.adjust_step_minutes);
            let task = match task {
                Some(id) => Some(
                    db.get_task(&id)?
                        .ok_or_else(|| format!("task not found: {id}"))?,
                ),
                None => None,
            };

            let ports = Ports::from_store(db, Arc::new(SystemClock));
            let mut timer =
                SessionTimer::pomodoro(settings, ports).with_hooks(Box::new(TerminalHooks));
            if let Some(task) = task {
                println!("Pomodoro: {}", task.title);
                timer = timer.with_task(task);
            }
            session::run_blocking(timer, step)?;
        }
        PomodoroAction::Status => match db.load_pomodoro()? {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("no saved pomodoro state"),
        },
        PomodoroAction::Clear => {
            db.clear_pomodoro()?;
            println!("pomodoro state cleared");
        }
    }
    Ok(())
}
