use std::sync::Arc;

use clap::Subcommand;
use focusflow_core::{Config, Database, Ports, SessionTimer, SnapshotStore, SystemClock};

use super::session::{self, TerminalHooks};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Run an interactive Focus session for a task
    Run {
        /// Task ID
        #[arg(long)]
        task: String,
    },
    /// Print the saved recovery snapshot for a task, if any
    Recover {
        /// Task ID
        #[arg(long)]
        task: String,
    },
    /// Drop the saved recovery snapshot for a task
    Discard {
        /// Task ID
        #[arg(long)]
        task: String,
    },
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);

    match action {
        FocusAction::Run { task } => {
            let task = db
                .get_task(&task)?
                .ok_or_else(|| format!("task not found: {task}"))?;
            if task.completed {
                return Err(format!("task already completed: {}", task.id).into());
            }
            let settings = Config::load()?.timer_settings();
            let step = i64::from(settings.adjust_step_minutes);
            println!("Focus: {}", task.title);

            let ports = Ports::from_store(db, Arc::new(SystemClock));
            let timer =
                SessionTimer::focus(task, settings, ports).with_hooks(Box::new(TerminalHooks));
            session::run_blocking(timer, step)?;
        }
        FocusAction::Recover { task } => match db.load_recovery(&task)? {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("no recovery snapshot for {task}"),
        },
        FocusAction::Discard { task } => {
            db.clear_recovery(&task)?;
            println!("recovery snapshot cleared for {task}");
        }
    }
    Ok(())
}
