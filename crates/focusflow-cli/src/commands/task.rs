//! Task management commands for CLI.

use clap::Subcommand;
use focusflow_core::{Database, Task, TaskStore};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Estimated minutes (Focus sessions never plan less than an hour)
        #[arg(long)]
        estimate: Option<u32>,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show task details
    Show {
        /// Task ID
        id: String,
    },
    /// Edit a task
    Edit {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New estimate in minutes
        #[arg(long)]
        estimate: Option<u32>,
    },
    /// Mark a task complete
    Done {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Rm {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add {
            title,
            description,
            estimate,
        } => {
            let mut task = Task::new(Uuid::new_v4().to_string(), title);
            task.description = description;
            task.estimated_minutes = estimate;
            db.create_task(&task)?;
            println!("Task created: {}", task.id);
        }
        TaskAction::List { all, json } => {
            let tasks = db.list_tasks(all)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("no tasks");
            } else {
                for task in &tasks {
                    let mark = if task.completed { "x" } else { " " };
                    let estimate = task
                        .estimated_minutes
                        .map(|m| format!("{m}m"))
                        .unwrap_or_else(|| "-".to_string());
                    println!("[{mark}] {}  {:>5}  {}", task.id, estimate, task.title);
                }
            }
        }
        TaskAction::Show { id } => match db.get_task(&id)? {
            Some(task) => println!("{}", serde_json::to_string_pretty(&task)?),
            None => return Err(format!("task not found: {id}").into()),
        },
        TaskAction::Edit {
            id,
            title,
            description,
            estimate,
        } => {
            let mut task = db
                .get_task(&id)?
                .ok_or_else(|| format!("task not found: {id}"))?;
            if let Some(title) = title {
                task.title = title;
            }
            if description.is_some() {
                task.description = description;
            }
            if estimate.is_some() {
                task.estimated_minutes = estimate;
            }
            db.update_task(&task)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Done { id } => {
            db.complete_task(&id)?;
            println!("Task completed: {id}");
        }
        TaskAction::Rm { id } => {
            if !db.delete_task(&id)? {
                return Err(format!("task not found: {id}").into());
            }
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}
