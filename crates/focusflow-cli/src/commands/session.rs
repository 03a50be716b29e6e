//! Interactive terminal front end shared by `focus run` and `pomodoro run`.
//!
//! Reads one control per line from stdin while a [`TimerDriver`] ticks in the
//! background, and prints every timer event as it arrives.

use std::io::Write;
use std::time::Duration;

use focusflow_core::timer::format_hms;
use focusflow_core::{Command, Event, SessionHooks, SessionTimer, TimerDriver, TimerView};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "controls: p = start/pause, r = reset, s = stop, + / - = adjust time, q = quit";

/// Prints host callbacks.
pub struct TerminalHooks;

impl SessionHooks for TerminalHooks {
    fn on_complete(&mut self, actual_elapsed_secs: u64) {
        println!("\nWell done: {} of work.", format_hms(actual_elapsed_secs));
    }

    fn on_exit(&mut self) {
        println!("\nLeaving the session.");
    }
}

/// How the interactive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Completed,
    Stopped,
    Detached,
}

/// Run [`drive`] on a fresh runtime.
///
/// The runtime is shut down in the background: a pending stdin read sits on a
/// blocking thread and would otherwise hold the process open until Enter.
pub fn run_blocking(timer: SessionTimer, step_minutes: i64) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(drive(timer, step_minutes));
    runtime.shutdown_background();
    result
}

/// Run `timer` until it completes, the user stops it, or stdin closes.
///
/// Quitting (or EOF) detaches without stopping, so the next run picks the
/// session up from its saved state.
pub async fn drive(timer: SessionTimer, step_minutes: i64) -> Result<(), Box<dyn std::error::Error>> {
    let (mut driver, mut events) = TimerDriver::new(timer);
    driver.mount();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut render = tokio::time::interval(Duration::from_secs(1));
    let mut exit = None;

    while exit.is_none() {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    exit = Some(Exit::Detached);
                    continue;
                };
                let command = match line.trim() {
                    "p" | "" => Command::Toggle,
                    "r" => Command::Reset,
                    "s" => Command::Stop,
                    "+" => Command::ChangeTime(step_minutes),
                    "-" => Command::ChangeTime(-step_minutes),
                    "q" => {
                        exit = Some(Exit::Detached);
                        continue;
                    }
                    _ => {
                        println!("{}", HELP);
                        continue;
                    }
                };
                let accepted = driver.apply(command);
                if !accepted {
                    let view = driver.view();
                    if view.locked {
                        println!("\nlocked: only pause is available until the session ends");
                    } else {
                        println!("\nnot available right now");
                    }
                } else if command == Command::Stop {
                    exit = Some(Exit::Stopped);
                }
            }
            Some(event) = events.recv() => {
                if matches!(event, Event::SessionCompleted { .. }) {
                    exit = Some(Exit::Completed);
                }
                println!("\n{}", describe(&event));
            }
            _ = render.tick() => {
                if driver.is_ticking() {
                    print_status(&driver.view());
                }
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        println!("{}", describe(&event));
    }
    tracing::debug!(?exit, "interactive session ended");

    // After a stop the state is already persisted; unmounting again would
    // overwrite the Pomodoro stop mark.
    if exit == Some(Exit::Detached) {
        driver.shutdown();
        println!("\nSession saved; run again to continue.");
    }
    Ok(())
}

fn print_status(view: &TimerView) {
    let mut line = format!(
        "\r{} {} ({:.0}%)",
        view.phase_label, view.display, view.percent_complete
    );
    if view.grace_remaining > 0 {
        line.push_str(&format!("  grace {}s", view.grace_remaining));
    } else if view.locked {
        line.push_str("  locked");
    }
    print!("{line}   ");
    let _ = std::io::stdout().flush();
}

pub fn describe(event: &Event) -> String {
    match event {
        Event::Restored {
            phase,
            remaining_secs,
            ..
        } => format!(
            "restored {}: {} left",
            phase.label(),
            format_hms(*remaining_secs)
        ),
        Event::TimerStarted {
            phase,
            remaining_secs,
            resumed,
            ..
        } => format!(
            "{} {} with {} left",
            if *resumed { "resumed" } else { "started" },
            phase.label(),
            format_hms(*remaining_secs)
        ),
        Event::TimerPaused { credited_secs, .. } => {
            format!("paused after {}", format_hms(*credited_secs))
        }
        Event::TimerLocked { .. } => "locked: only pause is available now".to_string(),
        Event::TimerReset { remaining_secs, .. } => {
            format!("reset to {}", format_hms(*remaining_secs))
        }
        Event::TimerStopped { credited_secs, .. } => {
            format!("stopped after {}", format_hms(*credited_secs))
        }
        Event::TimeAdjusted { planned_secs, .. } => {
            format!("planned time is now {}", format_hms(*planned_secs))
        }
        Event::PhaseCompleted {
            from,
            to,
            cycles_completed,
            ..
        } => format!(
            "{} done, {} next ({} cycles)",
            from.label(),
            to.label(),
            cycles_completed
        ),
        Event::SessionCompleted { actual_secs, .. } => {
            format!("session complete: {}", format_hms(*actual_secs))
        }
        Event::RecordSaved {
            duration_secs,
            completed,
            ..
        } => format!(
            "logged {}{}",
            format_hms(*duration_secs),
            if *completed { " (completed)" } else { "" }
        ),
        Event::TaskCompletionFailed { message, .. } => {
            format!("could not mark the task done: {message}")
        }
    }
}
