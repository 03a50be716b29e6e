//! End-to-end timer runs against the SQLite store on disk.

use std::sync::Arc;

use chrono::Duration;
use focusflow_core::{
    Database, Event, ManualClock, Ports, SessionLog, SessionStats, SessionTimer, SnapshotStore,
    Task, TaskStore, TimerMode, TimerSettings,
};

struct Fixture {
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focusflow.db");
        Self {
            _dir: dir,
            path,
            clock: Arc::new(ManualClock::default()),
        }
    }

    /// A fresh handle on the same file, like a new process would get.
    fn db(&self) -> Arc<Database> {
        Arc::new(Database::open_at(&self.path).unwrap())
    }

    fn ports(&self, db: &Arc<Database>) -> Ports {
        Ports::from_store(db.clone(), self.clock.clone())
    }

    fn run(&self, timer: &mut SessionTimer, secs: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..secs {
            self.clock.advance_secs(1);
            events.extend(timer.tick());
        }
        events
    }
}

#[test]
fn paused_focus_session_lands_in_the_log() {
    let fx = Fixture::new();
    let db = fx.db();
    let task = Task::new("t-1", "Refactor parser").with_estimate(30);
    db.create_task(&task).unwrap();

    let mut timer = SessionTimer::focus(task, TimerSettings::default(), fx.ports(&db));
    timer.mount();
    timer.start();
    fx.run(&mut timer, 400);
    timer.pause();

    let records = fx.db().records(TimerMode::Focus).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duration_secs, 400);
    assert_eq!(records[0].planned_duration_secs, 3600);
    assert!(records[0].paused);
    assert_eq!(records[0].task_title, "Refactor parser");
}

#[test]
fn recovery_survives_a_reopen() {
    let fx = Fixture::new();
    let db = fx.db();
    let task = Task::new("t-2", "Write tests").with_estimate(75);
    db.create_task(&task).unwrap();

    let mut first = SessionTimer::focus(task.clone(), TimerSettings::default(), fx.ports(&db));
    first.mount();
    first.start();
    fx.run(&mut first, 45);
    drop(first);

    // Last periodic save happened at 45s.
    let saved = fx.db().load_recovery("t-2").unwrap().unwrap();
    assert_eq!(saved.remaining_secs, 4500 - 45);

    fx.clock.advance(Duration::minutes(10));
    let db = fx.db();
    let mut second = SessionTimer::focus(task, TimerSettings::default(), fx.ports(&db));
    second.mount();
    assert_eq!(second.session().planned_secs, 4500);
    assert_eq!(second.session().remaining_secs, 4455);
    assert_eq!(second.credited_secs(), 45);
}

#[test]
fn completed_focus_session_marks_task_done() {
    let fx = Fixture::new();
    let db = fx.db();
    let task = Task::new("t-3", "Inbox zero");
    db.create_task(&task).unwrap();

    let mut timer = SessionTimer::focus(task, TimerSettings::default(), fx.ports(&db));
    timer.start();
    let events = fx.run(&mut timer, 3600);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SessionCompleted { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::TaskCompletionFailed { .. })));

    let db = fx.db();
    assert!(db.get_task("t-3").unwrap().unwrap().completed);
    assert!(db.load_recovery("t-3").unwrap().is_none());

    let today = fx.clock_today();
    let stats = SessionStats::from_records(&db.records_between(None, today, today).unwrap());
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total_secs, 3600);
}

#[test]
fn missing_task_reports_failure_but_completes() {
    let fx = Fixture::new();
    let db = fx.db();
    let mut timer = SessionTimer::focus(
        Task::new("ghost", "Not in the store"),
        TimerSettings::default(),
        fx.ports(&db),
    );
    timer.start();
    let events = fx.run(&mut timer, 3600);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TaskCompletionFailed { .. })));
    assert!(timer.is_completed());
    assert!(db.complete_task("ghost").is_err());
}

#[test]
fn pomodoro_position_survives_a_reopen() {
    let fx = Fixture::new();
    let db = fx.db();
    let mut timer = SessionTimer::pomodoro(TimerSettings::default(), fx.ports(&db));
    timer.mount();
    timer.start();
    fx.run(&mut timer, 1500 + 120);
    timer.stop();

    fx.clock.advance_secs(60);
    let db = fx.db();
    let mut again = SessionTimer::pomodoro(TimerSettings::default(), fx.ports(&db));
    again.mount();
    assert_eq!(again.session().cycles_completed, 1);
    assert_eq!(again.session().remaining_secs, 300 - 120 - 60);
    assert_eq!(db.records(TimerMode::Pomodoro).unwrap().len(), 1);
}

impl Fixture {
    fn clock_today(&self) -> chrono::NaiveDate {
        use focusflow_core::Clock;
        self.clock.now().date_naive()
    }
}
