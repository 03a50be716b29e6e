//! Property tests for the session timer invariants.

use std::sync::Arc;

use focusflow_core::{ManualClock, MemoryStore, Ports, SessionTimer, Task, TimerSettings};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Tick,
    Start,
    Pause,
    Reset,
    Stop,
    ChangeTime(i64),
    Sleep(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => Just(Op::Tick),
        1 => Just(Op::Start),
        1 => Just(Op::Pause),
        1 => Just(Op::Reset),
        1 => Just(Op::Stop),
        1 => (-30i64..30).prop_map(Op::ChangeTime),
        1 => (0i64..120).prop_map(Op::Sleep),
    ]
}

fn focus_timer(estimate: Option<u32>) -> (SessionTimer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let ports = Ports::from_store(Arc::new(MemoryStore::new()), clock.clone());
    let mut task = Task::new("prop", "Property task");
    task.estimated_minutes = estimate;
    (
        SessionTimer::focus(task, TimerSettings::default(), ports),
        clock,
    )
}

fn apply(timer: &mut SessionTimer, clock: &ManualClock, op: &Op) {
    match op {
        Op::Tick => {
            clock.advance_secs(1);
            timer.tick();
        }
        Op::Start => {
            timer.start();
        }
        Op::Pause => {
            timer.pause();
        }
        Op::Reset => {
            timer.reset();
        }
        Op::Stop => {
            timer.stop();
        }
        Op::ChangeTime(m) => {
            timer.change_time(*m);
        }
        Op::Sleep(secs) => clock.advance_secs(*secs),
    }
}

proptest! {
    #[test]
    fn focus_plan_never_below_an_hour(
        estimate in proptest::option::of(0u32..300),
        ops in proptest::collection::vec(op(), 0..200),
    ) {
        let (mut timer, clock) = focus_timer(estimate);
        prop_assert!(timer.session().planned_secs >= 3600);
        for op in &ops {
            apply(&mut timer, &clock, op);
            prop_assert!(timer.session().planned_secs >= 3600);
            prop_assert!(timer.session().remaining_secs <= timer.session().planned_secs);
        }
    }

    #[test]
    fn countdown_only_moves_on_running_ticks(
        ops in proptest::collection::vec(op(), 0..300),
    ) {
        let (mut timer, clock) = focus_timer(None);
        for op in &ops {
            let before = timer.session().clone();
            apply(&mut timer, &clock, op);
            let after = timer.session();
            match op {
                Op::Tick if before.running => {
                    prop_assert!(after.remaining_secs <= before.remaining_secs);
                }
                Op::Tick | Op::Sleep(_) | Op::Pause | Op::Start => {
                    prop_assert_eq!(after.remaining_secs, before.remaining_secs);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn grace_never_exceeds_constant(
        ops in proptest::collection::vec(op(), 0..200),
    ) {
        let (mut timer, clock) = focus_timer(None);
        for op in &ops {
            apply(&mut timer, &clock, op);
            prop_assert!(timer.session().grace_remaining <= 10);
            if !timer.is_running() {
                prop_assert_eq!(timer.session().grace_remaining, 0);
            }
        }
    }
}
