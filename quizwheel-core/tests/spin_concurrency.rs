use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use quizwheel_core::{
    FixedClock, Identifier, LedgerStore, MemoryLedger, SqliteStore, Wheel, WheelError,
};

const CONTENDERS: usize = 16;

fn may_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn temp_db(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "quizwheel-{label}-{}-{}.sqlite",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

/// Fire `CONTENDERS` simultaneous spins and return (commits, rejections).
fn race<S>(wheels: Vec<Arc<Wheel<S, FixedClock>>>, identifier: &Identifier) -> (usize, usize)
where
    S: LedgerStore + 'static,
{
    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|i| {
            let wheel = Arc::clone(&wheels[i % wheels.len()]);
            let barrier = Arc::clone(&barrier);
            let identifier = identifier.clone();
            thread::spawn(move || {
                barrier.wait();
                wheel.spin(&identifier)
            })
        })
        .collect();

    let mut commits = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.join().expect("spin thread panicked") {
            Ok(_) => commits += 1,
            Err(WheelError::AlreadySpunToday { .. }) => rejections += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    (commits, rejections)
}

#[test]
fn memory_ledger_commits_exactly_once_under_contention() {
    let wheel = Arc::new(Wheel::new(MemoryLedger::new(), FixedClock::new(may_first())));
    let abc = Identifier::parse("abc", 64).unwrap();

    let (commits, rejections) = race(vec![Arc::clone(&wheel)], &abc);
    assert_eq!(commits, 1);
    assert_eq!(rejections, CONTENDERS - 1);

    let entry = wheel.store().get(&abc).unwrap().unwrap();
    assert_eq!(entry.total_spins, 1);
    assert!(entry.total_wins <= entry.total_spins);
}

#[test]
fn sqlite_file_commits_exactly_once_across_connections() {
    let path = temp_db("race");
    // Each wheel owns its own connection to the same file.
    let wheels: Vec<_> = (0..4)
        .map(|_| {
            Arc::new(Wheel::new(
                SqliteStore::open(&path).unwrap(),
                FixedClock::new(may_first()),
            ))
        })
        .collect();
    let abc = Identifier::parse("abc", 64).unwrap();

    let (commits, rejections) = race(wheels.clone(), &abc);
    assert_eq!(commits, 1);
    assert_eq!(rejections, CONTENDERS - 1);

    let entry = wheels[0].store().get(&abc).unwrap().unwrap();
    assert_eq!(entry.total_spins, 1);
    assert_eq!(entry.last_spin_date, may_first());

    drop(wheels);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn distinct_identifiers_do_not_contend() {
    let wheel = Arc::new(Wheel::new(MemoryLedger::new(), FixedClock::new(may_first())));
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|i| {
            let wheel = Arc::clone(&wheel);
            thread::spawn(move || {
                let identifier = Identifier::parse(&format!("player-{i}"), 64).unwrap();
                wheel.spin(&identifier).is_ok()
            })
        })
        .collect();
    let committed = handles
        .into_iter()
        .map(|h| h.join().expect("spin thread panicked"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(committed, CONTENDERS);
    assert_eq!(wheel.store().len().unwrap(), CONTENDERS);
}

#[test]
fn ledger_example_walkthrough() {
    let wheel = Wheel::new(SqliteStore::open_in_memory().unwrap(), FixedClock::new(may_first()));
    let abc = Identifier::parse("abc", 64).unwrap();

    let first = wheel.spin(&abc).unwrap();
    assert_eq!(first.total_spins, 1);
    let entry = wheel.store().get(&abc).unwrap().unwrap();
    assert_eq!(entry.last_spin_date, may_first());
    assert!(entry.total_wins <= 1);

    assert!(matches!(
        wheel.spin(&abc),
        Err(WheelError::AlreadySpunToday { .. })
    ));
    assert_eq!(wheel.store().get(&abc).unwrap().unwrap(), entry);

    wheel.clock().advance_days(1);
    let second = wheel.spin(&abc).unwrap();
    assert_eq!(second.total_spins, 2);
    assert!(second.total_wins <= second.total_spins);
}
