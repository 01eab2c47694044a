use baby_tracker::{
    db::{migrate, Database},
    state::{ActivityEntry, ActivityType, AppState, NappyKind, TimerState},
    utils::time,
};
use chrono::TimeDelta;
use tempfile::TempDir;

fn open_state(path: &std::path::Path) -> AppState {
    let db = Database::open(path).unwrap();
    AppState::new(db, 0, "127.0.0.1".to_string(), TimeDelta::zero())
}

#[test]
fn timer_and_log_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("tracker.sqlite");

    let timer = TimerState::new(
        ActivityType::Bottlefeeding,
        time::now() - TimeDelta::minutes(3),
        Some(150),
    );
    {
        let state = open_state(&path);
        state.timer_store.set_active(&timer).unwrap();
        state
            .activity_log
            .append(&ActivityEntry::Nappy {
                kind: NappyKind::Mixed,
                time: time::now(),
            })
            .unwrap();
    }

    let state = open_state(&path);
    assert_eq!(state.timer_store.get_active().unwrap(), Some(timer));
    assert_eq!(state.activity_log.latest_of_type("nappy").unwrap().len(), 1);
}

#[test]
fn reopening_does_not_rerun_migrations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracker.sqlite");

    drop(Database::open(&path).unwrap());
    let db = Database::open(&path).unwrap();
    let version = db.with_conn(|conn| migrate::schema_version(conn)).unwrap();
    assert_eq!(version, migrate::DB_VERSION);
}
