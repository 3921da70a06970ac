use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(ActionType::OverrideCreated, "ops")
        .with_entity("ManualOverride", "CP001")
        .with_date(date())
        .with_values(None, Some(json!({"depot_id": "D002", "volume": 50})));
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action_type, "OVERRIDE_CREATED");
    assert_eq!(found.target_date, Some(date()));
    assert_eq!(found.new_value, Some(json!({"depot_id": "D002", "volume": 50})));
    assert!(found.old_value.is_none());
}

#[test]
fn test_find_by_id_missing_returns_none() {
    let repo = ActionLogRepository::new(setup_test_db());
    assert!(repo.find_by_id("nope").unwrap().is_none());
}

#[test]
fn test_batch_insert_and_filters() {
    let repo = ActionLogRepository::new(setup_test_db());
    let other_day = date().succ_opt().unwrap();
    let logs = vec![
        ActionLog::new(ActionType::VolumeImport, "importer").with_date(date()),
        ActionLog::new(ActionType::Recalc, "system").with_date(date()),
        ActionLog::new(ActionType::Recalc, "system").with_date(other_day),
    ];
    assert_eq!(repo.batch_insert(&logs).unwrap(), 3);

    assert_eq!(repo.find_by_target_date(date()).unwrap().len(), 2);
    assert_eq!(repo.find_by_action_type("RECALC", 10).unwrap().len(), 2);
    assert_eq!(repo.find_recent(2).unwrap().len(), 2);
    assert_eq!(repo.count_by_actor("system").unwrap(), 2);
}
