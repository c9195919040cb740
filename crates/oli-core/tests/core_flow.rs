use chrono::NaiveDate;
use oli_core::app::{Action, Session};
use oli_core::event::{Category, EntryId, EventDraft};
use oli_core::export;
use oli_core::notice::Level;
use oli_core::settings::SettingsPatch;
use oli_core::store::{FileStore, HISTORY_KEY, KvStore, SETTINGS_KEY};
use tempfile::tempdir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn record(category: Category, date: &str, note: &str) -> Action {
    Action::Record(EventDraft::new(category, Some(date.to_string()), note))
}

#[test]
fn file_store_session_survives_reopen() {
    let temp = tempdir().expect("tempdir");
    let today = ymd(2024, 1, 25);

    {
        let store = FileStore::open(temp.path()).expect("open store");
        let mut session = Session::load(store, today);
        session
            .dispatch(record(Category::Engine, "2024-01-01", "Castrol Power1"))
            .expect("record engine");
        session
            .dispatch(Action::UpdateSettings(SettingsPatch {
                differential_interval_days: Some(90),
                ..SettingsPatch::default()
            }))
            .expect("update settings");
    }

    let store = FileStore::open(temp.path()).expect("reopen store");
    assert!(store.get(HISTORY_KEY).expect("get").is_some());
    assert!(store.get(SETTINGS_KEY).expect("get").is_some());

    let session = Session::load(store, today);
    let report = session.status();
    assert_eq!(report.engine.next_due, ymd(2024, 1, 31));
    assert_eq!(report.engine.days_remaining, 6);
    assert_eq!(report.differential.next_due, ymd(2024, 4, 24));
    assert_eq!(report.differential.days_remaining, 90);
}

#[test]
fn overdue_engine_is_clamped_to_zero() {
    let temp = tempdir().expect("tempdir");
    let store = FileStore::open(temp.path()).expect("open store");
    let mut session = Session::load(store, ymd(2024, 2, 15));
    session
        .dispatch(record(Category::Engine, "2024-01-01", ""))
        .expect("record");

    let engine = session.status().engine;
    assert_eq!(engine.next_due, ymd(2024, 1, 31));
    assert_eq!(engine.days_remaining, 0);
    assert!(engine.is_overdue());
}

#[test]
fn reset_deletes_history_file_but_keeps_settings() {
    let temp = tempdir().expect("tempdir");
    let store = FileStore::open(temp.path()).expect("open store");
    let history_path = store.path_for(HISTORY_KEY);
    let mut session = Session::load(store, ymd(2024, 3, 1));

    session
        .dispatch(record(Category::Differential, "2024-02-01", ""))
        .expect("record");
    session
        .dispatch(Action::UpdateSettings(SettingsPatch {
            reminder_lead_days: Some(7),
            ..SettingsPatch::default()
        }))
        .expect("settings");
    assert!(history_path.exists());

    session.dispatch(Action::Reset).expect("reset");
    assert!(!history_path.exists());
    assert!(session.state().ledger.latest(Category::Differential).is_none());
    assert_eq!(session.state().settings.reminder_lead_days, 7);
    assert!(session.store().get(SETTINGS_KEY).expect("get").is_some());
}

#[test]
fn remove_unknown_id_leaves_ledger_unchanged() {
    let temp = tempdir().expect("tempdir");
    let store = FileStore::open(temp.path()).expect("open store");
    let mut session = Session::load(store, ymd(2024, 3, 1));
    session
        .dispatch(record(Category::Engine, "2024-02-20", ""))
        .expect("record");
    let before = session.state().clone();

    session
        .dispatch(Action::Remove(EntryId::from("does-not-exist")))
        .expect("no-op");
    assert_eq!(session.state(), &before);
}

#[test]
fn export_reparses_to_same_events() {
    let temp = tempdir().expect("tempdir");
    let store = FileStore::open(&temp.path().join("data")).expect("open store");
    let today = ymd(2024, 5, 1);
    let mut session = Session::load(store, today);
    session
        .dispatch(record(Category::Engine, "2024-04-01", "Motul 5100 10W-40"))
        .expect("record");
    session
        .dispatch(record(Category::Differential, "2024-03-15", ""))
        .expect("record");

    let target = export::resolve_target(Some(temp.path()), today);
    let state = session.state();
    export::write_export(&state.ledger, &state.settings, today, &target).expect("export");
    assert!(
        target
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n == "oli-reminder-backup-2024-05-01.json")
    );

    let raw = std::fs::read_to_string(&target).expect("read export");
    let events = export::parse(&raw).expect("parse export");
    assert_eq!(events, state.ledger.events());
}

#[test]
fn unreadable_saved_data_still_allows_set_and_reset() {
    let temp = tempdir().expect("tempdir");
    let mut store = FileStore::open(temp.path()).expect("open store");
    store.put(HISTORY_KEY, "{not json").expect("put history");
    store
        .put(
            SETTINGS_KEY,
            r#"{"reminderDays":3,"notifications":true,"oliMesinInterval":-5,"oliGardanInterval":60}"#,
        )
        .expect("put settings");
    let history_path = store.path_for(HISTORY_KEY);

    let today = ymd(2024, 3, 1);
    let mut session = Session::load(store, today);
    let warnings = session.take_notices();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|n| n.level == Level::Warning));
    assert!(session.take_notices().is_empty());
    assert!(session.state().ledger.is_empty());
    assert_eq!(session.state().settings.engine_interval_days, 30);
    assert_eq!(session.state().settings.differential_interval_days, 60);

    session
        .dispatch(Action::UpdateSettings(SettingsPatch {
            engine_interval_days: Some(45),
            ..SettingsPatch::default()
        }))
        .expect("set");
    session.dispatch(Action::Reset).expect("reset");
    assert!(!history_path.exists());

    let mut reopened = Session::load(FileStore::open(temp.path()).expect("reopen"), today);
    assert!(reopened.take_notices().is_empty());
    assert_eq!(reopened.state().settings.engine_interval_days, 45);
}
