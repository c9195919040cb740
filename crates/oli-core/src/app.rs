use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::ValidationError;
use crate::event::{EntryId, EventDraft};
use crate::ledger::MaintenanceLedger;
use crate::notice::Notice;
use crate::settings::{IntervalSettings, SettingsPatch};
use crate::status::{StatusReport, Stats, derive_status, stats};
use crate::store::{self, KvStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub ledger: MaintenanceLedger,
    pub settings: IntervalSettings,
}

impl AppState {
    pub fn status(&self, today: NaiveDate) -> StatusReport {
        derive_status(&self.ledger, &self.settings, today)
    }

    pub fn stats(&self, today: NaiveDate) -> Stats {
        stats(&self.ledger, &self.settings, today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Record(EventDraft),
    Remove(EntryId),
    Reset,
    UpdateSettings(SettingsPatch),
}

/// Persistence work requested by a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SaveLedger,
    RemoveLedger,
    SaveSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: AppState,
    pub effects: Vec<Effect>,
    pub notices: Vec<Notice>,
}

/// Computes the state that follows `action`. On error the caller keeps the
/// old state untouched.
#[tracing::instrument(skip(state, action))]
pub fn apply(
    state: &AppState,
    action: Action,
    today: NaiveDate,
) -> Result<Transition, ValidationError> {
    let mut next = state.clone();

    match action {
        Action::Record(draft) => {
            let event = draft.into_event(today)?;
            let message = format!(
                "{} change on {} recorded",
                event.category.label(),
                crate::datetime::format_date(event.performed_on)
            );
            next.ledger.append(event)?;
            Ok(Transition {
                state: next,
                effects: vec![Effect::SaveLedger],
                notices: vec![Notice::success(message)],
            })
        }
        Action::Remove(id) => match next.ledger.remove(&id) {
            Some(removed) => Ok(Transition {
                state: next,
                effects: vec![Effect::SaveLedger],
                notices: vec![Notice::success(format!(
                    "deleted {} entry {}",
                    removed.category,
                    removed.id.short()
                ))],
            }),
            None => {
                debug!(id = %id, "remove of unknown id ignored");
                Ok(Transition {
                    state: next,
                    effects: vec![],
                    notices: vec![Notice::info(format!("no entry with id {id}"))],
                })
            }
        },
        Action::Reset => {
            let dropped = next.ledger.len();
            next.ledger.clear();
            Ok(Transition {
                state: next,
                effects: vec![Effect::RemoveLedger],
                notices: vec![Notice::success(format!(
                    "all data deleted ({dropped} entries)"
                ))],
            })
        }
        Action::UpdateSettings(patch) => {
            if patch.is_empty() {
                return Ok(Transition {
                    state: next,
                    effects: vec![],
                    notices: vec![Notice::info("nothing to change")],
                });
            }
            next.settings.update(&patch);
            Ok(Transition {
                state: next,
                effects: vec![Effect::SaveSettings],
                notices: vec![Notice::success("settings saved")],
            })
        }
    }
}

/// Reminder notices for categories inside the configured lead window.
pub fn reminder_notices(report: &StatusReport, settings: &IntervalSettings) -> Vec<Notice> {
    if !settings.notifications {
        return Vec::new();
    }
    report
        .iter()
        .filter(|status| status.days_remaining <= settings.reminder_lead_days)
        .map(|status| {
            Notice::warning(format!(
                "{} change {} ({})",
                status.category.label(),
                status.label(),
                crate::datetime::format_date(status.next_due)
            ))
        })
        .collect()
}

/// Owns the store for one invocation and keeps it in step with the state.
#[derive(Debug)]
pub struct Session<S: KvStore> {
    store: S,
    state: AppState,
    today: NaiveDate,
    pending: Vec<Notice>,
}

impl<S: KvStore> Session<S> {
    /// Loading never fails. Whatever could not be read falls back to an empty
    /// history or default settings and is queued as a warning notice.
    #[tracing::instrument(skip(store))]
    pub fn load(store: S, today: NaiveDate) -> Self {
        let ledger = store::load_ledger(&store);
        let settings = store::load_settings(&store);
        let pending: Vec<Notice> = ledger
            .problems
            .iter()
            .chain(&settings.problems)
            .map(|problem| {
                warn!(%problem, "recovered from stored data");
                Notice::warning(problem.clone())
            })
            .collect();
        info!(events = ledger.value.len(), recovered = pending.len(), "session loaded");
        Self {
            store,
            state: AppState {
                ledger: ledger.value,
                settings: settings.value,
            },
            today,
            pending,
        }
    }

    /// Warnings raised while loading, handed out once.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.pending)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status(&self) -> StatusReport {
        self.state.status(self.today)
    }

    /// Applies `action` and persists what changed. Storage failures do not
    /// roll back the in-memory state; they come back as warning notices.
    #[tracing::instrument(skip(self, action))]
    pub fn dispatch(&mut self, action: Action) -> Result<Vec<Notice>, ValidationError> {
        let Transition {
            state,
            effects,
            mut notices,
        } = apply(&self.state, action, self.today)?;
        self.state = state;

        for effect in effects {
            if let Err(err) = self.run_effect(effect) {
                warn!(?effect, error = %format!("{err:#}"), "persisting state failed");
                notices.push(Notice::warning(format!("could not save: {err:#}")));
            }
        }
        Ok(notices)
    }

    fn run_effect(&mut self, effect: Effect) -> anyhow::Result<()> {
        debug!(?effect, "running effect");
        match effect {
            Effect::SaveLedger => store::save_ledger(
                &mut self.store,
                &self.state.ledger,
                &self.state.settings,
                self.today,
            ),
            Effect::RemoveLedger => store::remove_ledger(&mut self.store),
            Effect::SaveSettings => store::save_settings(&mut self.store, &self.state.settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Category;
    use crate::notice::Level;
    use crate::store::{HISTORY_KEY, MemoryStore, SETTINGS_KEY};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn record(category: Category, date: &str) -> Action {
        Action::Record(EventDraft::new(category, Some(date.to_string()), ""))
    }

    #[test]
    fn failed_record_leaves_state_untouched() {
        let state = AppState::default();
        let err = apply(
            &state,
            Action::Record(EventDraft::new(Category::Engine, None, "")),
            ymd(2024, 1, 1),
        )
        .expect_err("missing date");
        assert_eq!(err, ValidationError::MissingDate);
        assert!(state.ledger.is_empty());
    }

    #[test]
    fn record_requests_ledger_save() {
        let transition =
            apply(&AppState::default(), record(Category::Engine, "2024-01-01"), ymd(2024, 1, 5))
                .expect("valid");
        assert_eq!(transition.effects, vec![Effect::SaveLedger]);
        assert_eq!(transition.state.ledger.len(), 1);
        assert_eq!(transition.notices[0].level, Level::Success);
    }

    #[test]
    fn remove_unknown_id_has_no_effects() {
        let transition = apply(
            &AppState::default(),
            Action::Remove(EntryId::from("missing")),
            ymd(2024, 1, 5),
        )
        .expect("no-op");
        assert!(transition.effects.is_empty());
        assert_eq!(transition.state, AppState::default());
    }

    #[test]
    fn session_reset_removes_persisted_history() {
        let today = ymd(2024, 1, 25);
        let mut session = Session::load(MemoryStore::new(), today);
        session
            .dispatch(record(Category::Engine, "2024-01-01"))
            .expect("record");
        assert!(session.store().contains(HISTORY_KEY));

        session.dispatch(Action::Reset).expect("reset");
        assert!(!session.store().contains(HISTORY_KEY));
        for category in Category::ALL {
            assert!(session.state().ledger.latest(category).is_none());
        }
    }

    #[test]
    fn session_settings_update_persists() {
        let mut session = Session::load(MemoryStore::new(), ymd(2024, 1, 1));
        let patch = SettingsPatch {
            engine_interval_days: Some(45),
            ..SettingsPatch::default()
        };
        session
            .dispatch(Action::UpdateSettings(patch))
            .expect("update");
        assert!(session.store().contains(SETTINGS_KEY));
        assert_eq!(session.status().engine.days_remaining, 45);
    }

    #[test]
    fn storage_failure_is_reported_not_fatal() {
        let mut session = Session::load(MemoryStore::with_quota(8), ymd(2024, 1, 25));
        let notices = session
            .dispatch(record(Category::Engine, "2024-01-01"))
            .expect("validation passes");
        assert!(notices.iter().any(|n| n.level == Level::Warning));
        assert_eq!(session.state().ledger.len(), 1);
        assert_eq!(session.status().engine.days_remaining, 6);
    }

    #[test]
    fn reminders_respect_lead_and_toggle() {
        let mut state = AppState::default();
        state.ledger = apply(&state, record(Category::Engine, "2024-01-01"), ymd(2024, 1, 1))
            .expect("record")
            .state
            .ledger;
        let today = ymd(2024, 1, 29);
        let report = state.status(today);
        let notices = reminder_notices(&report, &state.settings);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("Engine oil"));

        state.settings.notifications = false;
        assert!(reminder_notices(&report, &state.settings).is_empty());
    }
}
