use chrono::NaiveDate;

use crate::datetime::{add_days, days_between};
use crate::event::{Category, MaintenanceEvent};
use crate::ledger::MaintenanceLedger;
use crate::settings::IntervalSettings;

/// Threshold under which a badge escalates from `Ok` to `Soon`.
pub const SOON_THRESHOLD_DAYS: u32 = 14;

/// Next due date for one category, recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedStatus {
    pub category: Category,
    pub interval_days: u32,
    pub next_due: NaiveDate,
    /// Clamped at zero: due today and overdue look the same here.
    pub days_remaining: u32,
    /// Signed difference; negative when overdue.
    pub raw_days: i64,
}

impl DerivedStatus {
    pub fn is_overdue(&self) -> bool {
        self.raw_days < 0
    }

    pub fn urgency(&self, settings: &IntervalSettings) -> Urgency {
        Urgency::classify(self.days_remaining, settings.reminder_lead_days)
    }

    pub fn label(&self) -> String {
        if self.is_overdue() {
            let late = self.raw_days.unsigned_abs();
            return if late == 1 {
                "overdue by 1 day".to_string()
            } else {
                format!("overdue by {late} days")
            };
        }
        match self.days_remaining {
            0 => "due today".to_string(),
            1 => "due tomorrow".to_string(),
            n => format!("{n} days left"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Ok,
    Soon,
    Due,
}

impl Urgency {
    pub fn classify(days_remaining: u32, reminder_lead_days: u32) -> Self {
        if days_remaining == 0 || days_remaining <= reminder_lead_days {
            Urgency::Due
        } else if days_remaining <= SOON_THRESHOLD_DAYS {
            Urgency::Soon
        } else {
            Urgency::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub engine: DerivedStatus,
    pub differential: DerivedStatus,
}

impl StatusReport {
    pub fn get(&self, category: Category) -> &DerivedStatus {
        match category {
            Category::Engine => &self.engine,
            Category::Differential => &self.differential,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedStatus> {
        [&self.engine, &self.differential].into_iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    /// Entries whose own next-due date is still in the future.
    pub active: usize,
}

/// An untouched category counts from `today`, so it is neither overdue nor
/// deferred indefinitely.
pub fn status_from_base(
    category: Category,
    base: NaiveDate,
    interval_days: u32,
    today: NaiveDate,
) -> DerivedStatus {
    let next_due = add_days(base, interval_days);
    let raw_days = days_between(today, next_due);
    let days_remaining = u32::try_from(raw_days.max(0)).unwrap_or(u32::MAX);
    DerivedStatus {
        category,
        interval_days,
        next_due,
        days_remaining,
        raw_days,
    }
}

#[tracing::instrument(skip(ledger, settings), fields(events = ledger.len()))]
pub fn derive_status(
    ledger: &MaintenanceLedger,
    settings: &IntervalSettings,
    today: NaiveDate,
) -> StatusReport {
    let derive = |category: Category| {
        let base = ledger
            .latest(category)
            .map(|e| e.performed_on)
            .unwrap_or(today);
        status_from_base(category, base, settings.interval_for(category), today)
    };

    StatusReport {
        engine: derive(Category::Engine),
        differential: derive(Category::Differential),
    }
}

/// Live status of a single history entry under the current intervals.
pub fn status_for_event(
    event: &MaintenanceEvent,
    settings: &IntervalSettings,
    today: NaiveDate,
) -> DerivedStatus {
    status_from_base(
        event.category,
        event.performed_on,
        settings.interval_for(event.category),
        today,
    )
}

pub fn stats(ledger: &MaintenanceLedger, settings: &IntervalSettings, today: NaiveDate) -> Stats {
    let active = ledger
        .iter()
        .filter(|e| status_for_event(e, settings, today).days_remaining > 0)
        .count();
    Stats {
        total: ledger.len(),
        active,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::event::EntryId;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn ledger_with(entries: &[(Category, NaiveDate)]) -> MaintenanceLedger {
        let mut ledger = MaintenanceLedger::new();
        for (idx, (category, date)) in entries.iter().enumerate() {
            ledger
                .append(MaintenanceEvent {
                    id: EntryId::from(format!("e{idx}").as_str()),
                    category: *category,
                    performed_on: *date,
                    note: String::new(),
                })
                .expect("append");
        }
        ledger
    }

    #[test]
    fn untouched_engine_counts_from_today() {
        let settings = IntervalSettings::default();
        let report = derive_status(&MaintenanceLedger::new(), &settings, ymd(2024, 1, 1));
        assert_eq!(report.engine.next_due, ymd(2024, 1, 31));
        assert_eq!(report.engine.days_remaining, 30);
        assert_eq!(report.differential.next_due, ymd(2024, 3, 1));
        assert_eq!(report.differential.days_remaining, 60);
    }

    #[test]
    fn recorded_engine_change_counts_down() {
        let ledger = ledger_with(&[(Category::Engine, ymd(2024, 1, 1))]);
        let settings = IntervalSettings::default();
        let report = derive_status(&ledger, &settings, ymd(2024, 1, 25));
        assert_eq!(report.engine.next_due, ymd(2024, 1, 31));
        assert_eq!(report.engine.days_remaining, 6);
        assert_eq!(report.engine.label(), "6 days left");
        assert_eq!(report.engine.urgency(&settings), Urgency::Soon);
    }

    #[test]
    fn overdue_clamps_to_zero_but_keeps_raw_difference() {
        let ledger = ledger_with(&[(Category::Engine, ymd(2024, 1, 1))]);
        let settings = IntervalSettings::default();
        let report = derive_status(&ledger, &settings, ymd(2024, 2, 15));
        assert_eq!(report.engine.days_remaining, 0);
        assert_eq!(report.engine.raw_days, -15);
        assert!(report.engine.is_overdue());
        assert_eq!(report.engine.label(), "overdue by 15 days");
        assert_eq!(report.engine.urgency(&settings), Urgency::Due);
    }

    #[test]
    fn labels_for_today_and_tomorrow() {
        let today = ymd(2024, 1, 31);
        let due_today = status_from_base(Category::Engine, ymd(2024, 1, 1), 30, today);
        assert_eq!(due_today.label(), "due today");
        let due_tomorrow = status_from_base(Category::Engine, ymd(2024, 1, 2), 30, today);
        assert_eq!(due_tomorrow.label(), "due tomorrow");
    }

    #[test]
    fn reminder_lead_moves_due_threshold() {
        assert_eq!(Urgency::classify(3, 3), Urgency::Due);
        assert_eq!(Urgency::classify(4, 3), Urgency::Soon);
        assert_eq!(Urgency::classify(7, 7), Urgency::Due);
        assert_eq!(Urgency::classify(15, 7), Urgency::Ok);
        assert_eq!(Urgency::classify(0, 1), Urgency::Due);
    }

    #[test]
    fn stats_count_entries_still_in_window() {
        let ledger = ledger_with(&[
            (Category::Engine, ymd(2024, 1, 1)),
            (Category::Engine, ymd(2024, 2, 1)),
            (Category::Differential, ymd(2024, 1, 1)),
        ]);
        let settings = IntervalSettings::default();
        let stats = stats(&ledger, &settings, ymd(2024, 2, 10));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
    }

    fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (1990i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
    }

    proptest! {
        #[test]
        fn empty_ledger_is_due_one_interval_from_today(interval in 1u32..=365, today in arb_date()) {
            let settings = IntervalSettings {
                engine_interval_days: interval,
                differential_interval_days: interval,
                ..IntervalSettings::default()
            };
            let report = derive_status(&MaintenanceLedger::new(), &settings, today);
            for status in report.iter() {
                prop_assert_eq!(status.next_due, add_days(today, interval));
                prop_assert_eq!(status.days_remaining, interval);
            }
        }

        #[test]
        fn days_remaining_never_negative(
            performed in arb_date(),
            today in arb_date(),
            interval in 1u32..=365
        ) {
            let ledger = ledger_with(&[(Category::Differential, performed)]);
            let settings = IntervalSettings {
                differential_interval_days: interval,
                ..IntervalSettings::default()
            };
            let status = derive_status(&ledger, &settings, today).differential;
            prop_assert_eq!(i64::from(status.days_remaining), status.raw_days.max(0));
        }

        #[test]
        fn latest_is_at_least_any_appended_date(dates in proptest::collection::vec(arb_date(), 1..12)) {
            let entries: Vec<(Category, NaiveDate)> =
                dates.iter().map(|d| (Category::Engine, *d)).collect();
            let ledger = ledger_with(&entries);
            let latest = ledger.latest(Category::Engine).expect("non-empty");
            for date in &dates {
                prop_assert!(latest.performed_on >= *date);
            }
        }
    }
}
