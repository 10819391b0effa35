use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};
use tracing::debug;

use crate::classify::{classify, occupancy_ratio};
use crate::error::{InsightsError, Result};
use crate::models::{AttendanceRecord, ClassTier, Session};
use crate::normalize::{instructor_count, normalize_instructors, normalize_time};

pub const SESSION_DATE_FORMAT: &str = "%d/%m/%Y";

pub fn parse_session_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), SESSION_DATE_FORMAT).ok()
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(InsightsError::InvalidWindow { from, to });
        }
        Ok(Self { from, to })
    }

    /// Every day of the month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        let from = day.with_day(1).unwrap_or(day);
        let to = from
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(from);
        Self { from, to }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |day| *day <= to)
    }
}

/// Row selection applied before grouping. Passed explicitly on every pass.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub window: Option<DateWindow>,
    /// Exact class type to keep; `None` keeps every type.
    pub class_type: Option<String>,
    /// Hour bucket to keep, compared after normalisation.
    pub time_slot: Option<String>,
    pub excluded_class_types: Vec<String>,
}

impl SessionFilter {
    fn is_excluded(&self, class_type: &str) -> bool {
        let class_type = class_type.to_lowercase();
        self.excluded_class_types
            .iter()
            .any(|excluded| excluded.to_lowercase() == class_type)
    }

    fn keeps_type(&self, class_type: &str) -> bool {
        self.class_type
            .as_deref()
            .map_or(true, |wanted| wanted == class_type)
    }

    fn keeps_slot(&self, time_slot: &str) -> bool {
        self.time_slot
            .as_deref()
            .map_or(true, |wanted| normalize_time(wanted) == time_slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    session_date: String,
    time_slot: String,
    location: String,
    class_type: String,
    instructors: String,
}

struct SessionAccumulator {
    date: NaiveDate,
    key: SessionKey,
    coordinator_name: Option<String>,
    attendee_count: usize,
    attendee_names: Vec<String>,
}

impl SessionAccumulator {
    fn finish(self) -> Session {
        let instructor_names = normalize_instructors(&self.key.instructors);
        let instructor_count = instructor_count(&instructor_names);
        let occupancy_ratio = occupancy_ratio(self.attendee_count, instructor_count);
        let classification = classify(occupancy_ratio, ClassTier::of(&self.key.class_type));

        Session {
            session_date: self.key.session_date,
            date: self.date,
            time_slot: self.key.time_slot,
            location: self.key.location,
            class_type: self.key.class_type,
            instructors: self.key.instructors,
            instructor_names,
            instructor_count,
            attendee_count: self.attendee_count,
            attendee_names: self.attendee_names,
            coordinator_name: self.coordinator_name,
            occupancy_ratio,
            status: classification.status,
            color: classification.color,
        }
    }
}

/// Groups attendance rows into classified sessions, in first-seen order.
///
/// Rows with unreadable dates are dropped. The key uses the instructor text
/// verbatim, so differently written lists of the same team stay separate.
pub fn group_sessions(rows: &[AttendanceRecord], filter: &SessionFilter) -> Vec<Session> {
    let mut index: HashMap<SessionKey, usize> = HashMap::new();
    let mut sessions: Vec<SessionAccumulator> = Vec::new();
    let mut dropped_dates = 0usize;
    let mut dropped_window = 0usize;
    let mut dropped_excluded = 0usize;
    let mut dropped_filter = 0usize;

    for row in rows {
        let Some(date) = parse_session_date(&row.session_date) else {
            debug!(record_id = %row.record_id, session_date = %row.session_date, "dropping row with unreadable date");
            dropped_dates += 1;
            continue;
        };

        if filter.window.is_some_and(|window| !window.contains(date)) {
            dropped_window += 1;
            continue;
        }

        if filter.is_excluded(&row.class_type) {
            dropped_excluded += 1;
            continue;
        }

        let time_slot = normalize_time(&row.time_label);
        if !filter.keeps_type(&row.class_type) || !filter.keeps_slot(&time_slot) {
            dropped_filter += 1;
            continue;
        }

        let key = SessionKey {
            session_date: row.session_date.clone(),
            time_slot,
            location: row.location.clone(),
            class_type: row.class_type.clone(),
            instructors: row.instructors.clone(),
        };

        let position = *index.entry(key.clone()).or_insert_with(|| {
            sessions.push(SessionAccumulator {
                date,
                key,
                coordinator_name: row.coordinator_name.clone(),
                attendee_count: 0,
                attendee_names: Vec::new(),
            });
            sessions.len() - 1
        });

        let entry = &mut sessions[position];
        entry.attendee_count += 1;
        let student = row.student_name.trim();
        if !student.is_empty() {
            entry.attendee_names.push(student.to_string());
        }
    }

    debug!(
        rows = rows.len(),
        sessions = sessions.len(),
        dropped_dates,
        dropped_window,
        dropped_excluded,
        dropped_filter,
        "grouped attendance into sessions"
    );

    sessions.into_iter().map(SessionAccumulator::finish).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{IndicatorColor, StatusLabel};
    use proptest::prelude::*;

    pub(crate) fn row(
        date: &str,
        time: &str,
        class_type: &str,
        instructors: &str,
        student: &str,
    ) -> AttendanceRecord {
        AttendanceRecord {
            record_id: format!("{date}-{time}-{student}"),
            session_date: date.to_string(),
            time_label: time.to_string(),
            location: "Arena Norte".to_string(),
            class_type: class_type.to_string(),
            instructors: instructors.to_string(),
            student_name: student.to_string(),
            coordinator_name: Some("Marta".to_string()),
        }
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn three_students_with_one_instructor_is_normal() {
        let rows = vec![
            row("01/03/2024", "05h", "Geral", "Ana", "S1"),
            row("01/03/2024", "05h", "Geral", "Ana", "S2"),
            row("01/03/2024", "05h", "Geral", "Ana", "S3"),
        ];

        let sessions = group_sessions(&rows, &SessionFilter::default());
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.attendee_count, 3);
        assert_eq!(session.instructor_count, 1);
        assert_eq!(session.occupancy_ratio, 3.0);
        assert_eq!(session.status, StatusLabel::Normal);
        assert_eq!(session.color, IndicatorColor::Yellow);
        assert_eq!(session.attendee_names, vec!["S1", "S2", "S3"]);
        assert_eq!(session.coordinator_name.as_deref(), Some("Marta"));
    }

    #[test]
    fn vip_pair_is_profitable() {
        let rows = vec![
            row("02/03/2024", "7:00", "VIP", "Peu", "S1"),
            row("02/03/2024", "07h", "VIP", "Peu", "S2"),
        ];

        let sessions = group_sessions(&rows, &SessionFilter::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].occupancy_ratio, 2.0);
        assert_eq!(sessions[0].status, StatusLabel::Profitable);
        assert_eq!(sessions[0].color, IndicatorColor::Green);
        assert_eq!(sessions[0].instructor_names, vec!["Peu Beck"]);
    }

    #[test]
    fn equivalent_instructor_text_is_not_merged() {
        let rows = vec![
            row("01/03/2024", "06h", "Geral", "Ana, Bruno", "S1"),
            row("01/03/2024", "06h", "Geral", "Ana e Bruno", "S2"),
        ];

        let sessions = group_sessions(&rows, &SessionFilter::default());
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.instructor_count == 2));
        assert!(sessions.iter().all(|s| s.occupancy_ratio == 0.5));
    }

    #[test]
    fn unreadable_dates_are_dropped() {
        let rows = vec![
            row("2024-03-01", "05h", "Geral", "Ana", "S1"),
            row("", "05h", "Geral", "Ana", "S2"),
            row("01/03/2024", "05h", "Geral", "Ana", "S3"),
        ];

        let sessions = group_sessions(&rows, &SessionFilter::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].attendee_count, 1);
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let rows = vec![
            row("29/02/2024", "05h", "Geral", "Ana", "S1"),
            row("01/03/2024", "05h", "Geral", "Ana", "S2"),
            row("05/03/2024", "05h", "Geral", "Ana", "S3"),
            row("06/03/2024", "05h", "Geral", "Ana", "S4"),
        ];
        let filter = SessionFilter {
            window: Some(DateWindow::new(ymd(2024, 3, 1), ymd(2024, 3, 5)).unwrap()),
            ..SessionFilter::default()
        };

        let sessions = group_sessions(&rows, &filter);
        let dates: Vec<&str> = sessions.iter().map(|s| s.session_date.as_str()).collect();
        assert_eq!(dates, vec!["01/03/2024", "05/03/2024"]);
    }

    #[test]
    fn excluded_types_match_case_insensitively() {
        let rows = vec![
            row("01/03/2024", "05h", "AULÃO", "Ana", "S1"),
            row("01/03/2024", "05h", "Geral", "Ana", "S2"),
        ];
        let filter = SessionFilter {
            excluded_class_types: vec!["Aulão".to_string()],
            ..SessionFilter::default()
        };

        let sessions = group_sessions(&rows, &filter);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].class_type, "Geral");
    }

    #[test]
    fn time_filter_uses_normalised_slot() {
        let rows = vec![
            row("01/03/2024", "5:00", "Geral", "Ana", "S1"),
            row("01/03/2024", "06h", "Geral", "Ana", "S2"),
        ];
        let filter = SessionFilter {
            time_slot: Some("05h".to_string()),
            ..SessionFilter::default()
        };

        let sessions = group_sessions(&rows, &filter);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].time_slot, "05h");
    }

    #[test]
    fn class_type_filter_is_exact() {
        let rows = vec![
            row("01/03/2024", "05h", "VIP", "Ana", "S1"),
            row("01/03/2024", "05h", "Geral", "Ana", "S2"),
        ];
        let filter = SessionFilter {
            class_type: Some("VIP".to_string()),
            ..SessionFilter::default()
        };

        let sessions = group_sessions(&rows, &filter);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].class_type, "VIP");
    }

    #[test]
    fn blank_student_counts_but_is_not_listed() {
        let rows = vec![
            row("01/03/2024", "05h", "Geral", "", "S1"),
            row("01/03/2024", "05h", "Geral", "", "  "),
        ];

        let sessions = group_sessions(&rows, &SessionFilter::default());
        assert_eq!(sessions[0].attendee_count, 2);
        assert_eq!(sessions[0].attendee_names, vec!["S1"]);
        assert_eq!(sessions[0].instructor_count, 1);
    }

    #[test]
    fn rejects_inverted_window() {
        let err = DateWindow::new(ymd(2024, 3, 5), ymd(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, InsightsError::InvalidWindow { .. }));
    }

    #[test]
    fn month_window_covers_whole_month() {
        let window = DateWindow::month_of(ymd(2024, 2, 17));
        assert_eq!(window.from(), ymd(2024, 2, 1));
        assert_eq!(window.to(), ymd(2024, 2, 29));
        assert_eq!(window.days().count(), 29);
    }

    fn arb_row() -> impl Strategy<Value = AttendanceRecord> {
        (
            prop_oneof![
                Just("01/03/2024"),
                Just("02/03/2024"),
                Just("31/02/2024"),
                Just("garbage")
            ],
            prop_oneof![Just("5:00"), Just("05h"), Just("18:30")],
            prop_oneof![Just("Geral"), Just("VIP"), Just("Aulão")],
            prop_oneof![Just("Ana"), Just("Ana, Bruno"), Just("")],
            "[A-Z][a-z]{0,5}",
        )
            .prop_map(|(date, time, class_type, instructors, student)| {
                row(date, time, class_type, instructors, &student)
            })
    }

    proptest! {
        #[test]
        fn grouping_partitions_surviving_rows(rows in proptest::collection::vec(arb_row(), 0..40)) {
            let filter = SessionFilter {
                excluded_class_types: vec!["Aulão".to_string()],
                ..SessionFilter::default()
            };
            let sessions = group_sessions(&rows, &filter);
            let surviving = rows
                .iter()
                .filter(|r| parse_session_date(&r.session_date).is_some())
                .filter(|r| r.class_type != "Aulão")
                .count();

            prop_assert_eq!(sessions.iter().map(|s| s.attendee_count).sum::<usize>(), surviving);
            prop_assert!(sessions.iter().all(|s| s.attendee_count >= 1 && s.instructor_count >= 1));
        }

        #[test]
        fn grouping_is_deterministic(rows in proptest::collection::vec(arb_row(), 0..20)) {
            let filter = SessionFilter::default();
            let first = serde_json::to_string(&group_sessions(&rows, &filter)).unwrap();
            let second = serde_json::to_string(&group_sessions(&rows, &filter)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
