use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::classify;
use crate::config::AnalysisConfig;
use crate::models::{
    ClassTier, DailyStat, DayEvolution, InstructorStat, KpiSummary, Session, StatusLabel,
    TimeSlotStat, Trend, TrendDirection,
};
use crate::sessions::DateWindow;

/// Every derived view of one filtered session set.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub kpis: KpiSummary,
    pub time_slots: Vec<TimeSlotStat>,
    pub best_time: Option<TimeSlotStat>,
    pub critical_time: Option<TimeSlotStat>,
    pub instructors: Vec<InstructorStat>,
    pub top_instructor: Option<InstructorStat>,
    pub daily: Vec<DailyStat>,
    pub trend: Option<Trend>,
    pub best_session: Option<Session>,
    pub worst_session: Option<Session>,
    pub tier: ClassTier,
}

pub fn build_snapshot(sessions: &[Session], config: &AnalysisConfig) -> DashboardSnapshot {
    let kpis = kpi_summary(sessions);
    let time_slots = time_slot_stats(sessions);
    let instructors = instructor_stats(sessions);
    let daily = daily_stats(sessions);
    let trend = trend(
        &daily,
        kpis.mean_ratio,
        config.recent_window_days,
        config.stable_tolerance,
    );

    DashboardSnapshot {
        best_time: best_time(&time_slots).cloned(),
        critical_time: critical_time(&time_slots).cloned(),
        top_instructor: top_instructor(&instructors).cloned(),
        best_session: best_session(sessions).cloned(),
        worst_session: worst_session(sessions).cloned(),
        tier: aggregate_tier(sessions),
        kpis,
        time_slots,
        instructors,
        daily,
        trend,
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

pub fn overall_mean(sessions: &[Session]) -> f64 {
    let total: f64 = sessions.iter().map(|s| s.occupancy_ratio).sum();
    mean(total, sessions.len())
}

/// VIP thresholds apply to a set only when every session in it is VIP.
pub fn aggregate_tier(sessions: &[Session]) -> ClassTier {
    if !sessions.is_empty() && sessions.iter().all(|s| s.tier() == ClassTier::Vip) {
        ClassTier::Vip
    } else {
        ClassTier::General
    }
}

pub fn total_presences(sessions: &[Session]) -> usize {
    sessions.iter().map(|s| s.attendee_count).sum()
}

pub fn unique_students(sessions: &[Session]) -> usize {
    sessions
        .iter()
        .flat_map(|s| s.attendee_names.iter())
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .len()
}

pub fn alert_sessions(sessions: &[Session]) -> Vec<&Session> {
    sessions.iter().filter(|s| s.is_alert()).collect()
}

pub fn kpi_summary(sessions: &[Session]) -> KpiSummary {
    let mean_ratio = overall_mean(sessions);
    let classification =
        (!sessions.is_empty()).then(|| classify(mean_ratio, aggregate_tier(sessions)));

    KpiSummary {
        total_presences: total_presences(sessions),
        unique_students: unique_students(sessions),
        session_count: sessions.len(),
        mean_ratio,
        alert_count: sessions.iter().filter(|s| s.is_alert()).count(),
        over_capacity_count: sessions
            .iter()
            .filter(|s| s.status == StatusLabel::OverCapacity)
            .count(),
        status: classification.map(|c| c.status),
        color: classification.map(|c| c.color),
    }
}

/// Per hour bucket, in the order each bucket first appears.
pub fn time_slot_stats(sessions: &[Session]) -> Vec<TimeSlotStat> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(&str, usize, f64, usize, usize)> = Vec::new();

    for session in sessions {
        let slot = session.time_slot.as_str();
        let position = *index.entry(slot).or_insert_with(|| {
            totals.push((slot, 0, 0.0, 0, 0));
            totals.len() - 1
        });
        let entry = &mut totals[position];
        entry.1 += 1;
        entry.2 += session.occupancy_ratio;
        if session.is_alert() {
            entry.3 += 1;
        }
        entry.4 += session.attendee_count;
    }

    totals
        .into_iter()
        .map(
            |(time_slot, count, ratio_sum, alert_count, total_attendees)| TimeSlotStat {
                time_slot: time_slot.to_string(),
                session_count: count,
                mean_ratio: mean(ratio_sum, count),
                alert_count,
                total_attendees,
            },
        )
        .collect()
}

/// Copy of `stats` ordered by slot label, for listings.
pub fn slots_by_label(stats: &[TimeSlotStat]) -> Vec<TimeSlotStat> {
    let mut sorted = stats.to_vec();
    sorted.sort_by(|a, b| a.time_slot.cmp(&b.time_slot));
    sorted
}

/// Slot with the highest mean ratio; the first slot seen wins ties.
pub fn best_time(stats: &[TimeSlotStat]) -> Option<&TimeSlotStat> {
    stats.iter().fold(None, |best: Option<&TimeSlotStat>, stat| match best {
        Some(current) if current.mean_ratio >= stat.mean_ratio => Some(current),
        _ => Some(stat),
    })
}

/// Slot with the most alerts, the lowest mean ratio breaking ties. `None` when nothing alerts.
pub fn critical_time(stats: &[TimeSlotStat]) -> Option<&TimeSlotStat> {
    stats
        .iter()
        .filter(|stat| stat.alert_count > 0)
        .fold(None, |worst: Option<&TimeSlotStat>, stat| match worst {
            Some(current)
                if current.alert_count > stat.alert_count
                    || (current.alert_count == stat.alert_count
                        && current.mean_ratio <= stat.mean_ratio) =>
            {
                Some(current)
            }
            _ => Some(stat),
        })
}

/// Hours and students per instructor, most hours first.
pub fn instructor_stats(sessions: &[Session]) -> Vec<InstructorStat> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut stats: Vec<InstructorStat> = Vec::new();

    for session in sessions {
        for name in &session.instructor_names {
            let position = *index.entry(name.as_str()).or_insert_with(|| {
                stats.push(InstructorStat {
                    name: name.clone(),
                    session_count: 0,
                    total_attendees: 0,
                });
                stats.len() - 1
            });
            stats[position].session_count += 1;
            stats[position].total_attendees += session.attendee_count;
        }
    }

    stats.sort_by(|a, b| b.session_count.cmp(&a.session_count));
    stats
}

/// Most hours taught, not most students.
pub fn top_instructor(stats: &[InstructorStat]) -> Option<&InstructorStat> {
    stats.iter().fold(None, |top: Option<&InstructorStat>, stat| match top {
        Some(current) if current.session_count >= stat.session_count => Some(current),
        _ => Some(stat),
    })
}

/// One entry per distinct date text, oldest first.
pub fn daily_stats(sessions: &[Session]) -> Vec<DailyStat> {
    let mut map: HashMap<&str, DailyStat> = HashMap::new();
    let mut ratio_sums: HashMap<&str, f64> = HashMap::new();

    for session in sessions {
        let entry = map
            .entry(session.session_date.as_str())
            .or_insert_with(|| DailyStat {
                session_date: session.session_date.clone(),
                date: session.date,
                session_count: 0,
                total_attendees: 0,
                mean_ratio: 0.0,
                alert_count: 0,
            });
        entry.session_count += 1;
        entry.total_attendees += session.attendee_count;
        if session.is_alert() {
            entry.alert_count += 1;
        }
        *ratio_sums.entry(session.session_date.as_str()).or_insert(0.0) +=
            session.occupancy_ratio;
    }

    let mut days: Vec<DailyStat> = map
        .into_iter()
        .map(|(key, mut day)| {
            let sum = ratio_sums.get(key).copied().unwrap_or(0.0);
            day.mean_ratio = mean(sum, day.session_count);
            day
        })
        .collect();

    days.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.session_date.cmp(&b.session_date))
    });
    days
}

/// Compares the most recent `recent_days` days against the overall mean.
///
/// Needs more days than the recent window; otherwise there is nothing older to compare with.
pub fn trend(
    daily: &[DailyStat],
    overall_mean: f64,
    recent_days: usize,
    tolerance: f64,
) -> Option<Trend> {
    if recent_days == 0 || daily.len() <= recent_days {
        return None;
    }

    let recent = &daily[daily.len() - recent_days..];
    let sessions: usize = recent.iter().map(|d| d.session_count).sum();
    let weighted: f64 = recent
        .iter()
        .map(|d| d.mean_ratio * d.session_count as f64)
        .sum();
    let recent_mean = mean(weighted, sessions);
    let delta = recent_mean - overall_mean;

    let direction = if delta > tolerance {
        TrendDirection::Improving
    } else if delta < -tolerance {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    Some(Trend {
        direction,
        recent_days,
        recent_mean,
        overall_mean,
    })
}

pub fn best_session(sessions: &[Session]) -> Option<&Session> {
    sessions.iter().fold(None, |best: Option<&Session>, s| match best {
        Some(current) if current.occupancy_ratio >= s.occupancy_ratio => Some(current),
        _ => Some(s),
    })
}

/// Lowest ratio; the last session seen wins ties.
pub fn worst_session(sessions: &[Session]) -> Option<&Session> {
    sessions.iter().fold(None, |worst: Option<&Session>, s| match worst {
        Some(current) if current.occupancy_ratio < s.occupancy_ratio => Some(current),
        _ => Some(s),
    })
}

/// Students against paid instructor hours for every day of `month`.
pub fn daily_evolution(sessions: &[Session], month: DateWindow) -> Vec<DayEvolution> {
    let tier = aggregate_tier(sessions);
    let mut totals: HashMap<NaiveDate, (usize, usize)> = HashMap::new();

    for session in sessions.iter().filter(|s| month.contains(s.date)) {
        let entry = totals.entry(session.date).or_insert((0, 0));
        entry.0 += session.attendee_count;
        entry.1 += session.instructor_count;
    }

    month
        .days()
        .map(|date| {
            let (total_students, paid_hours) = totals.get(&date).copied().unwrap_or((0, 0));
            let ratio = if paid_hours == 0 {
                0.0
            } else {
                total_students as f64 / paid_hours as f64
            };
            let classification = (paid_hours > 0).then(|| classify(ratio, tier));
            DayEvolution {
                date,
                total_students,
                paid_hours,
                ratio,
                status: classification.map(|c| c.status),
                color: classification.map(|c| c.color),
            }
        })
        .collect()
}
