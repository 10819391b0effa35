use std::fmt::Write;

use crate::aggregate::{alert_sessions, slots_by_label, DashboardSnapshot};
use crate::models::{DayEvolution, Session};
use crate::narrative::Narrative;

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped to the available pages.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));
    let start = (page - 1) * page_size;

    Page {
        items: items.iter().skip(start).take(page_size).cloned().collect(),
        page,
        total_pages,
        total_items: items.len(),
    }
}

/// Most recent first; within a day, earliest slot first.
pub fn history(sessions: &[Session]) -> Vec<&Session> {
    let mut ordered: Vec<&Session> = sessions.iter().collect();
    ordered.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.time_slot.cmp(&b.time_slot))
    });
    ordered
}

pub fn alert_history(sessions: &[Session]) -> Vec<&Session> {
    let mut alerts = alert_sessions(sessions);
    alerts.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.time_slot.cmp(&b.time_slot))
    });
    alerts
}

/// Matches instructors or class type ignoring case, or the time slot as typed.
pub fn search_sessions<'a>(sessions: &[&'a Session], term: &str) -> Vec<&'a Session> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return sessions.to_vec();
    }

    sessions
        .iter()
        .copied()
        .filter(|session| {
            session.instructors.to_lowercase().contains(&needle)
                || session.class_type.to_lowercase().contains(&needle)
                || session.time_slot.contains(term.trim())
        })
        .collect()
}

pub fn session_line(session: &Session) -> String {
    format!(
        "{} {} {} ({}) | {} | {} students / {} instructors = {:.2} | {} [{}]",
        session.session_date,
        session.time_slot,
        session.class_type,
        session.location,
        session.instructors,
        session.attendee_count,
        session.instructor_count,
        session.occupancy_ratio,
        session.status,
        session.color
    )
}

pub fn session_detail(session: &Session) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", session_line(session));
    let _ = writeln!(
        output,
        "  Coordinator: {}",
        session.coordinator_name.as_deref().unwrap_or("not informed")
    );
    if session.attendee_names.is_empty() {
        let _ = writeln!(output, "  No students recorded for this session.");
    } else {
        for name in &session.attendee_names {
            let _ = writeln!(output, "  - {name}");
        }
    }
    output
}

pub fn evolution_line(day: &DayEvolution) -> String {
    match (day.status, day.color) {
        (Some(status), Some(color)) => format!(
            "{} | {} students / {} paid hours = {:.2} | {} [{}]",
            day.date.format("%d/%m"),
            day.total_students,
            day.paid_hours,
            day.ratio,
            status,
            color
        ),
        _ => format!("{} | no classes", day.date.format("%d/%m")),
    }
}

pub fn build_report(
    scope: &str,
    snapshot: &DashboardSnapshot,
    sessions: &[Session],
    narrative: &Narrative,
    ranking_size: usize,
) -> String {
    let mut output = String::new();
    let kpis = &snapshot.kpis;

    let _ = writeln!(output, "# Arena Attendance Report");
    let _ = writeln!(output, "Generated for {scope}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Scoreboard");
    let _ = writeln!(output, "- Presences: {}", kpis.total_presences);
    let _ = writeln!(output, "- Unique students: {}", kpis.unique_students);
    let _ = writeln!(output, "- Sessions: {}", kpis.session_count);
    match (kpis.status, kpis.color) {
        (Some(status), Some(color)) => {
            let _ = writeln!(
                output,
                "- Students per instructor: {:.2} ({} [{}])",
                kpis.mean_ratio, status, color
            );
        }
        _ => {
            let _ = writeln!(output, "- Students per instructor: no data");
        }
    }
    let _ = writeln!(output, "- Sessions in alert: {}", kpis.alert_count);
    let _ = writeln!(output, "- Over-capacity sessions: {}", kpis.over_capacity_count);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sessions in Alert");
    let alerts = alert_history(sessions);
    if alerts.is_empty() {
        let _ = writeln!(output, "No session needs attention in this window.");
    } else {
        for session in alerts {
            let _ = writeln!(output, "- {}", session_line(session));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance by Time Slot");
    if snapshot.time_slots.is_empty() {
        let _ = writeln!(output, "No sessions recorded for this window.");
    } else {
        for slot in &slots_by_label(&snapshot.time_slots) {
            let _ = writeln!(
                output,
                "- {}: {:.2} students/instructor across {} sessions ({} alerts, {} presences)",
                slot.time_slot,
                slot.mean_ratio,
                slot.session_count,
                slot.alert_count,
                slot.total_attendees
            );
        }
        if let Some(best) = &snapshot.best_time {
            let _ = writeln!(output, "- Best slot: {}", best.time_slot);
        }
        if let Some(critical) = &snapshot.critical_time {
            let _ = writeln!(output, "- Critical slot: {}", critical.time_slot);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Instructor Hours");
    if snapshot.instructors.is_empty() {
        let _ = writeln!(output, "No instructors in this window.");
    } else {
        for (position, instructor) in snapshot.instructors.iter().take(ranking_size).enumerate() {
            let _ = writeln!(
                output,
                "{}. {} - {} hours, {} presences",
                position + 1,
                instructor.name,
                instructor.session_count,
                instructor.total_attendees
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Trend");
    if snapshot.daily.is_empty() {
        let _ = writeln!(output, "No sessions recorded for this window.");
    } else {
        for day in &snapshot.daily {
            let _ = writeln!(
                output,
                "- {}: {} sessions, {:.2} students/instructor, {} alerts",
                day.session_date, day.session_count, day.mean_ratio, day.alert_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Diagnosis");
    let _ = writeln!(output, "{narrative}");

    output
}
