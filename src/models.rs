use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// One row per student per class occurrence, as stored upstream.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub record_id: String,
    /// Day/month/year text.
    pub session_date: String,
    pub time_label: String,
    pub location: String,
    pub class_type: String,
    pub instructors: String,
    pub student_name: String,
    pub coordinator_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassTier {
    Vip,
    General,
}

impl ClassTier {
    pub fn of(class_type: &str) -> Self {
        if class_type.to_lowercase().contains("vip") {
            ClassTier::Vip
        } else {
            ClassTier::General
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLabel {
    #[serde(rename = "Prejuízo")]
    Loss,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Lucrativa")]
    Profitable,
    #[serde(rename = "Super Lotada")]
    OverCapacity,
}

impl StatusLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusLabel::Loss => "Prejuízo",
            StatusLabel::Normal => "Normal",
            StatusLabel::Profitable => "Lucrativa",
            StatusLabel::OverCapacity => "Super Lotada",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorColor {
    Red,
    Yellow,
    Green,
}

impl IndicatorColor {
    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorColor::Red => "red",
            IndicatorColor::Yellow => "yellow",
            IndicatorColor::Green => "green",
        }
    }
}

impl fmt::Display for IndicatorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grouped class occurrence with its occupancy indicators.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_date: String,
    pub date: NaiveDate,
    /// Canonical hour bucket, e.g. `05h`.
    pub time_slot: String,
    pub location: String,
    pub class_type: String,
    /// Instructor text exactly as it appeared on the first contributing row.
    pub instructors: String,
    pub instructor_names: Vec<String>,
    pub instructor_count: usize,
    pub attendee_count: usize,
    pub attendee_names: Vec<String>,
    pub coordinator_name: Option<String>,
    pub occupancy_ratio: f64,
    pub status: StatusLabel,
    pub color: IndicatorColor,
}

impl Session {
    pub fn tier(&self) -> ClassTier {
        ClassTier::of(&self.class_type)
    }

    pub fn is_alert(&self) -> bool {
        crate::classify::is_alert(self.occupancy_ratio, self.tier())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSlotStat {
    pub time_slot: String,
    pub session_count: usize,
    #[serde(serialize_with = "crate::classify::serialize_round2")]
    pub mean_ratio: f64,
    pub alert_count: usize,
    pub total_attendees: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorStat {
    pub name: String,
    /// Sessions taught, reported as paid hours.
    pub session_count: usize,
    pub total_attendees: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyStat {
    pub session_date: String,
    pub date: NaiveDate,
    pub session_count: usize,
    pub total_attendees: usize,
    #[serde(serialize_with = "crate::classify::serialize_round2")]
    pub mean_ratio: f64,
    pub alert_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayEvolution {
    pub date: NaiveDate,
    pub total_students: usize,
    pub paid_hours: usize,
    #[serde(serialize_with = "crate::classify::serialize_round2")]
    pub ratio: f64,
    pub status: Option<StatusLabel>,
    pub color: Option<IndicatorColor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub recent_days: usize,
    #[serde(serialize_with = "crate::classify::serialize_round2")]
    pub recent_mean: f64,
    #[serde(serialize_with = "crate::classify::serialize_round2")]
    pub overall_mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    pub total_presences: usize,
    pub unique_students: usize,
    pub session_count: usize,
    #[serde(serialize_with = "crate::classify::serialize_round2")]
    pub mean_ratio: f64,
    pub alert_count: usize,
    pub over_capacity_count: usize,
    pub status: Option<StatusLabel>,
    pub color: Option<IndicatorColor>,
}
