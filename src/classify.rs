use serde::{Serialize, Serializer};

use crate::models::{ClassTier, IndicatorColor, StatusLabel};

/// Minimum students per instructor for a VIP class to break even.
pub const VIP_PROFIT_THRESHOLD: f64 = 2.0;
/// Minimum students per instructor for a general class to break even.
pub const GENERAL_NORMAL_THRESHOLD: f64 = 3.0;
/// Ratio at which a general class is considered over capacity.
pub const GENERAL_FULL_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: StatusLabel,
    pub color: IndicatorColor,
}

/// Students per instructor, rounded to two decimals.
pub fn occupancy_ratio(attendees: usize, instructors: usize) -> f64 {
    if instructors == 0 {
        return 0.0;
    }
    round2(attendees as f64 / instructors as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serializes a mean at display precision.
pub fn serialize_round2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

pub fn classify(ratio: f64, tier: ClassTier) -> Classification {
    match tier {
        ClassTier::Vip if ratio < VIP_PROFIT_THRESHOLD => loss(),
        ClassTier::Vip => Classification {
            status: StatusLabel::Profitable,
            color: IndicatorColor::Green,
        },
        ClassTier::General if ratio < GENERAL_NORMAL_THRESHOLD => loss(),
        ClassTier::General if ratio < GENERAL_FULL_THRESHOLD => Classification {
            status: StatusLabel::Normal,
            color: IndicatorColor::Yellow,
        },
        ClassTier::General => Classification {
            status: StatusLabel::OverCapacity,
            color: IndicatorColor::Green,
        },
    }
}

/// A session is an alert when its ratio sits in the red band for its tier.
pub fn is_alert(ratio: f64, tier: ClassTier) -> bool {
    classify(ratio, tier).color == IndicatorColor::Red
}

fn loss() -> Classification {
    Classification {
        status: StatusLabel::Loss,
        color: IndicatorColor::Red,
    }
}
