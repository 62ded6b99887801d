//! Measurement horizons and holding periods

use serde::{Deserialize, Serialize};

/// Fixed horizons at which resolution-shock P&L is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::FiveMinutes,
        Timeframe::OneHour,
        Timeframe::OneDay,
        Timeframe::OneWeek,
    ];

    /// Seconds between the signal and this horizon's exit target.
    pub fn offset_secs(&self) -> i64 {
        match self {
            Timeframe::FiveMinutes => 5 * 60,
            Timeframe::OneHour => 60 * 60,
            Timeframe::OneDay => 24 * 60 * 60,
            Timeframe::OneWeek => 7 * 24 * 60 * 60,
        }
    }

    /// How far from the target a price point may be and still count.
    /// Tight for short horizons, loose for long ones.
    pub fn tolerance_secs(&self) -> i64 {
        match self {
            Timeframe::FiveMinutes => 3 * 60,
            Timeframe::OneHour => 15 * 60,
            Timeframe::OneDay => 2 * 60 * 60,
            Timeframe::OneWeek => 6 * 60 * 60,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "5m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
        }
    }

    pub fn parse(s: &str) -> Option<Timeframe> {
        match s {
            "5m" => Some(Timeframe::FiveMinutes),
            "1h" => Some(Timeframe::OneHour),
            "1d" => Some(Timeframe::OneDay),
            "1w" => Some(Timeframe::OneWeek),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How long a threshold-mode position is held after the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPeriod {
    /// Exit at signal time plus the given horizon
    Fixed(Timeframe),
    /// Exit at the last available history point
    ToResolution,
}

impl HoldPeriod {
    pub fn parse(s: &str) -> Option<HoldPeriod> {
        if s.eq_ignore_ascii_case("resolution") {
            return Some(HoldPeriod::ToResolution);
        }
        Timeframe::parse(s).map(HoldPeriod::Fixed)
    }

    pub fn label(&self) -> String {
        match self {
            HoldPeriod::Fixed(tf) => tf.as_str().to_string(),
            HoldPeriod::ToResolution => "resolution".to_string(),
        }
    }
}
