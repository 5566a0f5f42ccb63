//! Time axis vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MetaError;

/// Symbolic resolution of a file's time axis.
///
/// The string forms are the values stored in `time_sets.time_resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeResolution {
    #[serde(rename = "1-minute")]
    OneMinute,
    #[serde(rename = "2-minute")]
    TwoMinute,
    #[serde(rename = "5-minute")]
    FiveMinute,
    #[serde(rename = "15-minute")]
    FifteenMinute,
    #[serde(rename = "30-minute")]
    ThirtyMinute,
    #[serde(rename = "1-hourly")]
    OneHourly,
    #[serde(rename = "3-hourly")]
    ThreeHourly,
    #[serde(rename = "6-hourly")]
    SixHourly,
    #[serde(rename = "12-hourly")]
    TwelveHourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "seasonal")]
    Seasonal,
    #[serde(rename = "yearly")]
    Yearly,
    #[serde(rename = "other")]
    Other,
    #[serde(rename = "irregular")]
    Irregular,
}

impl TimeResolution {
    pub const ALL: [TimeResolution; 15] = [
        Self::OneMinute,
        Self::TwoMinute,
        Self::FiveMinute,
        Self::FifteenMinute,
        Self::ThirtyMinute,
        Self::OneHourly,
        Self::ThreeHourly,
        Self::SixHourly,
        Self::TwelveHourly,
        Self::Daily,
        Self::Monthly,
        Self::Seasonal,
        Self::Yearly,
        Self::Other,
        Self::Irregular,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1-minute",
            Self::TwoMinute => "2-minute",
            Self::FiveMinute => "5-minute",
            Self::FifteenMinute => "15-minute",
            Self::ThirtyMinute => "30-minute",
            Self::OneHourly => "1-hourly",
            Self::ThreeHourly => "3-hourly",
            Self::SixHourly => "6-hourly",
            Self::TwelveHourly => "12-hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Seasonal => "seasonal",
            Self::Yearly => "yearly",
            Self::Other => "other",
            Self::Irregular => "irregular",
        }
    }
}

impl fmt::Display for TimeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeResolution {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| MetaError::InvalidTimeResolution(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_str() {
        for resolution in TimeResolution::ALL {
            assert_eq!(resolution.as_str().parse::<TimeResolution>().unwrap(), resolution);
        }
    }

    #[test]
    fn test_unknown_resolution() {
        assert!(matches!(
            "fortnightly".parse::<TimeResolution>(),
            Err(MetaError::InvalidTimeResolution(_))
        ));
    }

    #[test]
    fn test_serde_uses_stored_names() {
        let json = serde_json::to_string(&TimeResolution::ThreeHourly).unwrap();
        assert_eq!(json, "\"3-hourly\"");
        let parsed: TimeResolution = serde_json::from_str("\"seasonal\"").unwrap();
        assert_eq!(parsed, TimeResolution::Seasonal);
    }
}
