//! Climate model classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MetaError;

/// Kind of model that produced a file, stored in `models.type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// Global climate model
    #[default]
    #[serde(rename = "GCM")]
    Gcm,
    /// Regional climate model
    #[serde(rename = "RCM")]
    Rcm,
    /// Hydrologic model driven by climate model output
    #[serde(rename = "hydrologic")]
    Hydrologic,
    #[serde(rename = "other")]
    Other,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gcm => "GCM",
            Self::Rcm => "RCM",
            Self::Hydrologic => "hydrologic",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcm" => Ok(Self::Gcm),
            "rcm" => Ok(Self::Rcm),
            "hydrologic" => Ok(Self::Hydrologic),
            "other" => Ok(Self::Other),
            _ => Err(MetaError::InvalidModelType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("gcm".parse::<ModelType>().unwrap(), ModelType::Gcm);
        assert_eq!("RCM".parse::<ModelType>().unwrap(), ModelType::Rcm);
        assert!("ocean".parse::<ModelType>().is_err());
    }
}
