//! Video type definitions.
//!
//! The video type selects which oracle set and which threshold constants
//! apply to an inspection run:
//!
//! - `Screen`: screen-recycling footage, sections are classified
//! - `Fog`: fog-test footage, sections are only located

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of footage being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoType {
    /// Screen handling footage (broken / residue classification).
    #[default]
    #[serde(alias = "tv")]
    Screen,

    /// Fog test footage (detection only).
    Fog,
}

impl VideoType {
    /// All available video types.
    pub const ALL: &'static [VideoType] = &[VideoType::Screen, VideoType::Fog];

    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoType::Screen => "screen",
            VideoType::Fog => "fog",
        }
    }

    /// Returns true if closed sections go through the classification oracles.
    pub fn classifies_sections(&self) -> bool {
        matches!(self, VideoType::Screen)
    }
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoType {
    type Err = VideoTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "screen" | "tv" => Ok(VideoType::Screen),
            "fog" => Ok(VideoType::Fog),
            _ => Err(VideoTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown video type: {0}")]
pub struct VideoTypeParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_type_parse() {
        assert_eq!("screen".parse::<VideoType>().unwrap(), VideoType::Screen);
        assert_eq!("TV".parse::<VideoType>().unwrap(), VideoType::Screen);
        assert_eq!("fog".parse::<VideoType>().unwrap(), VideoType::Fog);
        assert!("smoke".parse::<VideoType>().is_err());
    }

    #[test]
    fn test_video_type_serde_alias() {
        let parsed: VideoType = serde_json::from_str("\"tv\"").unwrap();
        assert_eq!(parsed, VideoType::Screen);
        assert_eq!(serde_json::to_string(&VideoType::Fog).unwrap(), "\"fog\"");
    }

    #[test]
    fn test_only_screen_classifies() {
        assert!(VideoType::Screen.classifies_sections());
        assert!(!VideoType::Fog.classifies_sections());
    }
}
