//! Analysis options.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the directive language the input targets
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum LanguageVersion {
    /// 3.1
    #[serde(rename = "3.1")]
    V31,
    /// 4.0
    #[serde(rename = "4.0")]
    V40,
    /// 4.5
    #[serde(rename = "4.5")]
    V45,
    /// 5.0, first version with `!=` loop conditions
    #[serde(rename = "5.0")]
    V50,
    /// 5.1
    #[default]
    #[serde(rename = "5.1")]
    V51,
    /// 5.2
    #[serde(rename = "5.2")]
    V52,
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LanguageVersion::V31 => "3.1",
            LanguageVersion::V40 => "4.0",
            LanguageVersion::V45 => "4.5",
            LanguageVersion::V50 => "5.0",
            LanguageVersion::V51 => "5.1",
            LanguageVersion::V52 => "5.2",
        };
        write!(f, "{}", s)
    }
}

/// Options controlling the analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Language version
    pub version: LanguageVersion,
    /// Accept `!=` loop conditions regardless of version
    pub permissive_not_equal: Option<bool>,
    /// Widest iteration-count type the backend supports (32 or 64)
    pub iteration_width: u16,
    /// Skip regions in uninstantiated generic contexts
    pub defer_dependent: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            version: LanguageVersion::default(),
            permissive_not_equal: None,
            iteration_width: 64,
            defer_dependent: true,
        }
    }
}

impl AnalysisOptions {
    /// Options for a given version, everything else default
    pub fn for_version(version: LanguageVersion) -> Self {
        AnalysisOptions {
            version,
            ..AnalysisOptions::default()
        }
    }

    /// Loads options from JSON; missing fields take their defaults
    pub fn from_json(source: &str) -> Result<Self> {
        let options: AnalysisOptions = serde_json::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks option consistency
    pub fn validate(&self) -> Result<()> {
        if self.iteration_width != 32 && self.iteration_width != 64 {
            return Err(Error::invalid_options(format!(
                "iteration_width must be 32 or 64, got {}",
                self.iteration_width
            )));
        }
        Ok(())
    }

    /// `!=` loop conditions are canonical
    pub fn allows_not_equal(&self) -> bool {
        self.permissive_not_equal
            .unwrap_or(self.version >= LanguageVersion::V50)
    }

    /// Const variables without mutable members are predetermined shared
    pub fn legacy_const_sharing(&self) -> bool {
        self.version <= LanguageVersion::V31
    }
}
