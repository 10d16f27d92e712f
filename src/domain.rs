use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Wire format of the punch time field, e.g. `2023-08-20 15:39:11`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One punch event as delivered by a ROC endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Punch {
    pub id: i64,
    pub code: i64,
    pub si: i64,
    pub timestamp: NaiveDateTime,
}

impl Punch {
    pub fn is_valid(&self) -> bool {
        self.id != 0 && self.si > 0
    }
}

impl fmt::Display for Punch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {:>3} | {:>7} | {}",
            self.id,
            self.code,
            self.si,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiPreset {
    Oresults,
    Olresultat,
}

impl ApiPreset {
    pub const ALL: [ApiPreset; 2] = [ApiPreset::Oresults, ApiPreset::Olresultat];

    pub fn label(self) -> &'static str {
        match self {
            ApiPreset::Oresults => "OResults.eu",
            ApiPreset::Olresultat => "OLResultat.se",
        }
    }

    pub fn url(self) -> &'static str {
        match self {
            ApiPreset::Oresults => "https://api.oresults.eu/roc",
            ApiPreset::Olresultat => "https://roc.olresultat.se/getpunches.asp",
        }
    }
}

impl fmt::Display for ApiPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiPreset::Oresults => write!(f, "oresults"),
            ApiPreset::Olresultat => write!(f, "olresultat"),
        }
    }
}
