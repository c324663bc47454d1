//! Shard identifiers and table naming
//!
//! The logical sales domain lives in five schemas: one global schema with
//! full records and four local schemas that each keep a slice of the columns.
//! A shard maps to exactly one table-name suffix for the process lifetime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DataAccessError;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shard {
    Global,
    Local1,
    Local2,
    Local3,
    Local4,
}

impl Shard {
    pub const ALL: [Shard; 5] = [
        Shard::Global,
        Shard::Local1,
        Shard::Local2,
        Shard::Local3,
        Shard::Local4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Shard::Global => "global",
            Shard::Local1 => "local1",
            Shard::Local2 => "local2",
            Shard::Local3 => "local3",
            Shard::Local4 => "local4",
        }
    }

    /// Suffix appended to every entity base name on this shard
    pub fn suffix(self) -> &'static str {
        match self {
            Shard::Global => "",
            Shard::Local1 => "_S1",
            Shard::Local2 => "_S2",
            Shard::Local3 => "_S3",
            Shard::Local4 => "_S4",
        }
    }

    pub fn is_global(self) -> bool {
        self == Shard::Global
    }

    /// Request selector: absent or blank means global, unknown falls back to global
    pub fn select(selector: Option<&str>) -> Shard {
        match selector.map(str::trim).filter(|s| !s.is_empty()) {
            None => Shard::Global,
            Some(name) => name.parse().unwrap_or_else(|e: DataAccessError| {
                warn!(selector = name, error = %e, "Unknown shard selector, using global");
                Shard::Global
            }),
        }
    }

    /// Quoted table identifier for `base` on this shard, e.g. `"Partners_S2"`
    pub fn table(self, base: &str) -> String {
        format!("\"{}{}\"", base, self.suffix())
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shard {
    type Err = DataAccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shard::ALL
            .into_iter()
            .find(|shard| shard.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DataAccessError::Configuration(format!("unknown shard '{}'", s)))
    }
}
