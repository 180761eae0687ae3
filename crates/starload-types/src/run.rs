//! Run tracking model types.
//!
//! Identifies the three source flows and carries per-run accounting:
//! stage counts, terminal status, and the persisted audit row shape.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source identity
// ---------------------------------------------------------------------------

/// One of the three operational stores feeding the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceName {
    Orders,
    Customers,
    Reviews,
}

impl SourceName {
    /// Wire-format string for storage and logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Customers => "customers",
            Self::Reviews => "reviews",
        }
    }

    /// All sources, in dimension-before-fact load order.
    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::Customers, Self::Reviews, Self::Orders]
    }
}

impl std::fmt::Display for SourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orders" => Ok(Self::Orders),
            "customers" => Ok(Self::Customers),
            "reviews" => Ok(Self::Reviews),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction mode
// ---------------------------------------------------------------------------

/// How much of a source to pull in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Every record in the source.
    Full,
    /// Only records modified after the persisted watermark.
    Incremental,
}

impl ExtractMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            other => Err(format!("unknown extract mode '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Terminal status of one source flow, and of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    /// Storage string, matching the audit table convention.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }

    /// Severity rank for aggregation. Higher is worse.
    fn severity(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failed => 2,
        }
    }

    /// The worse of two statuses. Aggregate run status is the fold of
    /// this over the per-source finals.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "PARTIAL" => Ok(Self::Partial),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage counts
// ---------------------------------------------------------------------------

/// Per-stage record counts for one run. Accumulates additively across
/// chunks within a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub extracted: u64,
    pub transformed: u64,
    pub loaded: u64,
    pub rejected: u64,
}

impl StageCounts {
    /// Add another batch's counts into this run's totals.
    pub fn absorb(&mut self, other: StageCounts) {
        self.extracted += other.extracted;
        self.transformed += other.transformed;
        self.loaded += other.loaded;
        self.rejected += other.rejected;
    }
}

/// One persisted audit row from the `etl_runs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub source: String,
    pub mode: String,
    pub status: String,
    pub counts: StageCounts,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn source_name_roundtrip() {
        for src in SourceName::all() {
            assert_eq!(SourceName::from_str(src.as_str()).unwrap(), src);
        }
        assert!(SourceName::from_str("payments").is_err());
    }

    #[test]
    fn dimension_sources_precede_orders() {
        let all = SourceName::all();
        assert_eq!(all[2], SourceName::Orders);
    }

    #[test]
    fn extract_mode_roundtrip() {
        assert_eq!(ExtractMode::from_str("full").unwrap(), ExtractMode::Full);
        assert_eq!(
            ExtractMode::from_str("incremental").unwrap(),
            ExtractMode::Incremental
        );
        assert!(ExtractMode::from_str("delta").is_err());
    }

    #[test]
    fn worst_status_is_a_pure_reduction() {
        use RunStatus::{Failed, Partial, Success};
        assert_eq!(Success.worst(Success), Success);
        assert_eq!(Success.worst(Partial), Partial);
        assert_eq!(Partial.worst(Success), Partial);
        assert_eq!(Partial.worst(Failed), Failed);
        assert_eq!(Failed.worst(Success), Failed);

        let finals = [Success, Partial, Success];
        let agg = finals.into_iter().fold(Success, RunStatus::worst);
        assert_eq!(agg, Partial);
    }

    #[test]
    fn status_storage_strings() {
        assert_eq!(RunStatus::Success.as_str(), "SUCCESS");
        assert_eq!(RunStatus::Partial.as_str(), "PARTIAL");
        assert_eq!(RunStatus::Failed.as_str(), "FAILED");
        assert_eq!(RunStatus::from_str("PARTIAL").unwrap(), RunStatus::Partial);
    }

    #[test]
    fn stage_counts_absorb_is_additive() {
        let mut total = StageCounts::default();
        total.absorb(StageCounts {
            extracted: 10,
            transformed: 8,
            loaded: 8,
            rejected: 2,
        });
        total.absorb(StageCounts {
            extracted: 5,
            transformed: 5,
            loaded: 5,
            rejected: 0,
        });
        assert_eq!(total.extracted, 15);
        assert_eq!(total.transformed, 13);
        assert_eq!(total.loaded, 13);
        assert_eq!(total.rejected, 2);
    }
}
