use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::constants::METHOD_PROVIDER;

/// Prior resolution state of an address record, mapped from the store's
/// `is_geocoded` column (NULL or 0 = unresolved, 1 = resolved, -1 = failed).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeocodeStatus {
    Unresolved,
    Resolved,
    Failed,
}

impl GeocodeStatus {
    pub fn from_flag(flag: Option<i64>) -> Self {
        match flag {
            Some(1) => GeocodeStatus::Resolved,
            Some(-1) => GeocodeStatus::Failed,
            _ => GeocodeStatus::Unresolved,
        }
    }

    pub fn to_flag(self) -> i64 {
        match self {
            GeocodeStatus::Unresolved => 0,
            GeocodeStatus::Resolved => 1,
            GeocodeStatus::Failed => -1,
        }
    }
}

/// A citizen-submitted report address as read from the store. The engine
/// reads the raw text and prior geocode state, and writes back only the
/// geocoding columns; the record's lifecycle belongs to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: i64,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: GeocodeStatus,
}

impl AddressRecord {
    /// A record counts as already resolved only when it has both a success
    /// flag and a stored coordinate pair.
    pub fn is_resolved(&self) -> bool {
        self.status == GeocodeStatus::Resolved
            && self.latitude.is_some()
            && self.longitude.is_some()
    }
}

/// One geocoding result returned by the provider for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoCandidate {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    /// Provider-assigned importance in [0, 1]; a general notability signal.
    pub importance: f64,
    pub class: Option<String>,
    pub place_type: Option<String>,
    /// Address-component labels to values, e.g. "village" -> "Ampel".
    pub address: BTreeMap<String, String>,
}

/// Labels for the individual scoring contributions, kept per candidate so an
/// operator can audit why a candidate won.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScoreComponent {
    Country,
    TokenMatch,
    MultiToken,
    Specificity,
    ExactMatch,
    Importance,
}

/// A single weighted contribution to a candidate's score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreContribution {
    pub component: ScoreComponent,
    pub points: f64,
}

/// A GeoCandidate plus its computed disambiguation score and the
/// contributions that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: GeoCandidate,
    pub score: f64,
    pub contributions: Vec<ScoreContribution>,
    /// Specificity bonus retained separately as the first tie-break key.
    pub specificity: f64,
    /// Position in the provider's original ranking, the final tie-break key.
    pub provider_rank: usize,
}

/// Confidence tier for a resolved coordinate, derived from how
/// administratively precise the winning candidate is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Confidence::High),
            "MEDIUM" => Some(Confidence::Medium),
            "LOW" => Some(Confidence::Low),
            _ => None,
        }
    }
}

/// Reason codes for records that could not be resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailReason {
    Network,
    NoMatch,
    OutOfBounds,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::Network => "network",
            FailReason::NoMatch => "no match",
            FailReason::OutOfBounds => "out of bounds",
        }
    }
}

/// The terminal artifact of a successful resolution, written back onto the
/// owning address record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeOutcome {
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: Confidence,
    pub method: String,
    pub geocoded_at: DateTime<Utc>,
}

impl GeocodeOutcome {
    pub fn from_provider(latitude: f64, longitude: f64, confidence: Confidence) -> Self {
        Self {
            latitude,
            longitude,
            confidence,
            method: METHOD_PROVIDER.to_string(),
            geocoded_at: Utc::now(),
        }
    }
}

/// Terminal state of one record within a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordOutcome {
    Success { confidence: Confidence },
    Failed { reason: FailReason },
    Skipped,
}

/// Aggregate counters for a batch run, reported to the operator at the end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Option<Uuid>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub already_resolved: usize,
    pub low_confidence: usize,
    /// Failed record ids with their reason codes, for operator remediation.
    pub failures: Vec<(i64, FailReason)>,
}

impl BatchSummary {
    pub fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id: Some(run_id),
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, id: i64, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Success { confidence } => {
                self.success += 1;
                if *confidence == Confidence::Low {
                    self.low_confidence += 1;
                }
            }
            RecordOutcome::Failed { reason } => {
                self.failed += 1;
                self.failures.push((id, *reason));
            }
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Success rate over records actually attempted (skips excluded).
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.total.saturating_sub(self.skipped);
        if attempted == 0 {
            return None;
        }
        Some(self.success as f64 / attempted as f64 * 100.0)
    }
}
