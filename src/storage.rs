use crate::domain::{AddressRecord, FailReason, GeocodeOutcome, GeocodeStatus};
use crate::error::{GeocodeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Which records a batch run should load.
#[derive(Debug, Clone, Default)]
pub struct ReportSelection {
    /// Explicit id filter; overrides everything else when present.
    pub ids: Option<Vec<i64>>,
    /// With force, previously resolved records are selected too.
    pub include_resolved: bool,
}

/// Store-wide progress counters for the status report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub total: usize,
    pub resolved: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Persistence collaborator contract. The engine reads raw address text and
/// prior geocode state, and writes back only the geocoding columns
/// (latitude, longitude, geocode_confidence, geocode_method, geocoded_at,
/// is_geocoded); everything else about a report belongs to its owner.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn fetch_reports(&self, selection: &ReportSelection) -> Result<Vec<AddressRecord>>;

    async fn write_success(&self, id: i64, outcome: &GeocodeOutcome) -> Result<()>;

    async fn write_failure(&self, id: i64, reason: FailReason, at: DateTime<Utc>) -> Result<()>;

    async fn counts(&self) -> Result<StoreCounts>;
}

/// One report row as held by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub record: AddressRecord,
    pub confidence: Option<String>,
    pub method: Option<String>,
    pub geocoded_at: Option<DateTime<Utc>>,
    pub fail_reason: Option<FailReason>,
}

/// In-memory store implementation for development and testing.
#[derive(Default)]
pub struct InMemoryStore {
    reports: Mutex<HashMap<i64, StoredReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a report with raw address text and no prior resolution.
    pub fn insert_address(&self, id: i64, address: &str) {
        let mut reports = self.reports.lock().unwrap();
        reports.insert(
            id,
            StoredReport {
                record: AddressRecord {
                    id,
                    address: address.to_string(),
                    latitude: None,
                    longitude: None,
                    status: GeocodeStatus::Unresolved,
                },
                confidence: None,
                method: None,
                geocoded_at: None,
                fail_reason: None,
            },
        );
    }

    /// Seed an already-resolved report, for skip/force tests.
    pub fn insert_resolved(&self, id: i64, address: &str, latitude: f64, longitude: f64) {
        self.insert_address(id, address);
        let mut reports = self.reports.lock().unwrap();
        let report = reports.get_mut(&id).unwrap();
        report.record.latitude = Some(latitude);
        report.record.longitude = Some(longitude);
        report.record.status = GeocodeStatus::Resolved;
        report.confidence = Some("MEDIUM".to_string());
    }

    pub fn snapshot(&self, id: i64) -> Option<StoredReport> {
        self.reports.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn fetch_reports(&self, selection: &ReportSelection) -> Result<Vec<AddressRecord>> {
        let reports = self.reports.lock().unwrap();
        let mut records: Vec<AddressRecord> = match &selection.ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| reports.get(id).map(|r| r.record.clone()))
                .collect(),
            None => reports
                .values()
                .filter(|r| selection.include_resolved || !r.record.is_resolved())
                .map(|r| r.record.clone())
                .collect(),
        };
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn write_success(&self, id: i64, outcome: &GeocodeOutcome) -> Result<()> {
        let mut reports = self.reports.lock().unwrap();
        let report = reports.get_mut(&id).ok_or_else(|| GeocodeError::Database {
            message: format!("Unknown report id {id}"),
        })?;
        report.record.latitude = Some(outcome.latitude);
        report.record.longitude = Some(outcome.longitude);
        report.record.status = GeocodeStatus::Resolved;
        report.confidence = Some(outcome.confidence.as_str().to_string());
        report.method = Some(outcome.method.clone());
        report.geocoded_at = Some(outcome.geocoded_at);
        report.fail_reason = None;
        debug!("Stored outcome for report {}", id);
        Ok(())
    }

    async fn write_failure(&self, id: i64, reason: FailReason, at: DateTime<Utc>) -> Result<()> {
        let mut reports = self.reports.lock().unwrap();
        let report = reports.get_mut(&id).ok_or_else(|| GeocodeError::Database {
            message: format!("Unknown report id {id}"),
        })?;
        report.record.latitude = None;
        report.record.longitude = None;
        report.record.status = GeocodeStatus::Failed;
        report.confidence = None;
        report.geocoded_at = Some(at);
        report.fail_reason = Some(reason);
        debug!("Stored failure '{}' for report {}", reason.as_str(), id);
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let reports = self.reports.lock().unwrap();
        let mut counts = StoreCounts {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports.values() {
            if report.record.is_resolved() {
                counts.resolved += 1;
            } else if report.record.status == GeocodeStatus::Failed {
                counts.failed += 1;
            } else {
                counts.pending += 1;
            }
        }
        Ok(counts)
    }
}

/// SQLite-backed store over the flood_reports table. The table itself is
/// owned by the reporting application; this store only guarantees the
/// geocoding columns exist, adding them when absent.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Geocoding columns added to flood_reports when missing. SQLite has no
/// ADD COLUMN IF NOT EXISTS, so duplicate-column errors are tolerated.
const GEOCODE_COLUMNS: &[(&str, &str)] = &[
    ("latitude", "REAL"),
    ("longitude", "REAL"),
    ("geocode_confidence", "TEXT"),
    ("geocode_method", "TEXT"),
    ("geocoded_at", "TEXT"),
    ("is_geocoded", "INTEGER"),
];

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS flood_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL DEFAULT '',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(db_err)?;

        for (name, kind) in GEOCODE_COLUMNS {
            let sql = format!("ALTER TABLE flood_reports ADD COLUMN {name} {kind}");
            match conn.execute(&sql, []) {
                Ok(_) => info!("Added column {} to flood_reports", name),
                Err(e) if e.to_string().contains("duplicate column") => {}
                Err(e) => return Err(db_err(e)),
            }
        }
        Ok(())
    }

    /// Insert a raw report row; used by tests and fixtures.
    pub fn insert_address(&self, address: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO flood_reports (address) VALUES (?1)",
            params![address],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AddressRecord> {
        let flag: Option<i64> = row.get(4)?;
        Ok(AddressRecord {
            id: row.get(0)?,
            address: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            status: GeocodeStatus::from_flag(flag),
        })
    }
}

const SELECT_COLUMNS: &str = "id, address, latitude, longitude, is_geocoded";

#[async_trait]
impl ReportStore for SqliteStore {
    async fn fetch_reports(&self, selection: &ReportSelection) -> Result<Vec<AddressRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut records = Vec::new();
        match &selection.ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders = vec!["?"; ids.len()].join(",");
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM flood_reports WHERE id IN ({placeholders}) ORDER BY id"
                );
                let mut stmt = conn.prepare(&sql).map_err(db_err)?;
                let rows = stmt
                    .query_map(params_from_iter(ids.iter()), Self::row_to_record)
                    .map_err(db_err)?;
                for row in rows {
                    records.push(row.map_err(db_err)?);
                }
            }
            Some(_) => {}
            None => {
                let sql = if selection.include_resolved {
                    format!("SELECT {SELECT_COLUMNS} FROM flood_reports ORDER BY id")
                } else {
                    format!(
                        "SELECT {SELECT_COLUMNS} FROM flood_reports \
                         WHERE latitude IS NULL OR longitude IS NULL ORDER BY id"
                    )
                };
                let mut stmt = conn.prepare(&sql).map_err(db_err)?;
                let rows = stmt.query_map([], Self::row_to_record).map_err(db_err)?;
                for row in rows {
                    records.push(row.map_err(db_err)?);
                }
            }
        }
        Ok(records)
    }

    async fn write_success(&self, id: i64, outcome: &GeocodeOutcome) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE flood_reports
                 SET latitude = ?1, longitude = ?2, geocode_confidence = ?3,
                     geocode_method = ?4, geocoded_at = ?5, is_geocoded = 1
                 WHERE id = ?6",
                params![
                    outcome.latitude,
                    outcome.longitude,
                    outcome.confidence.as_str(),
                    outcome.method,
                    outcome.geocoded_at.to_rfc3339(),
                    id
                ],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(GeocodeError::Database {
                message: format!("Unknown report id {id}"),
            });
        }
        Ok(())
    }

    async fn write_failure(&self, id: i64, _reason: FailReason, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE flood_reports
                 SET latitude = NULL, longitude = NULL, geocode_confidence = NULL,
                     geocode_method = ?1, geocoded_at = ?2, is_geocoded = -1
                 WHERE id = ?3",
                params![crate::constants::METHOD_PROVIDER, at.to_rfc3339(), id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(GeocodeError::Database {
                message: format!("Unknown report id {id}"),
            });
        }
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let conn = self.conn.lock().unwrap();
        let count = |sql: &str| -> Result<usize> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(db_err)
        };

        Ok(StoreCounts {
            total: count("SELECT COUNT(*) FROM flood_reports")?,
            resolved: count(
                "SELECT COUNT(*) FROM flood_reports \
                 WHERE is_geocoded = 1 AND latitude IS NOT NULL AND longitude IS NOT NULL",
            )?,
            pending: count(
                "SELECT COUNT(*) FROM flood_reports \
                 WHERE (latitude IS NULL OR longitude IS NULL) \
                   AND (is_geocoded IS NULL OR is_geocoded = 0)",
            )?,
            failed: count("SELECT COUNT(*) FROM flood_reports WHERE is_geocoded = -1")?,
        })
    }
}

fn db_err(e: rusqlite::Error) -> GeocodeError {
    GeocodeError::Database {
        message: e.to_string(),
    }
}
