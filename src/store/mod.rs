//! SQLite-backed schema store with typed phase handles.
//!
//! The store moves through three handle types:
//!
//! - [`SchemaStore`]: an opened database with no content guarantees.
//! - [`IngestedStore`]: normalized and wide tables have been rebuilt.
//! - [`DerivedStore`]: the relative frequency table has been rebuilt too.
//!
//! Only a [`DerivedStore`] exposes the frequency table, and aggregation and
//! comparison accept nothing else, so queries cannot run against a store
//! that is missing a stage.

mod writer;

pub use writer::{Resolved, StoreWriter};

use crate::data::{
    CellCounts, FrequencyRow, FrequencyTable, Population, Project, Response, Sample, Subject,
    Treatment, WideRow,
};
use crate::error::{ProfileError, Result};
use crate::ingest::IngestSummary;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Tables written by ingestion.
pub const NORMALIZED_TABLES: [&str; 6] = [
    "projects",
    "subjects",
    "treatments",
    "samples",
    "cell_counts",
    "sample_wide",
];

/// Table written by frequency derivation.
pub const FREQUENCY_TABLE: &str = "cell_population_frequencies";

/// An opened store.
#[derive(Debug)]
pub struct SchemaStore {
    conn: Connection,
}

impl SchemaStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened schema store");
        Self::configure(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Begin a full rebuild: every table is dropped and recreated inside a
    /// transaction owned by the returned writer.
    pub fn rebuild(&mut self) -> Result<StoreWriter<'_>> {
        StoreWriter::begin(self.conn.transaction()?)
    }

    /// Check whether a table exists.
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Number of rows in one of the store's tables.
    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        if !NORMALIZED_TABLES.contains(&table_name) && table_name != FREQUENCY_TABLE {
            return Err(ProfileError::InvalidParameter(format!(
                "Unknown table '{}'",
                table_name
            )));
        }
        if !self.table_exists(table_name)? {
            return Err(ProfileError::StatePrecondition(format!(
                "table '{}' has not been created",
                table_name
            )));
        }
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table_name),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn require_tables(&self, tables: &[&str]) -> Result<()> {
        for table in tables {
            if !self.table_exists(table)? {
                return Err(ProfileError::StatePrecondition(format!(
                    "table '{}' is missing; run ingestion and derivation first",
                    table
                )));
            }
        }
        Ok(())
    }

    fn projects(&self) -> Result<Vec<Project>> {
        let mut statement = self
            .conn
            .prepare("SELECT id, name FROM projects ORDER BY id")?;
        let rows = statement.query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn subjects(&self) -> Result<Vec<Subject>> {
        let mut statement = self.conn.prepare(
            "
            SELECT id, project_id, subject_code, condition, age, sex
            FROM subjects
            ORDER BY id
            ",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(Subject {
                id: row.get(0)?,
                project_id: row.get(1)?,
                subject_code: row.get(2)?,
                condition: row.get(3)?,
                age: row.get(4)?,
                sex: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn treatments(&self) -> Result<Vec<Treatment>> {
        let mut statement = self
            .conn
            .prepare("SELECT id, name FROM treatments ORDER BY id")?;
        let rows = statement.query_map([], |row| {
            Ok(Treatment {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn samples(&self) -> Result<Vec<Sample>> {
        let mut statement = self.conn.prepare(
            "
            SELECT s.id, s.subject_id, s.treatment_id, s.response, s.sample_code,
                   s.sample_type, s.time_from_treatment_start,
                   c.b_cell, c.cd8_t_cell, c.cd4_t_cell, c.nk_cell, c.monocyte
            FROM samples s
            LEFT JOIN cell_counts c ON c.sample_id = s.id
            ORDER BY s.id
            ",
        )?;
        let rows = statement.query_map([], |row| {
            let response: Option<String> = row.get(3)?;
            Ok(Sample {
                id: row.get(0)?,
                subject_id: row.get(1)?,
                treatment_id: row.get(2)?,
                response: Response::from_label(response.as_deref()),
                sample_code: row.get(4)?,
                sample_type: row.get(5)?,
                time_from_treatment_start: row.get(6)?,
                counts: CellCounts::new([
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                ]),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn wide_rows(&self) -> Result<Vec<WideRow>> {
        let mut statement = self.conn.prepare(
            "
            SELECT sample_id, subject_id, project, subject, condition, age, sex,
                   treatment, response, sample, sample_type, time_from_treatment_start,
                   b_cell, cd8_t_cell, cd4_t_cell, nk_cell, monocyte
            FROM sample_wide
            ORDER BY sample_id
            ",
        )?;
        let rows = statement.query_map([], |row| {
            let response: Option<String> = row.get(8)?;
            Ok(WideRow {
                sample_id: row.get(0)?,
                subject_id: row.get(1)?,
                project: row.get(2)?,
                subject: row.get(3)?,
                condition: row.get(4)?,
                age: row.get(5)?,
                sex: row.get(6)?,
                treatment: row.get(7)?,
                response: Response::from_label(response.as_deref()),
                sample: row.get(9)?,
                sample_type: row.get(10)?,
                time_from_treatment_start: row.get(11)?,
                counts: CellCounts::new([
                    row.get(12)?,
                    row.get(13)?,
                    row.get(14)?,
                    row.get(15)?,
                    row.get(16)?,
                ]),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn replace_frequencies(&mut self, rows: &[FrequencyRow]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(include_str!("sql/frequencies.sql"))?;
        {
            let mut statement = tx.prepare(
                "
                INSERT INTO cell_population_frequencies (
                    sample_id, sample, total_count, population, count, percentage
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;
            for r in rows {
                statement.execute(params![
                    r.sample_id,
                    r.sample,
                    r.total,
                    r.population.name(),
                    r.count,
                    r.percentage,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn frequencies(&self) -> Result<FrequencyTable> {
        let mut statement = self.conn.prepare(
            "
            SELECT sample_id, sample, total_count, population, count, percentage
            FROM cell_population_frequencies
            ORDER BY id
            ",
        )?;
        let raw = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
            ))
        })?;

        let mut rows = Vec::new();
        for entry in raw {
            let (sample_id, sample, total, population, count, percentage) = entry?;
            rows.push(FrequencyRow {
                sample_id,
                sample,
                population: population.parse::<Population>()?,
                count,
                total,
                percentage,
            });
        }
        Ok(FrequencyTable::new(rows))
    }
}

/// A store whose normalized and wide tables reflect one complete ingestion.
#[derive(Debug)]
pub struct IngestedStore {
    store: SchemaStore,
    summary: IngestSummary,
}

impl IngestedStore {
    pub(crate) fn new(store: SchemaStore, summary: IngestSummary) -> Self {
        Self { store, summary }
    }

    /// Counts recorded by the ingestion that produced this handle.
    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    /// All wide rows in sample order.
    pub fn wide_rows(&self) -> Result<Vec<WideRow>> {
        self.store.wide_rows()
    }

    /// Replace the derived frequency table and advance to the next phase.
    pub(crate) fn commit_frequencies(mut self, rows: &[FrequencyRow]) -> Result<DerivedStore> {
        self.store.replace_frequencies(rows)?;
        Ok(DerivedStore { store: self.store })
    }

    /// Access the underlying store.
    pub fn store(&self) -> &SchemaStore {
        &self.store
    }
}

/// A store with every table built; the input to aggregation and comparison.
#[derive(Debug)]
pub struct DerivedStore {
    store: SchemaStore,
}

impl DerivedStore {
    /// Open a database built by an earlier run.
    ///
    /// Fails with [`ProfileError::StatePrecondition`] if any table is missing.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let store = SchemaStore::open(path)?;
        store.require_tables(&NORMALIZED_TABLES)?;
        store.require_tables(&[FREQUENCY_TABLE])?;
        Ok(Self { store })
    }

    /// All wide rows in sample order.
    pub fn wide_rows(&self) -> Result<Vec<WideRow>> {
        self.store.wide_rows()
    }

    /// The derived long frequency table, in derivation order.
    pub fn frequencies(&self) -> Result<FrequencyTable> {
        self.store.frequencies()
    }

    /// All projects.
    pub fn projects(&self) -> Result<Vec<Project>> {
        self.store.projects()
    }

    /// All subjects.
    pub fn subjects(&self) -> Result<Vec<Subject>> {
        self.store.subjects()
    }

    /// All treatments.
    pub fn treatments(&self) -> Result<Vec<Treatment>> {
        self.store.treatments()
    }

    /// All samples with their counts.
    pub fn samples(&self) -> Result<Vec<Sample>> {
        self.store.samples()
    }

    /// Access the underlying store.
    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Give the store back for another full rebuild.
    pub fn into_inner(self) -> SchemaStore {
        self.store
    }
}
