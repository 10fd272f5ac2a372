//! Transactional writer used to rebuild the normalized tables.

use crate::data::{CellCounts, Population, RawRecord, Subject, WideRow};
use crate::error::Result;
use rusqlite::{params, OptionalExtension, Transaction};

/// Outcome of a get-or-create lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Existing(i64),
    Created(i64),
}

impl Resolved {
    /// The resolved identifier.
    pub fn id(&self) -> i64 {
        match self {
            Self::Existing(id) | Self::Created(id) => *id,
        }
    }

    /// Whether the entity was created by this lookup.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Writes a complete replacement of the store inside one transaction.
///
/// Nothing is visible to other handles until [`StoreWriter::commit`];
/// dropping the writer rolls every change back, including the table reset.
pub struct StoreWriter<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> StoreWriter<'conn> {
    pub(crate) fn begin(tx: Transaction<'conn>) -> Result<Self> {
        tx.execute_batch(include_str!("sql/reset.sql"))?;
        Ok(Self { tx })
    }

    /// Look up a project by name, creating it on first sighting.
    pub fn get_or_create_project(&self, name: &str) -> Result<Resolved> {
        let existing: Option<i64> = self
            .tx
            .query_row("SELECT id FROM projects WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(Resolved::Existing(id));
        }
        self.tx
            .execute("INSERT INTO projects (name) VALUES (?1)", [name])?;
        Ok(Resolved::Created(self.tx.last_insert_rowid()))
    }

    /// Look up a treatment by name, creating it on first sighting.
    pub fn get_or_create_treatment(&self, name: &str) -> Result<Resolved> {
        let existing: Option<i64> = self
            .tx
            .query_row("SELECT id FROM treatments WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(Resolved::Existing(id));
        }
        self.tx
            .execute("INSERT INTO treatments (name) VALUES (?1)", [name])?;
        Ok(Resolved::Created(self.tx.last_insert_rowid()))
    }

    /// Look up a subject by (project, subject code), creating it from the
    /// record on first sighting. An existing subject keeps its first-seen
    /// demographics.
    pub fn get_or_create_subject(
        &self,
        project_id: i64,
        record: &RawRecord,
    ) -> Result<(Subject, bool)> {
        let existing = self
            .tx
            .query_row(
                "
                SELECT id, condition, age, sex
                FROM subjects
                WHERE project_id = ?1 AND subject_code = ?2
                ",
                params![project_id, record.subject],
                |row| {
                    Ok(Subject {
                        id: row.get(0)?,
                        project_id,
                        subject_code: record.subject.clone(),
                        condition: row.get(1)?,
                        age: row.get(2)?,
                        sex: row.get(3)?,
                    })
                },
            )
            .optional()?;
        if let Some(subject) = existing {
            return Ok((subject, false));
        }

        self.tx.execute(
            "
            INSERT INTO subjects (project_id, subject_code, condition, age, sex)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                project_id,
                record.subject,
                record.condition,
                record.age,
                record.sex,
            ],
        )?;

        Ok((
            Subject {
                id: self.tx.last_insert_rowid(),
                project_id,
                subject_code: record.subject.clone(),
                condition: record.condition.clone(),
                age: record.age,
                sex: record.sex.clone(),
            },
            true,
        ))
    }

    /// Insert a sample row. Samples are never deduplicated.
    pub fn insert_sample(
        &self,
        subject_id: i64,
        treatment_id: Option<i64>,
        record: &RawRecord,
    ) -> Result<i64> {
        self.tx.execute(
            "
            INSERT INTO samples (
                subject_id,
                treatment_id,
                response,
                sample_code,
                sample_type,
                time_from_treatment_start
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                subject_id,
                treatment_id,
                record.response.as_label(),
                record.sample,
                record.sample_type,
                record.time_from_treatment_start,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Insert the counts belonging to a sample.
    pub fn insert_cell_counts(&self, sample_id: i64, counts: &CellCounts) -> Result<()> {
        self.tx.execute(
            "
            INSERT INTO cell_counts (
                sample_id, b_cell, cd8_t_cell, cd4_t_cell, nk_cell, monocyte
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                sample_id,
                counts.get(Population::BCell),
                counts.get(Population::Cd8TCell),
                counts.get(Population::Cd4TCell),
                counts.get(Population::NkCell),
                counts.get(Population::Monocyte),
            ],
        )?;
        Ok(())
    }

    /// Insert the denormalized row of a sample.
    pub fn insert_wide_row(&self, row: &WideRow) -> Result<()> {
        self.tx.execute(
            "
            INSERT INTO sample_wide (
                sample_id, subject_id, project, subject, condition, age, sex,
                treatment, response, sample, sample_type, time_from_treatment_start,
                b_cell, cd8_t_cell, cd4_t_cell, nk_cell, monocyte
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ",
            params![
                row.sample_id,
                row.subject_id,
                row.project,
                row.subject,
                row.condition,
                row.age,
                row.sex,
                row.treatment,
                row.response.as_label(),
                row.sample,
                row.sample_type,
                row.time_from_treatment_start,
                row.counts.get(Population::BCell),
                row.counts.get(Population::Cd8TCell),
                row.counts.get(Population::Cd4TCell),
                row.counts.get(Population::NkCell),
                row.counts.get(Population::Monocyte),
            ],
        )?;
        Ok(())
    }

    /// Make every change of this writer durable.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
