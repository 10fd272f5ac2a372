//! Ingestion and normalization of raw records into the schema store.

use crate::data::{RawRecord, WideRow};
use crate::error::Result;
use crate::store::{IngestedStore, SchemaStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Counts recorded while loading a batch of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Records read (one sample each).
    pub n_records: usize,
    /// Distinct projects created.
    pub n_projects: usize,
    /// Distinct subjects created.
    pub n_subjects: usize,
    /// Distinct treatments created.
    pub n_treatments: usize,
    /// Records whose sample code was already seen in this batch.
    pub n_duplicate_samples: usize,
}

impl std::fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Records:    {}", self.n_records)?;
        writeln!(f, "Projects:   {}", self.n_projects)?;
        writeln!(f, "Subjects:   {}", self.n_subjects)?;
        writeln!(f, "Treatments: {}", self.n_treatments)?;
        if self.n_duplicate_samples > 0 {
            writeln!(f, "Duplicate sample codes: {}", self.n_duplicate_samples)?;
        }
        Ok(())
    }
}

/// Replace the whole store content with a batch of records.
///
/// Projects, subjects and treatments are resolved by natural key; every
/// record becomes its own sample. The reset and all inserts share one
/// transaction, so an error leaves the previously committed content intact.
/// An empty batch clears the store.
pub fn ingest_records(mut store: SchemaStore, records: &[RawRecord]) -> Result<IngestedStore> {
    if records.is_empty() {
        warn!("no records to ingest; store will be rebuilt empty");
    }

    let mut summary = IngestSummary::default();
    let mut seen_samples = std::collections::HashSet::new();

    let writer = store.rebuild()?;
    for record in records {
        record.validate()?;
        let project = writer.get_or_create_project(&record.project)?;
        let (subject, subject_created) = writer.get_or_create_subject(project.id(), record)?;
        let treatment = record
            .treatment
            .as_deref()
            .map(|name| writer.get_or_create_treatment(name))
            .transpose()?;

        let sample_id = writer.insert_sample(subject.id, treatment.map(|t| t.id()), record)?;
        writer.insert_cell_counts(sample_id, &record.counts)?;

        writer.insert_wide_row(&WideRow {
            sample_id,
            subject_id: subject.id,
            project: record.project.clone(),
            subject: subject.subject_code,
            condition: subject.condition,
            age: subject.age,
            sex: subject.sex,
            treatment: record.treatment.clone(),
            response: record.response.clone(),
            sample: record.sample.clone(),
            sample_type: record.sample_type.clone(),
            time_from_treatment_start: record.time_from_treatment_start,
            counts: record.counts,
        })?;

        summary.n_records += 1;
        summary.n_projects += usize::from(project.is_created());
        summary.n_subjects += usize::from(subject_created);
        summary.n_treatments += usize::from(treatment.is_some_and(|t| t.is_created()));
        if !seen_samples.insert(record.sample.as_str()) {
            summary.n_duplicate_samples += 1;
        }
    }
    writer.commit()?;

    info!(
        records = summary.n_records,
        projects = summary.n_projects,
        subjects = summary.n_subjects,
        treatments = summary.n_treatments,
        "ingested records"
    );
    if summary.n_duplicate_samples > 0 {
        warn!(
            duplicates = summary.n_duplicate_samples,
            "sample codes repeated in input; each record kept as its own sample"
        );
    }

    Ok(IngestedStore::new(store, summary))
}

/// Read a CSV file and ingest it.
pub fn ingest_csv<P: AsRef<Path>>(store: SchemaStore, path: P) -> Result<IngestedStore> {
    let records = crate::data::read_records(path.as_ref())?;
    info!(path = %path.as_ref().display(), records = records.len(), "read input");
    ingest_records(store, &records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{read_records_from, CellCounts, Response};
    use crate::normalize::derive_frequencies;
    use tempfile::NamedTempFile;

    const CSV: &str = "\
project,subject,condition,age,sex,treatment,response,sample,sample_type,time_from_treatment_start,b_cell,cd8_t_cell,cd4_t_cell,nk_cell,monocyte
prj1,sbj1,melanoma,50,M,miraclib,yes,s1,PBMC,0,10,20,30,25,15
prj1,sbj1,carcinoma,51,F,miraclib,yes,s2,PBMC,7,12,18,28,27,15
prj1,sbj2,melanoma,60,F,phauximab,no,s3,WB,0,5,5,5,5,5
prj2,sbj1,healthy,40,M,,,s4,PBMC,,1,2,3,4,5
";

    fn records() -> Vec<RawRecord> {
        read_records_from(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_normalizes_entities() {
        let store = SchemaStore::open_in_memory().unwrap();
        let ingested = ingest_records(store, &records()).unwrap();
        let summary = ingested.summary().clone();

        assert_eq!(summary.n_records, 4);
        assert_eq!(summary.n_projects, 2);
        // sbj1 in prj2 is a different subject from sbj1 in prj1
        assert_eq!(summary.n_subjects, 3);
        assert_eq!(summary.n_treatments, 2);
        assert_eq!(summary.n_duplicate_samples, 0);

        let inner = ingested.store();
        assert_eq!(inner.row_count("projects").unwrap(), 2);
        assert_eq!(inner.row_count("subjects").unwrap(), 3);
        assert_eq!(inner.row_count("treatments").unwrap(), 2);
        assert_eq!(inner.row_count("samples").unwrap(), 4);
        assert_eq!(inner.row_count("cell_counts").unwrap(), 4);
        assert_eq!(inner.row_count("sample_wide").unwrap(), 4);
    }

    #[test]
    fn test_subject_keeps_first_seen_demographics() {
        let store = SchemaStore::open_in_memory().unwrap();
        let ingested = ingest_records(store, &records()).unwrap();
        let rows = ingested.wide_rows().unwrap();

        assert_eq!(rows[0].subject_id, rows[1].subject_id);
        assert_eq!(rows[1].condition.as_deref(), Some("melanoma"));
        assert_eq!(rows[1].sex.as_deref(), Some("M"));
        assert_eq!(rows[1].age, Some(50));
        assert_ne!(rows[0].subject_id, rows[3].subject_id);
    }

    #[test]
    fn test_optional_fields_round_trip() {
        let store = SchemaStore::open_in_memory().unwrap();
        let ingested = ingest_records(store, &records()).unwrap();
        let rows = ingested.wide_rows().unwrap();

        let last = &rows[3];
        assert_eq!(last.treatment, None);
        assert_eq!(last.response, Response::Unset);
        assert_eq!(last.time_from_treatment_start, None);
        assert!(rows[0].is_baseline());
        assert!(!rows[1].is_baseline());
    }

    #[test]
    fn test_duplicate_samples_are_kept() {
        let mut recs = records();
        recs.push(recs[0].clone());
        let store = SchemaStore::open_in_memory().unwrap();
        let ingested = ingest_records(store, &recs).unwrap();

        assert_eq!(ingested.summary().n_duplicate_samples, 1);
        assert_eq!(ingested.store().row_count("samples").unwrap(), 5);
        let rows = ingested.wide_rows().unwrap();
        assert_eq!(rows[0].sample, rows[4].sample);
        assert_ne!(rows[0].sample_id, rows[4].sample_id);
    }

    #[test]
    fn test_empty_batch_clears_store() {
        let store = SchemaStore::open_in_memory().unwrap();
        let ingested = ingest_records(store, &records()).unwrap();
        let derived = derive_frequencies(ingested).unwrap();

        let cleared = ingest_records(derived.into_inner(), &[]).unwrap();
        assert_eq!(cleared.summary().n_records, 0);
        assert_eq!(cleared.store().row_count("samples").unwrap(), 0);

        let derived = derive_frequencies(cleared).unwrap();
        assert!(derived.frequencies().unwrap().is_empty());
        assert!(derived.projects().unwrap().is_empty());
    }

    #[test]
    fn test_entity_tables_after_ingestion() {
        let store = SchemaStore::open_in_memory().unwrap();
        let derived = derive_frequencies(ingest_records(store, &records()).unwrap()).unwrap();

        let projects = derived.projects().unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["prj1", "prj2"]);

        // sbj1 appears twice in prj1 and once in prj2
        let subjects = derived.subjects().unwrap();
        assert_eq!(subjects.len(), 3);
        let sbj1_prj1: Vec<_> = subjects
            .iter()
            .filter(|s| s.project_id == projects[0].id && s.subject_code == "sbj1")
            .collect();
        assert_eq!(sbj1_prj1.len(), 1);
        assert_eq!(sbj1_prj1[0].condition.as_deref(), Some("melanoma"));
        assert_eq!(sbj1_prj1[0].age, Some(50));
        assert_eq!(sbj1_prj1[0].sex.as_deref(), Some("M"));

        let sbj1_prj2 = subjects
            .iter()
            .find(|s| s.project_id == projects[1].id && s.subject_code == "sbj1")
            .unwrap();
        assert_eq!(sbj1_prj2.condition.as_deref(), Some("healthy"));

        let treatments: Vec<String> = derived
            .treatments()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(treatments, vec!["miraclib", "phauximab"]);

        let samples = derived.samples().unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[3].treatment_id, None);
        assert_eq!(samples[0].counts.total(), Some(100.0));
    }

    #[test]
    fn test_invalid_record_rejected() {
        let mut records = records();
        records[2].counts = CellCounts::new([Some(-1.0), None, None, None, None]);

        let store = SchemaStore::open_in_memory().unwrap();
        let err = ingest_records(store, &records).unwrap_err();
        assert!(err.is_ingestion());
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_ingest_csv_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), CSV).unwrap();

        let store = SchemaStore::open_in_memory().unwrap();
        let ingested = ingest_csv(store, file.path()).unwrap();
        assert_eq!(ingested.summary().n_records, 4);
    }
}
