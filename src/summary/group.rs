//! Grouped counts over cohort-filtered wide rows.

use super::cohort::CohortFilter;
use crate::data::{Population, WideRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Attribute used to group rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Project,
    Response,
    Sex,
}

impl GroupKey {
    /// Group value of a row; `None` when the attribute is missing.
    pub fn value_of(&self, row: &WideRow) -> Option<String> {
        match self {
            Self::Project => Some(row.project.clone()),
            Self::Response => row.response.as_label().map(String::from),
            Self::Sex => row.sex.clone(),
        }
    }

    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Response => "response",
            Self::Sex => "sex",
        }
    }
}

/// How matching rows are counted within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Every matching row counts once.
    Rows,
    /// Each distinct subject counts once, however many samples it has.
    DistinctSubjects,
}

/// One group and its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    /// Group value, `None` for rows missing the attribute.
    pub value: Option<String>,
    pub count: usize,
}

/// Group value to count mapping, ordered by group value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub key: GroupKey,
    pub mode: CountMode,
    pub groups: Vec<GroupCount>,
}

impl GroupCounts {
    /// Count for a group value (`None` selects the missing-value group).
    pub fn get(&self, value: Option<&str>) -> usize {
        self.groups
            .iter()
            .find(|g| g.value.as_deref() == value)
            .map_or(0, |g| g.count)
    }

    /// Sum over all groups.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Mapping view keyed by group value.
    pub fn as_map(&self) -> BTreeMap<Option<&str>, usize> {
        self.groups
            .iter()
            .map(|g| (g.value.as_deref(), g.count))
            .collect()
    }
}

impl fmt::Display for GroupCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for g in &self.groups {
            writeln!(f, "  {}: {}", g.value.as_deref().unwrap_or("NA"), g.count)?;
        }
        Ok(())
    }
}

/// Count cohort rows per group value.
pub fn count_rows_by(rows: &[WideRow], filter: &CohortFilter, key: GroupKey) -> GroupCounts {
    let mut counts: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for row in filter.select(rows) {
        *counts.entry(key.value_of(row)).or_insert(0) += 1;
    }
    GroupCounts {
        key,
        mode: CountMode::Rows,
        groups: into_groups(counts),
    }
}

/// Count distinct cohort subjects per group value.
///
/// Subjects are identified by their surrogate id, so the same subject code
/// in two projects counts as two subjects.
pub fn count_subjects_by(rows: &[WideRow], filter: &CohortFilter, key: GroupKey) -> GroupCounts {
    let mut subjects: BTreeMap<Option<String>, BTreeSet<i64>> = BTreeMap::new();
    for row in filter.select(rows) {
        subjects
            .entry(key.value_of(row))
            .or_default()
            .insert(row.subject_id);
    }
    let counts = subjects
        .into_iter()
        .map(|(value, ids)| (value, ids.len()))
        .collect();
    GroupCounts {
        key,
        mode: CountMode::DistinctSubjects,
        groups: into_groups(counts),
    }
}

/// Count grouped cohort rows with the requested counting mode.
pub fn count_by(
    rows: &[WideRow],
    filter: &CohortFilter,
    key: GroupKey,
    mode: CountMode,
) -> GroupCounts {
    match mode {
        CountMode::Rows => count_rows_by(rows, filter, key),
        CountMode::DistinctSubjects => count_subjects_by(rows, filter, key),
    }
}

/// Number of cohort rows.
pub fn count_rows(rows: &[WideRow], filter: &CohortFilter) -> usize {
    filter.select(rows).count()
}

/// Mean raw count of a population over cohort rows where it was measured.
///
/// Returns `None` when no cohort row has a count for the population.
pub fn mean_count(rows: &[WideRow], filter: &CohortFilter, population: Population) -> Option<f64> {
    let values: Vec<f64> = filter
        .select(rows)
        .filter_map(|r| r.counts.get(population))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn into_groups(counts: BTreeMap<Option<String>, usize>) -> Vec<GroupCount> {
    counts
        .into_iter()
        .map(|(value, count)| GroupCount { value, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellCounts, Response};

    fn row(
        sample_id: i64,
        subject_id: i64,
        project: &str,
        response: Response,
        sex: Option<&str>,
        b_cell: Option<f64>,
    ) -> WideRow {
        WideRow {
            sample_id,
            subject_id,
            project: project.into(),
            subject: format!("sbj{}", subject_id),
            condition: Some("melanoma".into()),
            age: None,
            sex: sex.map(String::from),
            treatment: Some("miraclib".into()),
            response,
            sample: format!("s{}", sample_id),
            sample_type: Some("PBMC".into()),
            time_from_treatment_start: Some(0.0),
            counts: CellCounts::new([b_cell, Some(1.0), Some(1.0), Some(1.0), Some(1.0)]),
        }
    }

    fn rows() -> Vec<WideRow> {
        vec![
            row(1, 1, "prj1", Response::Yes, Some("M"), Some(100.0)),
            row(2, 1, "prj1", Response::Yes, Some("M"), Some(200.0)),
            row(3, 2, "prj2", Response::No, Some("F"), None),
            row(4, 3, "prj2", Response::Unset, None, Some(50.0)),
        ]
    }

    #[test]
    fn test_rows_vs_distinct_subjects() {
        let rows = rows();
        let filter = CohortFilter::all();

        let by_project = count_rows_by(&rows, &filter, GroupKey::Project);
        assert_eq!(by_project.get(Some("prj1")), 2);
        assert_eq!(by_project.get(Some("prj2")), 2);
        assert_eq!(by_project.total(), 4);

        let by_response = count_subjects_by(&rows, &filter, GroupKey::Response);
        assert_eq!(by_response.get(Some("yes")), 1);
        assert_eq!(by_response.get(Some("no")), 1);
        assert_eq!(by_response.get(None), 1);

        let by_sex = count_subjects_by(&rows, &filter, GroupKey::Sex);
        assert_eq!(by_sex.get(Some("M")), 1);
        assert_eq!(by_sex.get(Some("F")), 1);
        assert_eq!(by_sex.get(None), 1);
    }

    #[test]
    fn test_groups_sorted_by_value() {
        let rows = rows();
        let by_response = count_rows_by(&rows, &CohortFilter::all(), GroupKey::Response);
        let values: Vec<Option<&str>> = by_response
            .groups
            .iter()
            .map(|g| g.value.as_deref())
            .collect();
        assert_eq!(values, vec![None, Some("no"), Some("yes")]);
    }

    #[test]
    fn test_count_by_dispatch() {
        let rows = rows();
        let filter = CohortFilter::all();
        assert_eq!(
            count_by(&rows, &filter, GroupKey::Sex, CountMode::Rows).get(Some("M")),
            2
        );
        assert_eq!(
            count_by(&rows, &filter, GroupKey::Sex, CountMode::DistinctSubjects).get(Some("M")),
            1
        );
        assert_eq!(count_rows(&rows, &filter.clone().sex("F")), 1);
    }

    #[test]
    fn test_mean_count_skips_missing() {
        let rows = rows();
        let mean = mean_count(&rows, &CohortFilter::all(), Population::BCell).unwrap();
        assert!((mean - 350.0 / 3.0).abs() < 1e-9);

        let males = CohortFilter::all().sex("M").response(Response::Yes);
        assert_eq!(mean_count(&rows, &males, Population::BCell), Some(150.0));

        let none = CohortFilter::all().sex("F");
        assert_eq!(mean_count(&rows, &none, Population::BCell), None);
    }

    #[test]
    fn test_as_map_keys_by_group_value() {
        let rows = rows();
        let by_project = count_rows_by(&rows, &CohortFilter::all(), GroupKey::Project);
        let map = by_project.as_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&Some("prj1")], 2);
        assert_eq!(map[&Some("prj2")], 2);

        let by_sex = count_subjects_by(&rows, &CohortFilter::all(), GroupKey::Sex);
        let map = by_sex.as_map();
        assert_eq!(map.get(&None), Some(&1));
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![None, Some("F"), Some("M")]);
    }

    #[test]
    fn test_display() {
        let rows = rows();
        let text = count_rows_by(&rows, &CohortFilter::all(), GroupKey::Sex).to_string();
        assert!(text.contains("  M: 2"));
        assert!(text.contains("  NA: 1"));
    }
}
