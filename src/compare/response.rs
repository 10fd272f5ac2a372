//! Responder vs non-responder comparison per population.

use super::groups::ResponseGroups;
use crate::data::Population;
use crate::error::{ProfileError, Result};
use crate::test::{test_mann_whitney, MannWhitneyMethod};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Thresholds for the response comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Minimum observations required in each response group.
    pub min_group_size: usize,
    /// Significance level; a population is significant when p < alpha.
    pub alpha: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            min_group_size: 3,
            alpha: 0.05,
        }
    }
}

impl CompareConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.min_group_size < 1 {
            return Err(ProfileError::InvalidParameter(
                "min_group_size must be at least 1".to_string(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ProfileError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Test outcome for one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationComparison {
    pub population: Population,
    /// Mann-Whitney U of the responder group.
    pub statistic: f64,
    pub p_value: f64,
    pub method: MannWhitneyMethod,
    pub n_yes: usize,
    pub n_no: usize,
    pub median_yes: f64,
    pub median_no: f64,
    /// p < alpha.
    pub significant: bool,
}

/// Comparison results for every population with enough data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub config: CompareConfig,
    /// Evaluated populations sorted by population name.
    pub results: Vec<PopulationComparison>,
}

impl ComparisonResult {
    /// Number of evaluated populations.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterate over results.
    pub fn iter(&self) -> impl Iterator<Item = &PopulationComparison> {
        self.results.iter()
    }

    /// Result of one population, if it was evaluated.
    pub fn get(&self, population: Population) -> Option<&PopulationComparison> {
        self.results.iter().find(|r| r.population == population)
    }

    /// Significant populations, in name order.
    pub fn significant(&self) -> Vec<&PopulationComparison> {
        self.results.iter().filter(|r| r.significant).collect()
    }

    /// Write results to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "population\tn_yes\tn_no\tmedian_yes\tmedian_no\tstatistic\tp_value\tsignificant"
        )?;
        for r in &self.results {
            writeln!(
                writer,
                "{}\t{}\t{}\t{:.6}\t{:.6}\t{:.1}\t{:.4e}\t{}",
                r.population.name(),
                r.n_yes,
                r.n_no,
                r.median_yes,
                r.median_no,
                r.statistic,
                r.p_value,
                r.significant
            )?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl std::fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Responders vs non-responders (Mann-Whitney U, alpha = {})",
            self.config.alpha
        )?;
        writeln!(
            f,
            "{:<12} {:>5} {:>5} {:>10} {:>10} {:>10}",
            "population", "n_yes", "n_no", "med_yes", "med_no", "p_value"
        )?;
        for r in &self.results {
            writeln!(
                f,
                "{:<12} {:>5} {:>5} {:>10.4} {:>10.4} {:>10.4}{}",
                r.population.name(),
                r.n_yes,
                r.n_no,
                r.median_yes,
                r.median_no,
                r.p_value,
                if r.significant { " *" } else { "" }
            )?;
        }

        let significant = self.significant();
        if significant.is_empty() {
            writeln!(f, "No population differs significantly")?;
        } else {
            let names: Vec<&str> = significant.iter().map(|r| r.population.name()).collect();
            writeln!(f, "Significant: {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Compare responder and non-responder frequencies for each population.
///
/// Populations where either group has fewer than `min_group_size`
/// observations are skipped and do not appear in the result.
pub fn compare_response(groups: &ResponseGroups, config: &CompareConfig) -> Result<ComparisonResult> {
    config.validate()?;

    let mut results = Vec::new();
    for (&population, group) in groups.iter() {
        if group.min_size() < config.min_group_size {
            debug!(
                population = population.name(),
                n_yes = group.yes.len(),
                n_no = group.no.len(),
                "skipping population with insufficient data"
            );
            continue;
        }

        let test = test_mann_whitney(&group.yes, &group.no)?;
        results.push(PopulationComparison {
            population,
            statistic: test.statistic,
            p_value: test.p_value,
            method: test.method,
            n_yes: group.yes.len(),
            n_no: group.no.len(),
            median_yes: median(&group.yes),
            median_no: median(&group.no),
            significant: test.p_value < config.alpha,
        });
    }
    results.sort_by(|a, b| a.population.name().cmp(b.population.name()));

    let n_significant = results.iter().filter(|r| r.significant).count();
    info!(
        tested = results.len(),
        significant = n_significant,
        "compared responders and non-responders"
    );

    Ok(ComparisonResult {
        config: config.clone(),
        results,
    })
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ResponseGroup;
    use approx::assert_relative_eq;

    fn groups(entries: Vec<(Population, Vec<f64>, Vec<f64>)>) -> ResponseGroups {
        ResponseGroups {
            groups: entries
                .into_iter()
                .map(|(p, yes, no)| (p, ResponseGroup { yes, no }))
                .collect(),
        }
    }

    #[test]
    fn test_insufficient_groups_skipped() {
        let groups = groups(vec![(
            Population::BCell,
            vec![0.8, 0.9],
            vec![0.1, 0.2, 0.3, 0.4, 0.5],
        )]);
        let result = compare_response(&groups, &CompareConfig::default()).unwrap();
        assert!(result.is_empty());
        assert!(result.get(Population::BCell).is_none());
    }

    #[test]
    fn test_separated_groups_significant() {
        let groups = groups(vec![(
            Population::Monocyte,
            vec![0.8, 0.82, 0.85, 0.88, 0.9],
            vec![0.1, 0.12, 0.15, 0.18, 0.2],
        )]);
        let result = compare_response(&groups, &CompareConfig::default()).unwrap();

        let r = result.get(Population::Monocyte).unwrap();
        assert!(r.significant);
        assert_relative_eq!(r.p_value, 2.0 / 252.0, epsilon = 1e-12);
        assert_relative_eq!(r.median_yes, 0.85);
        assert_relative_eq!(r.median_no, 0.15);
        assert_eq!(result.significant().len(), 1);
    }

    #[test]
    fn test_identical_groups_not_significant() {
        let values = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let groups = groups(vec![(Population::NkCell, values.clone(), values)]);
        let result = compare_response(&groups, &CompareConfig::default()).unwrap();

        let r = result.get(Population::NkCell).unwrap();
        assert!(!r.significant);
        assert_relative_eq!(r.p_value, 1.0);
        assert!(result.significant().is_empty());
    }

    #[test]
    fn test_results_sorted_by_name() {
        let yes = vec![0.1, 0.2, 0.3];
        let no = vec![0.4, 0.5, 0.6];
        let groups = groups(vec![
            (Population::BCell, yes.clone(), no.clone()),
            (Population::Cd8TCell, yes.clone(), no.clone()),
            (Population::Cd4TCell, yes.clone(), no.clone()),
            (Population::NkCell, yes.clone(), no.clone()),
            (Population::Monocyte, yes, no),
        ]);
        let result = compare_response(&groups, &CompareConfig::default()).unwrap();
        let names: Vec<&str> = result.iter().map(|r| r.population.name()).collect();
        assert_eq!(
            names,
            vec!["b_cell", "cd4_t_cell", "cd8_t_cell", "monocyte", "nk_cell"]
        );
        // p = 0.1 for fully separated groups of three
        assert!(result.significant().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let groups = ResponseGroups::default();
        let bad_alpha = CompareConfig {
            alpha: 1.5,
            ..Default::default()
        };
        assert!(compare_response(&groups, &bad_alpha).is_err());

        let bad_size = CompareConfig {
            min_group_size: 0,
            ..Default::default()
        };
        assert!(compare_response(&groups, &bad_size).is_err());
    }

    #[test]
    fn test_report_and_tsv() {
        let groups = groups(vec![(
            Population::Monocyte,
            vec![0.8, 0.82, 0.85, 0.88, 0.9],
            vec![0.1, 0.12, 0.15, 0.18, 0.2],
        )]);
        let result = compare_response(&groups, &CompareConfig::default()).unwrap();

        let text = result.to_string();
        assert!(text.contains("Significant: monocyte"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comparison.tsv");
        result.to_tsv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().nth(1).unwrap().starts_with("monocyte\t5\t5\t"));
    }

    #[test]
    fn test_median() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median(&[]).is_nan());
    }
}
