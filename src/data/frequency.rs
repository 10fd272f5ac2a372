//! Long-format relative frequency rows.

use super::population::Population;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Relative frequency of one population in one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRow {
    /// Surrogate identifier of the sample this row derives from.
    pub sample_id: i64,
    /// Sample code.
    pub sample: String,
    pub population: Population,
    /// Raw count, `None` when not measured.
    pub count: Option<f64>,
    /// Sum of the sample's five counts, `None` when any count is missing.
    pub total: Option<f64>,
    /// `count / total`, `None` when undefined (missing count or zero total).
    pub percentage: Option<f64>,
}

impl FrequencyRow {
    /// Whether the percentage is defined.
    pub fn is_defined(&self) -> bool {
        self.percentage.is_some()
    }
}

/// The derived long table: five rows per sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub rows: Vec<FrequencyRow>,
}

impl FrequencyTable {
    /// Wrap derived rows.
    pub fn new(rows: Vec<FrequencyRow>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &FrequencyRow> {
        self.rows.iter()
    }

    /// Rows for one sample, in canonical population order.
    pub fn for_sample(&self, sample_id: i64) -> Vec<&FrequencyRow> {
        self.rows.iter().filter(|r| r.sample_id == sample_id).collect()
    }

    /// Number of rows with an undefined percentage.
    pub fn n_undefined(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_defined()).count()
    }

    /// First `limit` rows ordered by sample code then population name.
    pub fn preview(&self, limit: usize) -> Vec<&FrequencyRow> {
        let mut sorted: Vec<_> = self.rows.iter().collect();
        sorted.sort_by(|a, b| {
            a.sample
                .cmp(&b.sample)
                .then_with(|| a.population.name().cmp(b.population.name()))
        });
        sorted.truncate(limit);
        sorted
    }

    /// Render a fixed-width preview table with percentages rounded to two places.
    pub fn format_preview(&self, limit: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<15} {:<15} {:>8} {:>8}\n",
            "Sample", "Population", "Count", "%"
        ));
        out.push_str(&"-".repeat(50));
        out.push('\n');
        for r in self.preview(limit) {
            out.push_str(&format!(
                "{:<15} {:<15} {:>8} {:>8}\n",
                r.sample,
                r.population.name(),
                format_value(r.count, 0),
                format_value(r.percentage, 2)
            ));
        }
        out
    }

    /// Write the table to a TSV file (`sample, population, count, percentage`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "sample\tpopulation\tcount\tpercentage")?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                r.sample,
                r.population.name(),
                r.count.map_or_else(|| "NA".to_string(), |c| c.to_string()),
                r.percentage.map_or_else(|| "NA".to_string(), |p| p.to_string())
            )?;
        }
        writer.flush()?;

        Ok(())
    }
}

fn format_value(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "NA".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sample_id: i64, sample: &str, population: Population, pct: Option<f64>) -> FrequencyRow {
        FrequencyRow {
            sample_id,
            sample: sample.to_string(),
            population,
            count: pct.map(|p| p * 100.0),
            total: pct.map(|_| 100.0),
            percentage: pct,
        }
    }

    #[test]
    fn test_preview_orders_by_sample_then_name() {
        let table = FrequencyTable::new(vec![
            row(2, "s2", Population::BCell, Some(0.1)),
            row(1, "s1", Population::NkCell, Some(0.2)),
            row(1, "s1", Population::Cd8TCell, Some(0.3)),
            row(1, "s1", Population::Cd4TCell, None),
        ]);

        let preview = table.preview(3);
        let keys: Vec<(&str, &str)> = preview
            .iter()
            .map(|r| (r.sample.as_str(), r.population.name()))
            .collect();
        assert_eq!(
            keys,
            vec![("s1", "cd4_t_cell"), ("s1", "cd8_t_cell"), ("s1", "nk_cell")]
        );
        assert_eq!(table.n_undefined(), 1);
        assert_eq!(table.for_sample(1).len(), 3);
    }

    #[test]
    fn test_format_preview_renders_na() {
        let table = FrequencyTable::new(vec![row(1, "s1", Population::BCell, None)]);
        let text = table.format_preview(10);
        assert!(text.contains("Population"));
        assert!(text.contains("NA"));
    }

    #[test]
    fn test_tsv_output() {
        let table = FrequencyTable::new(vec![
            row(1, "s1", Population::BCell, Some(0.25)),
            row(1, "s1", Population::Cd8TCell, None),
        ]);
        let temp = tempfile::NamedTempFile::new().unwrap();
        table.to_tsv(temp.path()).unwrap();

        let content = std::fs::read_to_string(temp.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "sample\tpopulation\tcount\tpercentage");
        assert_eq!(lines[1], "s1\tb_cell\t25\t0.25");
        assert_eq!(lines[2], "s1\tcd8_t_cell\tNA\tNA");
    }
}
