//! Relative frequency derivation (wide counts to long proportions).
//!
//! Each sample's five counts are divided by their sum, the same total sum
//! scaling used for compositional count data. Missing values follow SQL
//! NULL arithmetic: one missing count makes the total, and therefore every
//! percentage of that sample, undefined.

use crate::data::{FrequencyRow, FrequencyTable, Population, WideRow};
use crate::error::Result;
use crate::store::{DerivedStore, IngestedStore};
use tracing::{info, warn};

/// Derive the five frequency rows of a single sample.
///
/// # Formula
/// For population p of sample j: pct(p, j) = count(p, j) / sum(count(·, j))
///
/// The percentage is `None` when the count is missing, when any other count
/// of the sample is missing, or when the total is zero.
pub fn sample_frequencies(row: &WideRow) -> [FrequencyRow; 5] {
    let total = row.counts.total();
    Population::ALL.map(|population| {
        let count = row.counts.get(population);
        let percentage = match (count, total) {
            (Some(c), Some(t)) if t > 0.0 => Some(c / t),
            _ => None,
        };
        FrequencyRow {
            sample_id: row.sample_id,
            sample: row.sample.clone(),
            population,
            count,
            total,
            percentage,
        }
    })
}

/// Transform wide rows into the long frequency table.
///
/// Output holds exactly five rows per input row, in input order and then
/// canonical population order.
pub fn relative_frequencies(rows: &[WideRow]) -> FrequencyTable {
    let mut out = Vec::with_capacity(rows.len() * Population::ALL.len());
    for row in rows {
        out.extend(sample_frequencies(row));
    }
    FrequencyTable::new(out)
}

/// Rebuild the store's frequency table from its wide rows.
///
/// The previous table is dropped and replaced in one transaction.
pub fn derive_frequencies(store: IngestedStore) -> Result<DerivedStore> {
    let rows = store.wide_rows()?;
    let table = relative_frequencies(&rows);

    let n_zero_total = rows
        .iter()
        .filter(|r| r.counts.total() == Some(0.0))
        .count();
    if n_zero_total > 0 {
        warn!(samples = n_zero_total, "samples with zero total count have undefined frequencies");
    }

    let derived = store.commit_frequencies(&table.rows)?;
    info!(
        samples = rows.len(),
        rows = table.len(),
        undefined = table.n_undefined(),
        "derived relative frequencies"
    );
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellCounts, Response};
    use approx::assert_relative_eq;

    fn wide(sample_id: i64, counts: CellCounts) -> WideRow {
        WideRow {
            sample_id,
            subject_id: 1,
            project: "prj1".into(),
            subject: "sbj1".into(),
            condition: Some("melanoma".into()),
            age: Some(50),
            sex: Some("M".into()),
            treatment: Some("miraclib".into()),
            response: Response::Yes,
            sample: format!("s{}", sample_id),
            sample_type: Some("PBMC".into()),
            time_from_treatment_start: Some(0.0),
            counts,
        }
    }

    #[test]
    fn test_frequencies_sum_to_one() {
        let rows = vec![
            wide(1, CellCounts::complete([10.0, 20.0, 30.0, 25.0, 15.0])),
            wide(2, CellCounts::complete([12.0, 18.0, 28.0, 27.0, 15.0])),
            wide(3, CellCounts::complete([36000.0, 24000.0, 42000.0, 6000.0, 12000.0])),
        ];
        let table = relative_frequencies(&rows);
        assert_eq!(table.len(), 15);

        for row in &rows {
            let sum: f64 = table
                .for_sample(row.sample_id)
                .iter()
                .map(|r| r.percentage.unwrap())
                .sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_known_percentages() {
        let rows = vec![wide(1, CellCounts::complete([10.0, 20.0, 30.0, 25.0, 15.0]))];
        let table = relative_frequencies(&rows);

        let expected = [0.10, 0.20, 0.30, 0.25, 0.15];
        for (r, e) in table.iter().zip(expected) {
            assert_eq!(r.total, Some(100.0));
            assert_relative_eq!(r.percentage.unwrap(), e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_canonical_order() {
        let rows = vec![
            wide(7, CellCounts::complete([1.0, 1.0, 1.0, 1.0, 1.0])),
            wide(3, CellCounts::complete([1.0, 1.0, 1.0, 1.0, 1.0])),
        ];
        let table = relative_frequencies(&rows);
        let order: Vec<(i64, Population)> =
            table.iter().map(|r| (r.sample_id, r.population)).collect();

        let mut expected = Vec::new();
        for id in [7, 3] {
            for p in Population::ALL {
                expected.push((id, p));
            }
        }
        assert_eq!(order, expected);
    }

    #[test]
    fn test_missing_count_makes_sample_undefined() {
        let counts = CellCounts::new([Some(10.0), Some(20.0), None, Some(25.0), Some(15.0)]);
        let rows = vec![wide(1, counts)];
        let table = relative_frequencies(&rows);

        assert_eq!(table.len(), 5);
        for r in table.iter() {
            assert_eq!(r.total, None);
            assert_eq!(r.percentage, None);
        }
        // counts that were measured are still reported
        assert_eq!(table.rows[0].count, Some(10.0));
        assert_eq!(table.rows[2].count, None);
    }

    #[test]
    fn test_zero_total_is_undefined_not_zero() {
        let rows = vec![wide(1, CellCounts::complete([0.0; 5]))];
        let table = relative_frequencies(&rows);

        for r in table.iter() {
            assert_eq!(r.total, Some(0.0));
            assert_eq!(r.count, Some(0.0));
            assert!(r.percentage.is_none());
        }
    }

    #[test]
    fn test_zero_count_with_positive_total() {
        let rows = vec![wide(1, CellCounts::complete([0.0, 50.0, 50.0, 0.0, 0.0]))];
        let table = relative_frequencies(&rows);
        assert_eq!(table.rows[0].percentage, Some(0.0));
        assert_eq!(table.rows[1].percentage, Some(0.5));
    }
}
