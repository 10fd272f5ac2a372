//! Per-population responder and non-responder frequency groups.

use crate::data::{FrequencyTable, Population, Response, WideRow};
use crate::error::Result;
use crate::store::DerivedStore;
use crate::summary::CohortFilter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Relative frequencies of one population split by response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseGroup {
    /// Frequencies of responder samples.
    pub yes: Vec<f64>,
    /// Frequencies of non-responder samples.
    pub no: Vec<f64>,
}

impl ResponseGroup {
    /// Smaller of the two group sizes.
    pub fn min_size(&self) -> usize {
        self.yes.len().min(self.no.len())
    }
}

/// Population to response-split frequencies.
///
/// This is the structure handed to plotting: one box per population and
/// response label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseGroups {
    pub groups: BTreeMap<Population, ResponseGroup>,
}

impl ResponseGroups {
    /// Split frequencies of cohort samples by response.
    ///
    /// Frequencies are joined to their sample by surrogate id. Samples outside
    /// the cohort, with a response other than yes/no, or with an undefined
    /// percentage are left out.
    pub fn build(frequencies: &FrequencyTable, rows: &[WideRow], cohort: &CohortFilter) -> Self {
        let by_id: HashMap<i64, &WideRow> = cohort.select(rows).map(|r| (r.sample_id, r)).collect();

        let mut groups: BTreeMap<Population, ResponseGroup> = BTreeMap::new();
        for freq in frequencies.iter() {
            let (Some(row), Some(pct)) = (by_id.get(&freq.sample_id), freq.percentage) else {
                continue;
            };
            let group = groups.entry(freq.population).or_default();
            match row.response {
                Response::Yes => group.yes.push(pct),
                Response::No => group.no.push(pct),
                _ => {}
            }
        }
        groups.retain(|_, g| !g.yes.is_empty() || !g.no.is_empty());

        Self { groups }
    }

    /// Group of one population.
    pub fn get(&self, population: Population) -> Option<&ResponseGroup> {
        self.groups.get(&population)
    }

    /// Number of populations with at least one observation.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate over populations in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&Population, &ResponseGroup)> {
        self.groups.iter()
    }

    /// Write long-format observations (`population, response, percentage`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "population\tresponse\tpercentage")?;
        for (population, group) in &self.groups {
            for (label, values) in [("yes", &group.yes), ("no", &group.no)] {
                for v in values {
                    writeln!(writer, "{}\t{}\t{}", population.name(), label, v)?;
                }
            }
        }
        writer.flush()?;

        Ok(())
    }
}

/// Response groups of a fully built store.
pub fn response_groups(store: &DerivedStore, cohort: &CohortFilter) -> Result<ResponseGroups> {
    let rows = store.wide_rows()?;
    let frequencies = store.frequencies()?;
    Ok(ResponseGroups::build(&frequencies, &rows, cohort))
}
