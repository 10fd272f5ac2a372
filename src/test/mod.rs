//! Statistical hypothesis tests for two-group comparisons.


pub use mann_whitney::{
    test_mann_whitney, test_mann_whitney_with, MannWhitneyMethod, MannWhitneyResult,
};
