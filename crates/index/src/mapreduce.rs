//! Map/reduce stages
//!
//! Stages are plain data, so a job can be shipped to a server and re-run at
//! will. Each one is a pure function from its input sequence to its output;
//! the semantics of filtering and sorting are the shared ones in
//! [`polystore_core::pipeline`].

use serde::{Deserialize, Serialize};

use polystore_core::pipeline;
use polystore_core::{Filter, Record, Sort};

use crate::client::JobOutput;

/// One step of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Map: keep records matching every filter
    Filter {
        /// Residual predicates
        filters: Vec<Filter>,
    },
    /// Reduce: stable multi-key sort
    Sort {
        /// Sort keys in priority order
        sorts: Vec<Sort>,
    },
    /// Reduce: drop the first `n` records
    Offset {
        /// Records to skip
        n: usize,
    },
    /// Reduce: keep the first `n` records
    Limit {
        /// Records to keep
        n: usize,
    },
    /// Reduce: identity, marks the records the job returns
    PassThru,
    /// Reduce: cardinality of the input; ends the job
    Count,
}

impl Stage {
    /// Apply a record-to-record stage
    ///
    /// `Count` is not record-to-record and leaves its input untouched; use
    /// [`execute`] to run whole jobs.
    pub fn apply(&self, input: Vec<Record>) -> Vec<Record> {
        match self {
            Stage::Filter { filters } => pipeline::apply_filters(input, filters),
            Stage::Sort { sorts } => {
                let mut records = input;
                pipeline::apply_sorts(&mut records, sorts);
                records
            }
            Stage::Offset { n } => pipeline::apply_offset(input, Some(*n)),
            Stage::Limit { n } => pipeline::apply_limit(input, Some(*n)),
            Stage::PassThru | Stage::Count => input,
        }
    }
}

/// Run stages in order over the job input
pub fn execute(stages: &[Stage], input: Vec<Record>) -> JobOutput {
    let mut records = input;
    for stage in stages {
        if let Stage::Count = stage {
            return JobOutput::Count(records.len() as u64);
        }
        records = stage.apply(records);
    }
    JobOutput::Records(records)
}
