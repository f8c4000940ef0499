//! Error types returned by fatal, load-time failures.
//!
//! Per-packet outcomes (queue overflow, transit loss, missing neighbor, unknown route) are never
//! represented as errors; they surface only through logging and the final metrics report.

use crate::types::MediumId;
use thiserror::Error;

/// Errors that can occur while loading or constructing a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    /// A topology or workload row did not parse into the expected column types.
    #[error("malformed row at {path}:{line}: {reason}")]
    MalformedRow {
        /// File the row was read from.
        path: String,
        /// One-based line number within the file.
        line: usize,
        /// Human readable description of the problem.
        reason: String,
    },
    /// A link row referenced an endpoint id that was never defined as a medium.
    #[error("link endpoint {0:?} is not a known medium id")]
    UnknownEndpoint(usize),
    /// Two media rows declared the same id.
    #[error("duplicate medium id {0:?}")]
    DuplicateMediumId(usize),
    /// A workload packet was injected from a medium id that does not exist.
    #[error("workload packet references unknown source medium {0:?}")]
    UnknownSource(usize),
    /// Underlying CSV parsing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A link medium must connect exactly two distinct endpoints.
    #[error("link medium {0:?} has a self-loop or degenerate endpoint pair")]
    DegenerateLink(MediumId),
}
