//! Generation results
//!
//! The server is the sole authority on generation: it runs the pipeline,
//! validates the artifact, and (optionally) iterates a refinement loop.
//! The client only renders what comes back, so everything here is a plain
//! deserialization target. One result exists at a time; a new invocation
//! replaces it wholesale.

use serde::{Deserialize, Serialize};

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Artifact is unusable at this location
    Error,
    /// Suspicious but usable
    Warning,
    /// Informational note
    Info,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Finding severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Where in the artifact the finding applies
    #[serde(default)]
    pub location: String,
}

/// Validation outcome for one generated artifact.
///
/// Issue lists are replaced wholesale per result, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    /// Whether the artifact passed validation
    pub is_valid: bool,
    /// All findings for this artifact
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Count findings at a given severity
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// One pass of the server-side refinement loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementIteration {
    /// Iteration index (1-based)
    pub iteration: u32,
    /// Whether this pass validated cleanly
    pub is_valid: bool,
    /// Error-severity findings this pass
    pub error_count: usize,
    /// Warning-severity findings this pass
    pub warning_count: usize,
    /// Info-severity findings this pass
    pub info_count: usize,
    /// Findings for this pass (replaced, never merged)
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

/// Trace of the server-side refinement loop.
///
/// Present only when refinement was requested. The client renders this
/// trace verbatim; it never re-runs any iteration logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementTrace {
    /// Per-iteration records, in execution order
    #[serde(default)]
    pub iterations: Vec<RefinementIteration>,
    /// Number of iterations the server actually ran
    pub total_iterations: u32,
    /// Whether the final artifact validated
    pub final_valid: bool,
}

/// The authoritative result of one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Machine the artifact was generated for
    pub machine_name: String,
    /// Generated artifact (opaque code blob)
    pub l5x_code: String,
    /// Artifact length in characters, as reported by the server
    pub code_length: usize,
    /// How many similar routines the retrieval step found
    #[serde(default)]
    pub similar_count: usize,
    /// Validation outcome
    pub validation: ValidationReport,
    /// Refinement trace, present only for refined generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementTrace>,
}

/// Permitted refinement iteration ceilings.
///
/// The backend accepts exactly {1, 2, 3, 5}; the closed set is modeled as
/// an enum so an out-of-range count cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaxIterations {
    /// Single refinement pass
    One,
    /// Two passes
    Two,
    /// Three passes (backend default)
    Three,
    /// Five passes
    Five,
}

impl MaxIterations {
    /// Numeric value sent on the wire
    #[inline]
    #[must_use]
    pub fn value(self) -> u32 {
        match self {
            MaxIterations::One => 1,
            MaxIterations::Two => 2,
            MaxIterations::Three => 3,
            MaxIterations::Five => 5,
        }
    }

    /// Parse a numeric selection, rejecting anything outside the set
    #[must_use]
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(MaxIterations::One),
            2 => Some(MaxIterations::Two),
            3 => Some(MaxIterations::Three),
            5 => Some(MaxIterations::Five),
            _ => None,
        }
    }
}

impl Default for MaxIterations {
    fn default() -> Self {
        MaxIterations::Three
    }
}

/// Configuration for a refined generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RefinementConfig {
    /// Iteration ceiling for the server-side loop
    pub max_iterations: MaxIterations,
}

impl RefinementConfig {
    /// Create a config with the given ceiling
    #[inline]
    #[must_use]
    pub fn new(max_iterations: MaxIterations) -> Self {
        Self { max_iterations }
    }
}
