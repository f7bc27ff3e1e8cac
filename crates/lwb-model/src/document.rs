//! Parsed logic document
//!
//! The structural summary the backend returns after parsing an uploaded
//! logic sheet: one document holds every machine found in the sheet, each
//! machine holds its ordered steps. A document is immutable once received
//! and is replaced wholesale by the next upload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Interlock value the parser treats as "no interlock".
const ALWAYS_ON: &str = "AlwaysOn";

/// Condition flag governing the transition out of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Transition when the interlocks are satisfied
    #[serde(rename = "Yes")]
    Yes,
    /// Transition when the interlocks are not satisfied
    #[serde(rename = "No")]
    No,
    /// Transition on either edge
    #[serde(rename = "No/Yes")]
    NoYes,
}

/// A single step in a machine's cycle.
///
/// Each step carries its interlock tags (named preconditions), a condition
/// flag, and the step it hands off to, forming one edge of the cycle graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step number, unique within the machine
    pub step: u32,
    /// Human-readable description
    pub description: String,
    /// Interlock tags gating this step (already filtered by the parser)
    #[serde(default)]
    pub interlocks: Vec<String>,
    /// Condition flag
    pub condition: Condition,
    /// Step number this step transitions to
    pub next_step: u32,
}

impl Step {
    /// Interlocks that actually gate the step.
    ///
    /// The backend filters `AlwaysOn` and blanks before serializing; this
    /// re-applies the same filter so a hand-built or stale payload cannot
    /// smuggle them in.
    #[must_use]
    pub fn active_interlocks(&self) -> impl Iterator<Item = &str> {
        self.interlocks
            .iter()
            .map(String::as_str)
            .filter(|tag| !tag.trim().is_empty() && !tag.trim().eq_ignore_ascii_case(ALWAYS_ON))
    }

    /// Whether any interlock gates this step
    #[inline]
    #[must_use]
    pub fn has_interlocks(&self) -> bool {
        self.active_interlocks().next().is_some()
    }
}

/// A complete state machine for one machine/conveyor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Machine name as it appears in the logic sheet
    pub name: String,
    /// Ordered steps
    #[serde(rename = "states")]
    pub steps: Vec<Step>,
}

impl Machine {
    /// Number of steps
    #[inline]
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Expected traversal order of step ids, in sheet order.
    #[must_use]
    pub fn cycle_path(&self) -> Vec<u32> {
        self.steps.iter().map(|s| s.step).collect()
    }

    /// Look up a step by its number
    #[must_use]
    pub fn step(&self, number: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.step == number)
    }

    /// All unique interlock tags used by this machine, sorted.
    #[must_use]
    pub fn interlock_tags(&self) -> Vec<String> {
        let tags: BTreeSet<&str> = self
            .steps
            .iter()
            .flat_map(Step::active_interlocks)
            .collect();
        tags.into_iter().map(str::to_owned).collect()
    }

    /// Check structural invariants for this machine.
    ///
    /// Step numbers must be unique and every `next_step` must reference an
    /// existing step, so the cycle path never dangles.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.step) {
                return Err(DocumentError::DuplicateStep {
                    machine: self.name.clone(),
                    step: step.step,
                });
            }
        }
        for step in &self.steps {
            if !seen.contains(&step.next_step) {
                return Err(DocumentError::DanglingTransition {
                    machine: self.name.clone(),
                    step: step.step,
                    next_step: step.next_step,
                });
            }
        }
        Ok(())
    }
}

/// The parsed document returned by the backend for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// All machines found in the sheet
    pub machines: Vec<Machine>,
    /// Machine count as reported by the backend
    pub total_machines: usize,
}

impl ParsedDocument {
    /// Machine names in sheet order
    #[must_use]
    pub fn machine_names(&self) -> Vec<&str> {
        self.machines.iter().map(|m| m.name.as_str()).collect()
    }

    /// Total number of steps across all machines
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.machines.iter().map(Machine::step_count).sum()
    }

    /// Look up a machine by index
    #[inline]
    #[must_use]
    pub fn machine(&self, index: usize) -> Option<&Machine> {
        self.machines.get(index)
    }

    /// Check document-level invariants.
    ///
    /// The reported count must match the machine list and every machine
    /// must satisfy its own invariants.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.total_machines != self.machines.len() {
            return Err(DocumentError::CountMismatch {
                reported: self.total_machines,
                actual: self.machines.len(),
            });
        }
        for machine in &self.machines {
            machine.validate()?;
        }
        Ok(())
    }
}

/// Structural violations in a parsed document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// Reported machine count disagrees with the machine list
    #[error("total_machines says {reported} but document holds {actual}")]
    CountMismatch { reported: usize, actual: usize },

    /// Step number repeated within a machine
    #[error("machine '{machine}' declares step {step} more than once")]
    DuplicateStep { machine: String, step: u32 },

    /// A step transitions to a step number that does not exist
    #[error("machine '{machine}' step {step} transitions to missing step {next_step}")]
    DanglingTransition {
        machine: String,
        step: u32,
        next_step: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn step(step: u32, next: u32) -> Step {
        Step {
            step,
            description: format!("step {step}"),
            interlocks: vec![],
            condition: Condition::Yes,
            next_step: next,
        }
    }

    fn three_step_machine() -> Machine {
        Machine {
            name: "Main Conveyor".to_string(),
            steps: vec![step(1, 2), step(2, 3), step(3, 1)],
        }
    }

    #[test]
    fn cycle_path_follows_sheet_order() {
        let machine = three_step_machine();
        assert_eq!(machine.cycle_path(), vec![1, 2, 3]);
        assert!(machine.validate().is_ok());
    }

    #[test]
    fn duplicate_step_rejected() {
        let machine = Machine {
            name: "M".to_string(),
            steps: vec![step(1, 2), step(1, 1), step(2, 1)],
        };
        assert_eq!(
            machine.validate(),
            Err(DocumentError::DuplicateStep {
                machine: "M".to_string(),
                step: 1
            })
        );
    }

    #[test]
    fn dangling_transition_rejected() {
        let machine = Machine {
            name: "M".to_string(),
            steps: vec![step(1, 99)],
        };
        assert!(matches!(
            machine.validate(),
            Err(DocumentError::DanglingTransition { next_step: 99, .. })
        ));
    }

    #[test]
    fn document_count_must_match() {
        let doc = ParsedDocument {
            machines: vec![three_step_machine()],
            total_machines: 2,
        };
        assert_eq!(
            doc.validate(),
            Err(DocumentError::CountMismatch {
                reported: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn interlock_filtering() {
        let mut s = step(1, 1);
        s.interlocks = vec![
            "DI01".to_string(),
            "AlwaysOn".to_string(),
            "  ".to_string(),
            "DI02".to_string(),
        ];
        let machine = Machine {
            name: "M".to_string(),
            steps: vec![s],
        };
        assert_eq!(machine.interlock_tags(), vec!["DI01", "DI02"]);
    }

    #[test]
    fn deserializes_backend_payload() {
        let json = r#"{
            "machines": [{
                "name": "Infeed",
                "states": [
                    {"step": 1, "description": "idle", "interlocks": ["DI01"],
                     "condition": "Yes", "next_step": 2},
                    {"step": 2, "description": "run", "interlocks": [],
                     "condition": "No/Yes", "next_step": 1}
                ]
            }],
            "total_machines": 1
        }"#;
        let doc: ParsedDocument = serde_json::from_str(json).unwrap();
        assert!(doc.validate().is_ok());
        assert_eq!(doc.machines[0].steps[1].condition, Condition::NoYes);
        assert_eq!(doc.total_steps(), 2);
    }
}
