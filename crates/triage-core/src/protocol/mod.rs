//! # Protocols
//!
//! A protocol bundles the three tables the engine and its hosts need:
//! - the validated [`StepGraph`] (engine input)
//! - the [`Presentation`] table (host input, never read by the engine)
//! - the progress [`Milestones`]
//!
//! The dengue flowchart is compiled in. Alternative flowcharts can be parsed
//! from TOML; file I/O stays in the app layer.
//!
//! ## TOML Layout
//!
//! ```toml
//! name = "dengue-peds"
//!
//! [[steps]]
//! id = "start"
//! kind = "question"
//! title = "Suspected dengue"
//! options = [{ text = "Begin", next = "alarm_check" }]
//!
//! [[steps]]
//! id = "wait_labs_b"
//! kind = "wait_labs"
//! group = "B"
//! auto = { check = "hemoconcentration", on_red = "group_d", on_yellow = "group_c", otherwise = "labs_normal_b" }
//!
//! [milestones]
//! group_b = 8
//! ```

mod dengue;
mod presentation;

pub use presentation::{Presentation, StepText};

use crate::graph::{Step, StepGraph};
use crate::progress::Milestones;
use crate::TriageError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A complete, validated protocol definition.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub name: String,
    pub graph: StepGraph,
    pub presentation: Presentation,
    pub milestones: Milestones,
}

impl Protocol {
    /// The built-in dengue severity flowchart.
    pub fn dengue() -> Result<Self, TriageError> {
        Ok(Self {
            name: "dengue".to_string(),
            graph: StepGraph::new(dengue::steps())?,
            presentation: Presentation::from_pairs(dengue::texts()),
            milestones: Milestones::dengue(),
        })
    }

    /// Parse and validate a protocol from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, TriageError> {
        let file: ProtocolFile = toml::from_str(text)
            .map_err(|e| TriageError::InvalidProtocol(format!("TOML: {}", e)))?;

        let mut steps = Vec::with_capacity(file.steps.len());
        let mut texts = Vec::new();
        for entry in file.steps {
            if let Some(title) = entry.title {
                texts.push((
                    entry.step.id.clone(),
                    StepText {
                        title,
                        description: entry.description.unwrap_or_default(),
                    },
                ));
            }
            steps.push(entry.step);
        }

        let graph = StepGraph::new(steps)?;
        for id in file.milestones.keys() {
            if graph.get(id).is_none() {
                return Err(TriageError::InvalidProtocol(format!(
                    "milestone names unknown step {}",
                    id
                )));
            }
        }

        Ok(Self {
            name: file.name,
            graph,
            presentation: Presentation::from_pairs(texts),
            milestones: Milestones::new(file.milestones),
        })
    }
}

#[derive(Deserialize)]
struct ProtocolFile {
    #[serde(default = "default_name")]
    name: String,
    steps: Vec<StepEntry>,
    #[serde(default)]
    milestones: BTreeMap<String, usize>,
}

#[derive(Deserialize)]
struct StepEntry {
    #[serde(flatten)]
    step: Step,
    title: Option<String>,
    description: Option<String>,
}

fn default_name() -> String {
    "custom".to_string()
}

// =============================================================================
// TESTS
// =============================================================================
