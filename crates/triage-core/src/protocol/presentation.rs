//! Step texts, keyed by step id.
//!
//! The engine never reads this table; hosts use it to render a step.

use crate::StepId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Title and description of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepText {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl StepText {
    #[must_use]
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Presentation table for a protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    texts: BTreeMap<StepId, StepText>,
}

impl Presentation {
    /// Build a table from `(step id, text)` pairs. Later pairs win.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, StepText)>,
        K: Into<StepId>,
    {
        Self {
            texts: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Text for a step, if one was declared.
    #[must_use]
    pub fn text(&self, id: &StepId) -> Option<&StepText> {
        self.texts.get(id)
    }

    /// Title for a step, falling back to its id.
    #[must_use]
    pub fn title<'a>(&'a self, id: &'a StepId) -> &'a str {
        self.texts
            .get(id)
            .map(|t| t.title.as_str())
            .unwrap_or(id.as_str())
    }

    /// Step ids that have a text.
    pub fn ids(&self) -> impl Iterator<Item = &StepId> {
        self.texts.keys()
    }
}
