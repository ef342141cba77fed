//! The extraction schema: what the vision model is asked to produce.
//!
//! The schema is injected configuration, not a module-level constant. The
//! category list in particular varies per deployment (an expense app for
//! field engineers wants different buckets than one for sales travel), so
//! the pipeline receives it through [`crate::config::ProcessingConfig`] and
//! threads it here. Everything the model must conform to — the enumerated
//! categories, the currency code format, and the rotation contract — lives
//! in this one type so the prompt builder and the response validator can
//! never drift apart.

use serde::{Deserialize, Serialize};

/// Expense categories used when a deployment does not inject its own list.
///
/// Matches the closed set the client's trip forms render.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "lodging",
    "transport",
    "meals",
    "miscellaneous",
    "purchases",
    "other",
];

/// Clockwise rotation requested by the extraction capability.
///
/// A non-zero value means the model could not read the receipt in its
/// current orientation; the orchestrator applies the rotation and re-runs
/// extraction exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    /// No rotation needed; the receipt reads top-to-bottom as-is.
    #[default]
    None,
    /// Rotate 90° clockwise.
    Cw90,
    /// Rotate 180°.
    Cw180,
    /// Rotate 270° clockwise.
    Cw270,
}

impl Rotation {
    /// Degrees of clockwise rotation, one of 0, 90, 180, 270.
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(format!(
                "rotationHint must be one of 0, 90, 180, 270 — got {other}"
            )),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

/// Field constraints supplied to the extraction capability.
///
/// Carried alongside the few-shot example in the prompt, and used again to
/// reject non-conforming model output after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Closed set of allowed `category` values.
    pub categories: Vec<String>,
    /// Format instruction for the `currency` field.
    pub currency_instruction: String,
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            currency_instruction: "ISO 4217 currency code".to_string(),
        }
    }
}

impl ExtractionSchema {
    /// Build a schema from an injected category list.
    pub fn with_categories(categories: Vec<String>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    /// Whether `category` belongs to the enumerated closed set.
    pub fn allows_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}
