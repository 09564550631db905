use serde::{Deserialize, Serialize};
use std::fmt;

/// The four waste categories, in enumeration order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WasteCategory {
    Chemical,
    Infectious,
    Plastic,
    General,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 4] = [
        WasteCategory::Chemical,
        WasteCategory::Infectious,
        WasteCategory::Plastic,
        WasteCategory::General,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            WasteCategory::Chemical => "Chemical Waste",
            WasteCategory::Infectious => "Infectious Waste",
            WasteCategory::Plastic => "Plastic/Recyclable Waste",
            WasteCategory::General => "General Waste",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            WasteCategory::Chemical => 0,
            WasteCategory::Infectious => 1,
            WasteCategory::Plastic => 2,
            WasteCategory::General => 3,
        }
    }

    /// Map a model class name onto a category.
    ///
    /// Exact display names match first; otherwise a case-insensitive keyword
    /// match is used so that exports labelled e.g. "plastic" or "Recyclable" still
    /// resolve.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if let Some(exact) = Self::ALL.iter().find(|c| c.display_name() == trimmed) {
            return Some(*exact);
        }

        let lower = trimmed.to_lowercase();
        if lower.contains("chemical") {
            Some(WasteCategory::Chemical)
        } else if lower.contains("infectious") || lower.contains("biohazard") {
            Some(WasteCategory::Infectious)
        } else if lower.contains("plastic") || lower.contains("recycl") {
            Some(WasteCategory::Plastic)
        } else if lower.contains("general") {
            Some(WasteCategory::General)
        } else {
            None
        }
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct PredictionEntry {
    pub category: WasteCategory,
    pub probability: f32,
}

impl PredictionEntry {
    pub fn new(category: WasteCategory, probability: f32) -> Self {
        Self {
            category,
            probability,
        }
    }

    pub fn percentage(&self) -> f32 {
        self.probability * 100.0
    }
}

/// Ranked predictions of one inference call.
///
/// Only built by `services::ranking::rank`, which guarantees one entry per
/// category sorted by non-increasing probability.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionSet {
    pub(crate) entries: Vec<PredictionEntry>,
}

impl PredictionSet {
    pub fn top(&self) -> &PredictionEntry {
        &self.entries[0]
    }

    pub fn ranked(&self) -> &[PredictionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub locator: Option<String>,
    pub downloaded: bool,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
    pub labels: Vec<String>,
}
