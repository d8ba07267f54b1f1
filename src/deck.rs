//! Presentation sections and live navigation state
//!
//! A deck is the ordered section list produced by the (out-of-scope)
//! content service; this module owns the in-session mutable state around
//! it: the current slide index, the durable transcript history, and the
//! live partial-transcript preview.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One slide of the presentation
///
/// Serialized camelCase to match the JSON the content service emits.
/// `selected_triggers` is the authoritative matching vocabulary; when the
/// source JSON omits it, it is seeded from the primary and alternative
/// triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub content: String,
    pub primary_trigger: String,
    #[serde(default)]
    pub alternative_triggers: Vec<String>,
    #[serde(default)]
    pub selected_triggers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Section {
    /// Fill `selected_triggers` from primary + alternatives when empty
    pub fn seed_triggers(&mut self) {
        if self.selected_triggers.is_empty() {
            self.selected_triggers = std::iter::once(self.primary_trigger.clone())
                .filter(|t| !t.is_empty())
                .chain(self.alternative_triggers.iter().cloned())
                .collect();
        }
    }

    /// The trigger vocabulary used for live matching
    ///
    /// Empty means matching silently no-ops for this section.
    #[must_use]
    pub fn active_triggers(&self) -> &[String] {
        &self.selected_triggers
    }
}

/// Live presentation state: sections plus the current slide index
///
/// Mutated only by the navigation engine or explicit user navigation; the
/// index is always within `[0, sections.len())` while the deck is
/// non-empty.
#[derive(Debug, Default)]
pub struct PresentationState {
    sections: Vec<Section>,
    current_index: usize,
    history: Vec<String>,
    live_preview: String,
}

impl PresentationState {
    /// Create state over a deck, seeding trigger vocabularies
    #[must_use]
    pub fn new(mut sections: Vec<Section>) -> Self {
        for section in &mut sections {
            section.seed_triggers();
        }
        Self {
            sections,
            current_index: 0,
            history: Vec::new(),
            live_preview: String::new(),
        }
    }

    /// Replace the whole deck, resetting the index to 0
    pub fn replace_sections(&mut self, mut sections: Vec<Section>) {
        for section in &mut sections {
            section.seed_triggers();
        }
        self.sections = sections;
        self.current_index = 0;
    }

    /// All sections in order
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Index of the current slide
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// The current slide, `None` for an empty deck
    #[must_use]
    pub fn current_section(&self) -> Option<&Section> {
        self.sections.get(self.current_index)
    }

    /// Move forward one slide; no-op (returns false) at the last slide
    pub fn advance(&mut self) -> bool {
        if self.current_index + 1 < self.sections.len() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Move back one slide; no-op (returns false) at the first slide
    pub fn go_back(&mut self) -> bool {
        if self.current_index > 0 {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    /// Jump directly to a slide; no-op (returns false) when out of range
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.sections.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    /// Append a finalized transcript to durable history
    pub fn push_final(&mut self, text: &str) {
        if !text.is_empty() {
            self.history.push(text.to_string());
        }
        self.live_preview.clear();
    }

    /// Update the live preview from a partial transcript
    pub fn set_preview(&mut self, text: &str) {
        self.live_preview.clear();
        self.live_preview.push_str(text);
    }

    /// Finalized transcript history, oldest first
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// The most recent partial transcript
    #[must_use]
    pub fn live_preview(&self) -> &str {
        &self.live_preview
    }

    /// Number of sections in the deck
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True when the deck has no sections
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Load a deck (JSON array of sections) from disk
///
/// # Errors
///
/// Returns error if the file is unreadable, not valid JSON, or empty
pub fn load_deck(path: &Path) -> Result<Vec<Section>> {
    let raw = std::fs::read_to_string(path)?;
    let sections: Vec<Section> = serde_json::from_str(&raw)?;
    if sections.is_empty() {
        return Err(Error::Deck(format!(
            "deck {} contains no sections",
            path.display()
        )));
    }
    Ok(sections)
}
