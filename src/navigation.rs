//! Navigation state machine
//!
//! Converts transcript turns into slide-index mutations. Only final turns
//! can navigate; partials update the live preview. Command precedence on
//! every final turn is question > back > advance, and accepted navigations
//! are debounced so re-segmented or overlapping turns cannot double-fire.

use std::time::{Duration, Instant};

use crate::deck::PresentationState;
use crate::trigger::match_trigger;

/// Default minimum time between two accepted navigation actions
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Default spoken back-command phrases
#[must_use]
pub fn default_back_phrases() -> Vec<String> {
    vec![
        "back".to_string(),
        "previous".to_string(),
        "go back".to_string(),
    ]
}

/// Navigation tunables
///
/// The debounce window and the command precedence defaults come from the
/// product; they are configuration, not invariants, so deployments can
/// tune them per speaking pace.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Cooldown window between accepted navigations
    pub debounce: Duration,
    /// Substrings that trigger back-navigation, matched lowercase
    pub back_phrases: Vec<String>,
    /// Route question-mark transcripts to question handling
    pub question_mode: bool,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            back_phrases: default_back_phrases(),
            question_mode: false,
        }
    }
}

/// What a turn did to the presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// Forward navigation on a trigger match
    Advanced {
        from: usize,
        to: usize,
        /// The trigger token that matched
        token: String,
    },
    /// Back-command navigation
    WentBack { from: usize, to: usize },
    /// Question detected; navigation skipped, text handed to the caller
    Question(String),
    /// Partial turn; live preview updated only
    Preview,
    /// Nothing changed (no match, debounced, or boundary)
    NoChange,
}

/// Debounced navigation engine over a [`PresentationState`]
///
/// Never errors: ambiguous input (empty trigger set, empty transcript,
/// boundary index) degrades to [`NavOutcome::NoChange`].
#[derive(Debug)]
pub struct Navigator {
    config: NavigatorConfig,
    last_navigation: Option<Instant>,
}

impl Navigator {
    /// Create a navigator with the given tunables
    #[must_use]
    pub fn new(mut config: NavigatorConfig) -> Self {
        for phrase in &mut config.back_phrases {
            *phrase = phrase.to_lowercase();
        }
        Self {
            config,
            last_navigation: None,
        }
    }

    /// The active tunables
    #[must_use]
    pub const fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Consume one transcript turn
    pub fn handle_turn(
        &mut self,
        state: &mut PresentationState,
        text: &str,
        is_final: bool,
    ) -> NavOutcome {
        self.handle_turn_at(state, text, is_final, Instant::now())
    }

    /// Consume one transcript turn with an explicit clock
    ///
    /// The clock parameter exists so debounce behavior is testable; the
    /// timestamp is only read and stored when a navigation is accepted,
    /// together with the index mutation it guards.
    pub fn handle_turn_at(
        &mut self,
        state: &mut PresentationState,
        text: &str,
        is_final: bool,
        now: Instant,
    ) -> NavOutcome {
        if !is_final {
            state.set_preview(text);
            return NavOutcome::Preview;
        }

        state.push_final(text);

        if text.is_empty() {
            return NavOutcome::NoChange;
        }

        if self.config.question_mode && text.contains('?') {
            tracing::debug!(transcript = %text, "question detected, skipping navigation");
            return NavOutcome::Question(text.to_string());
        }

        let lowered = text.to_lowercase();

        // Back command wins over trigger words in the same utterance. A
        // matched-but-debounced back still stops evaluation: the utterance
        // was a command, not trigger material.
        if state.current_index() > 0
            && self
                .config
                .back_phrases
                .iter()
                .any(|phrase| lowered.contains(phrase.as_str()))
        {
            if self.cooled_down(now) {
                let from = state.current_index();
                if state.go_back() {
                    self.last_navigation = Some(now);
                    let to = state.current_index();
                    tracing::info!(from, to, "back command accepted");
                    return NavOutcome::WentBack { from, to };
                }
            } else {
                tracing::debug!("back command debounced");
            }
            return NavOutcome::NoChange;
        }

        let Some(section) = state.current_section() else {
            return NavOutcome::NoChange;
        };

        if let Some(matched) = match_trigger(text, section.active_triggers()) {
            if !self.cooled_down(now) {
                tracing::debug!(token = %matched.token, "trigger debounced");
                return NavOutcome::NoChange;
            }
            let from = state.current_index();
            if state.advance() {
                self.last_navigation = Some(now);
                let to = state.current_index();
                tracing::info!(from, to, token = %matched.token, "trigger advanced slide");
                return NavOutcome::Advanced {
                    from,
                    to,
                    token: matched.token,
                };
            }
            // Last slide: the match is a no-op and does not stamp the clock
        }

        NavOutcome::NoChange
    }

    /// True when the debounce window has elapsed since the last accepted
    /// navigation
    fn cooled_down(&self, now: Instant) -> bool {
        self.last_navigation
            .is_none_or(|last| now.duration_since(last) >= self.config.debounce)
    }
}
