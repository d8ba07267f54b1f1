//! Trigger word matching
//!
//! Decides whether any of a section's trigger tokens was spoken in a
//! transcript. Pure: same transcript and token list always produce the
//! same result.

use regex::Regex;

/// A successful trigger match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Position of the matched token in the trigger list
    pub index: usize,
    /// The normalized token that matched
    pub token: String,
}

/// Test a transcript against a section's trigger tokens
///
/// Tokens are tried in list order and the first match wins; there is no
/// scoring. A token matches when it appears as a whole word, optionally
/// followed by an `s`, `es` or `ies` plural suffix, so `"moment"` matches
/// `"two moments"` but not `"momentarily"`.
#[must_use]
pub fn match_trigger(transcript: &str, triggers: &[String]) -> Option<TriggerMatch> {
    if transcript.is_empty() || triggers.is_empty() {
        return None;
    }

    let transcript = transcript.to_lowercase();

    for (index, trigger) in triggers.iter().enumerate() {
        let token = normalize_token(trigger);
        if token.is_empty() {
            continue;
        }

        let pattern = format!(r"\b{}(?:s|es|ies)?\b", regex::escape(&token));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };

        if re.is_match(&transcript) {
            return Some(TriggerMatch { index, token });
        }
    }

    None
}

/// Lowercase a token and strip everything non-alphanumeric
fn normalize_token(token: &str) -> String {
    token
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
