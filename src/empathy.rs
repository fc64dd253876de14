//! Empathy prefix applied to every reply, including the fallback.

use rand::seq::IndexedRandom;
use rand::Rng;

pub const EMPATHY_PHRASES: [&str; 5] = [
    "I hear how difficult this feels",
    "That sounds really challenging",
    "I appreciate you sharing this with me",
    "I can sense this is weighing on you",
    "You're being so brave by working through this",
];

/// Prefixes text with one of [`EMPATHY_PHRASES`], drawn uniformly.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmpathyPrefixer;

impl EmpathyPrefixer {
    /// `"<phrase>. <raw>"` using the thread-local RNG.
    pub fn apply(&self, raw: &str) -> String {
        self.apply_with(raw, &mut rand::rng())
    }

    pub fn apply_with<R: Rng + ?Sized>(&self, raw: &str, rng: &mut R) -> String {
        // The array is non-empty, so choose always yields a phrase.
        let phrase = EMPATHY_PHRASES.choose(rng).copied().unwrap_or(EMPATHY_PHRASES[0]);
        format!("{phrase}. {raw}")
    }
}

/// Whether `text` starts with one of the phrases followed by `". "`.
pub fn has_empathy_prefix(text: &str) -> bool {
    EMPATHY_PHRASES
        .iter()
        .any(|phrase| text.strip_prefix(phrase).is_some_and(|rest| rest.starts_with(". ")))
}
