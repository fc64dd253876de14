//! The fixed coping-technique snippets every fresh database is seeded with.

use super::KnowledgeSnippet;

pub const THERAPY_TECHNIQUES: [&str; 5] = [
    "Deep breathing helps reduce anxiety by activating the parasympathetic nervous system",
    "The 5-4-3-2-1 grounding technique: Name 5 things you see, 4 you feel, 3 you hear, 2 you smell, 1 you taste",
    "Progressive muscle relaxation reduces tension by systematically tensing and relaxing muscle groups",
    "Cognitive reframing: Challenge negative thoughts by asking 'Is this thought helpful or true?'",
    "Brief meditation: Focus on your breath for 3 minutes while acknowledging and releasing thoughts",
];

/// The techniques keyed `doc_1`..`doc_5`.
pub fn default_snippets() -> Vec<KnowledgeSnippet> {
    THERAPY_TECHNIQUES
        .iter()
        .enumerate()
        .map(|(i, text)| KnowledgeSnippet {
            id: format!("doc_{}", i + 1),
            text: (*text).to_string(),
        })
        .collect()
}
