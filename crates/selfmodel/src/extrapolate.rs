//! Philosophy marker extrapolation.
//!
//! A philosophy description may embed `[[C: NAME]]` context markers and
//! `[[S: NAME]]` state markers. Each unique name, in first-occurrence order,
//! becomes an observation context with a fresh ID.

use std::collections::HashSet;
use std::sync::LazyLock;

use noesis_model::{ObservationContext, ids};
use regex::Regex;

static CONTEXT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[C: ([^\]]+)\]\]").expect("context marker pattern"));
static STATE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[S: ([^\]]+)\]\]").expect("state marker pattern"));

/// Every unique marker name in the description, first occurrence first,
/// as fresh observation contexts.
pub fn extrapolate_observation_contexts(description: &str) -> Vec<ObservationContext> {
    // Both marker kinds share one ordering: textual position in the source.
    let mut markers: Vec<(usize, &str)> = CONTEXT_MARKER
        .captures_iter(description)
        .chain(STATE_MARKER.captures_iter(description))
        .filter_map(|captures| captures.get(1).map(|m| (m.start(), m.as_str())))
        .collect();
    markers.sort_by_key(|(offset, _)| *offset);

    let mut seen = HashSet::new();
    let mut contexts = Vec::new();
    for (_, name) in markers {
        if !seen.insert(name.to_string()) {
            continue;
        }
        contexts.push(ObservationContext {
            id: ids::new_observation_context_id(),
            name: name.to_string(),
            parent_id: None,
            possible_states: Vec::new(),
            possible_values: Vec::new(),
        });
    }
    contexts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_context_and_state_markers() {
        let contexts = extrapolate_observation_contexts(
            "I value [[C: Sleep]] deeply and track [[S: Deep Sleep]] nightly.",
        );
        let names: Vec<&str> = contexts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Sleep", "Deep Sleep"]);
        assert!(contexts.iter().all(|c| c.id.starts_with("oc_")));
    }

    #[test]
    fn ordering_follows_textual_position_across_marker_kinds() {
        let contexts = extrapolate_observation_contexts(
            "[[S: Mood]] then [[C: Sleep]] then [[S: Deep Sleep]]",
        );
        let names: Vec<&str> = contexts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Mood", "Sleep", "Deep Sleep"]);
    }

    #[test]
    fn duplicates_keep_first_occurrence_order() {
        let contexts = extrapolate_observation_contexts(
            "[[C: Sleep]] then [[C: Diet]] then [[C: Sleep]] again",
        );
        let names: Vec<&str> = contexts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Sleep", "Diet"]);
    }

    #[test]
    fn re_extrapolation_is_idempotent_by_name() {
        let description = "[[C: Energy]] and [[S: High Energy]]";
        let first = extrapolate_observation_contexts(description);
        let second = extrapolate_observation_contexts(description);
        let names = |cs: &[ObservationContext]| {
            cs.iter().map(|c| c.name.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert!(extrapolate_observation_contexts("no markers here").is_empty());
    }
}
