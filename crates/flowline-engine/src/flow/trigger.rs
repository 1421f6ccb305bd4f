//! Trigger matcher (C3, §4.3). Two uses: scoring candidate flows for
//! webhook-driven routing, and picking a trigger node once a flow has been
//! selected.

use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

const DEFAULT_KEYWORD: &str = "default";

/// NFD-decompose, strip combining marks, lowercase, and trim — the
/// normalization applied to every trigger keyword and every inbound text
/// field before matching (§4.3). Idempotent: `normalize(normalize(s)) ==
/// normalize(s)` (§8).
pub fn normalize(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Build the set of keyword candidates derived from inbound text and
/// interactive fields: the whole normalized string and each
/// whitespace-separated part, for each of the three inputs.
fn keyword_candidates(text: &str, interactive_title: &str, interactive_id: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for field in [text, interactive_title, interactive_id] {
        let normalized = normalize(field);
        if normalized.is_empty() {
            continue;
        }
        candidates.push(normalized.clone());
        for part in normalized.split_whitespace() {
            candidates.push(part.to_string());
        }
    }
    candidates
}

/// A flow in the shape this matcher needs: its id, raw trigger string, and
/// `updatedAt` for tie-breaking.
pub struct FlowTriggerInput<'a> {
    pub id: &'a str,
    pub trigger: &'a str,
    pub updated_at: DateTime<Utc>,
}

/// Select the best-scoring flow for an inbound message, per §4.3's scoring
/// rules, with `updatedAt` descending as the tie-break and a `default`
/// fallback when nothing scores above zero.
pub fn select_flow<'a>(
    candidates: &'a [FlowTriggerInput<'a>],
    full_text: &str,
    interactive_title: &str,
    interactive_id: &str,
) -> Option<&'a FlowTriggerInput<'a>> {
    let normalized_text = normalize(full_text);
    let normalized_title = normalize(interactive_title);
    let normalized_id = normalize(interactive_id);
    let keywords = keyword_candidates(full_text, interactive_title, interactive_id);

    let mut best: Option<(&FlowTriggerInput, i32)> = None;
    let mut best_default: Option<&FlowTriggerInput> = None;

    for candidate in candidates {
        let trigger = normalize(candidate.trigger);
        if trigger.is_empty() {
            continue;
        }

        if trigger == DEFAULT_KEYWORD {
            if best_default.map_or(true, |d| candidate.updated_at > d.updated_at) {
                best_default = Some(candidate);
            }
            continue;
        }

        let matched = keywords.iter().any(|k| k == &trigger)
            || normalized_text.contains(&trigger)
            || normalized_title.contains(&trigger)
            || normalized_id == trigger;

        if !matched {
            continue;
        }

        let mut score = 6;
        if normalized_text == trigger {
            score += 2;
        }
        if normalized_title == trigger {
            score += 1;
        }
        if normalized_id == trigger {
            score += 1;
        }

        best = match best {
            Some((current, current_score)) if current_score > score => Some((current, current_score)),
            Some((current, current_score))
                if current_score == score && current.updated_at >= candidate.updated_at =>
            {
                Some((current, current_score))
            }
            _ => Some((candidate, score)),
        };
    }

    if let Some((flow, _)) = best {
        return Some(flow);
    }
    if let Some(default_flow) = best_default {
        return Some(default_flow);
    }
    candidates.first()
}

/// A trigger node within an already-selected flow: its node id and
/// keyword. Matching here only considers inbound text (no interactive
/// fields, per §4.3).
pub struct TriggerNodeInput<'a> {
    pub node_id: &'a str,
    pub keyword: &'a str,
}

/// Select the first trigger node whose keyword matches `text`, else the
/// first `default`-keyword node, else `None` (inbound is dropped).
pub fn select_trigger_node<'a>(
    nodes: &'a [TriggerNodeInput<'a>],
    text: &str,
) -> Option<&'a TriggerNodeInput<'a>> {
    let normalized_text = normalize(text);
    let keywords = keyword_candidates(text, "", "");

    let mut default_node = None;
    for node in nodes {
        let keyword = normalize(node.keyword);
        if keyword.is_empty() {
            continue;
        }
        if keyword == DEFAULT_KEYWORD {
            if default_node.is_none() {
                default_node = Some(node);
            }
            continue;
        }
        if keywords.iter().any(|k| k == &keyword) || normalized_text.contains(&keyword) {
            return Some(node);
        }
    }
    default_node
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[test]
    fn normalize_is_idempotent_and_diacritic_insensitive() {
        let s = "DEFÁULT";
        let once = normalize(s);
        assert_eq!(once, normalize(&once));
        assert_eq!(once, "default");
    }

    #[test]
    fn exact_match_outscores_substring_match() {
        let a = FlowTriggerInput { id: "a", trigger: "hola", updated_at: ts(1) };
        let b = FlowTriggerInput { id: "b", trigger: "ho", updated_at: ts(1) };
        let flows = vec![a, b];
        let chosen = select_flow(&flows, "hola", "", "").unwrap();
        assert_eq!(chosen.id, "a");
    }

    #[test]
    fn falls_back_to_default_when_nothing_scores() {
        let a = FlowTriggerInput { id: "a", trigger: "bye", updated_at: ts(1) };
        let def = FlowTriggerInput { id: "default-flow", trigger: "Default", updated_at: ts(2) };
        let flows = vec![a, def];
        let chosen = select_flow(&flows, "unrelated text", "", "").unwrap();
        assert_eq!(chosen.id, "default-flow");
    }

    #[test]
    fn falls_back_to_first_candidate_with_no_default() {
        let a = FlowTriggerInput { id: "a", trigger: "bye", updated_at: ts(1) };
        let flows = vec![a];
        let chosen = select_flow(&flows, "unrelated", "", "").unwrap();
        assert_eq!(chosen.id, "a");
    }

    #[test]
    fn tie_break_prefers_more_recently_updated() {
        let a = FlowTriggerInput { id: "a", trigger: "hola", updated_at: ts(1) };
        let b = FlowTriggerInput { id: "b", trigger: "hola", updated_at: ts(2) };
        let flows = vec![a, b];
        let chosen = select_flow(&flows, "hola", "", "").unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[test]
    fn trigger_node_first_match_wins_over_default() {
        let nodes = vec![
            TriggerNodeInput { node_id: "default", keyword: "default" },
            TriggerNodeInput { node_id: "hola", keyword: "hola" },
        ];
        let chosen = select_trigger_node(&nodes, "hola").unwrap();
        assert_eq!(chosen.node_id, "hola");
    }

    #[test]
    fn trigger_node_none_when_no_match_and_no_default() {
        let nodes = vec![TriggerNodeInput { node_id: "hola", keyword: "hola" }];
        assert!(select_trigger_node(&nodes, "bye").is_none());
    }
}
