use std::sync::LazyLock;

use regex::Regex;

use crate::dom::CandidateFeatures;

/// Minimum score a heuristic candidate must exceed to be selected.
pub const SCORE_THRESHOLD: f32 = 20.0;

/// Candidates this early in document order get the viewport bonus. There is
/// no layout engine here, so "intersects the initial viewport" is
/// approximated by document-order position.
const VIEWPORT_POSITION_LIMIT: usize = 10;

static CONTENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(content|article|post|entry|main|story)").expect("content pattern is valid")
});

static BODY_TEXT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(body|text|copy|prose)").expect("body text pattern is valid")
});

static PLATFORM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(markdown-body|mw-content|notion-page|available-content|post-body|crayons)")
        .expect("platform pattern is valid")
});

/// Heuristic content score for one candidate node. Pure over its features:
/// the same features always produce the same score, so the weights can be
/// tested without a live document.
pub fn score_candidate(features: &CandidateFeatures) -> f32 {
    let mut score = 0.0_f32;

    // Text density: how much of the markup is readable text.
    let density = features.text_len as f32 / features.markup_len.max(1) as f32;
    score += 25.0 * density;

    score += (3.0 * features.paragraph_count as f32).min(20.0);

    if features.word_count > 100 {
        score += 15.0;
    }
    if features.word_count > 300 {
        score += 10.0;
    }
    if features.word_count > 500 {
        score += 5.0;
    }

    score += (2.0 * features.heading_count as f32).min(10.0);
    score += (0.5 * features.list_item_count as f32).min(5.0);

    if CONTENT_PATTERN.is_match(&features.class_and_id) {
        score += 15.0;
    }
    if BODY_TEXT_PATTERN.is_match(&features.class_and_id) {
        score += 10.0;
    }
    if PLATFORM_PATTERN.is_match(&features.class_and_id) {
        score += 8.0;
    }
    if features.has_paragraph_marker {
        score += 20.0;
    }

    score -= (5.0 * features.nav_count as f32).min(15.0);
    score -= (2.0 * features.form_count as f32).min(10.0);
    score -= (8.0 * features.ad_count as f32).min(20.0);
    score -= (3.0 * features.social_count as f32).min(10.0);

    score -= link_ratio_penalty(features);

    if features.position_index < VIEWPORT_POSITION_LIMIT {
        score += 5.0;
    }

    score.max(0.0)
}

/// Penalty proportional to how far the link-to-text ratio exceeds the
/// allowance of 0.1 per 50 words.
fn link_ratio_penalty(features: &CandidateFeatures) -> f32 {
    if features.text_len == 0 {
        return 0.0;
    }

    let ratio = features.link_text_len as f32 / features.text_len as f32;
    let allowed = 0.1 * (features.word_count as f32 / 50.0).max(1.0);
    if ratio <= allowed {
        return 0.0;
    }

    (ratio - allowed) * 50.0
}
