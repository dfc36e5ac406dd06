use scraper::{ElementRef, Html, Selector};

use crate::dom::{self, CandidateFeatures, ContentElement};
use crate::error::DetectError;
use crate::score::{SCORE_THRESHOLD, score_candidate};

/// Minimum aggregate words the winning candidate must carry.
const MIN_RESULT_WORDS: usize = 50;

/// Site-specific selectors for platforms known to mark their primary
/// content, highest priority first.
const SITE_SELECTORS: &[&str] = &[
    "article section[data-field='body']",
    "[data-selectable-paragraph]",
    ".available-content",
    ".notion-page-content",
    ".markdown-body",
    ".js-post-body",
    "#mw-content-text .mw-parser-output",
    "[data-testid='post-container']",
    ".theme-doc-markdown",
    ".devsite-article-body",
    ".crayons-article__main",
];

/// Conventional content-container class/id markers used across CMSes, blogs,
/// and documentation sites, highest priority first.
const CLASS_SELECTORS: &[&str] = &[
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".post-body",
    ".story-body",
    ".content-body",
    ".main-content",
    ".page-content",
    ".blog-post",
    ".rich-text",
    ".prose",
    "#article",
    "#post",
    "#main-content",
    "#content",
    ".content",
];

/// One step of the detection cascade. Strategies are independent and
/// unit-testable with synthetic documents; the cascade is a fold stopping at
/// the first `Some`.
pub trait DetectionStrategy {
    fn name(&self) -> &'static str;
    fn try_detect(&self, doc: &Html) -> Option<ContentElement>;
}

/// The fixed cascade, in priority order.
pub fn strategies() -> Vec<Box<dyn DetectionStrategy>> {
    vec![
        Box::new(SiteSpecific),
        Box::new(SemanticTag),
        Box::new(ClassPattern),
        Box::new(HeuristicScoring),
        Box::new(PlatformFallback),
        Box::new(EmergencyFallback),
    ]
}

/// Finds the single best readable-content region of the document.
///
/// Strategy order decides, not content size: the first strategy producing a
/// qualifying candidate short-circuits the rest. A candidate under the
/// minimum word count is discarded and the next strategy gets its turn.
/// Never panics on arbitrary markup; an undetectable page is a `NotFound`,
/// not a failure.
pub fn detect(doc: &Html) -> Result<ContentElement, DetectError> {
    for strategy in strategies() {
        let Some(candidate) = strategy.try_detect(doc) else {
            continue;
        };

        let words = candidate.word_count();
        if words < MIN_RESULT_WORDS {
            tracing::debug!(
                strategy = strategy.name(),
                words,
                "candidate below minimum word count; trying next strategy"
            );
            continue;
        }

        tracing::debug!(strategy = strategy.name(), words, "content detected");
        return Ok(candidate);
    }

    Err(DetectError::NotFound)
}

/// Minimum-text/structure bar a candidate must clear to be accepted.
fn is_significant(element: &ContentElement) -> bool {
    let words = element.word_count();
    (element.text.len() > 100 && words > 20)
        || (element.paragraph_like_count() >= 3 && words > 10)
}

fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(err) => {
            tracing::warn!(selector = raw, ?err, "invalid selector; skipping");
            None
        }
    }
}

pub struct SiteSpecific;

impl DetectionStrategy for SiteSpecific {
    fn name(&self) -> &'static str {
        "site-specific"
    }

    fn try_detect(&self, doc: &Html) -> Option<ContentElement> {
        for raw in SITE_SELECTORS {
            let Some(selector) = parse_selector(raw) else {
                continue;
            };
            let parts = doc
                .select(&selector)
                .filter_map(ContentElement::from_element)
                .collect::<Vec<_>>();
            if parts.is_empty() {
                continue;
            }

            let combined = ContentElement::synthetic(parts)?;
            if combined.text.len() > 100 {
                return Some(combined);
            }
        }
        None
    }
}

pub struct SemanticTag;

impl DetectionStrategy for SemanticTag {
    fn name(&self) -> &'static str {
        "semantic-tag"
    }

    fn try_detect(&self, doc: &Html) -> Option<ContentElement> {
        for raw in ["article", "main", "[role='main']"] {
            let Some(selector) = parse_selector(raw) else {
                continue;
            };
            for matched in doc.select(&selector) {
                let Some(candidate) = ContentElement::from_element(matched) else {
                    continue;
                };
                if is_significant(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

pub struct ClassPattern;

impl DetectionStrategy for ClassPattern {
    fn name(&self) -> &'static str {
        "class-pattern"
    }

    fn try_detect(&self, doc: &Html) -> Option<ContentElement> {
        for raw in CLASS_SELECTORS {
            let Some(selector) = parse_selector(raw) else {
                continue;
            };
            for matched in doc.select(&selector) {
                let Some(candidate) = ContentElement::from_element(matched) else {
                    continue;
                };
                if is_significant(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

pub struct HeuristicScoring;

impl DetectionStrategy for HeuristicScoring {
    fn name(&self) -> &'static str {
        "heuristic-scoring"
    }

    fn try_detect(&self, doc: &Html) -> Option<ContentElement> {
        let selector = parse_selector("div, section, article, [role='main']")?;

        let mut best: Option<(f32, ElementRef<'_>)> = None;
        for (index, element) in doc.select(&selector).enumerate() {
            let features = CandidateFeatures::from_element(element, index);
            let score = score_candidate(&features);
            if score <= SCORE_THRESHOLD {
                continue;
            }
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, element)),
            }
        }

        let (score, element) = best?;
        tracing::debug!(score, "best heuristic candidate");
        ContentElement::from_element(element)
    }
}

pub struct PlatformFallback;

impl DetectionStrategy for PlatformFallback {
    fn name(&self) -> &'static str {
        "platform-fallback"
    }

    /// Looser text-length-driven search for markup that resists selectors
    /// and scoring: picks the generic container with the most own text.
    fn try_detect(&self, doc: &Html) -> Option<ContentElement> {
        let selector = parse_selector("div, section, td")?;

        let mut best: Option<(usize, ElementRef<'_>)> = None;
        for element in doc.select(&selector) {
            if dom::is_noise_element(element) {
                continue;
            }
            let own_len = dom::own_text(element).len();
            if own_len < 200 {
                continue;
            }
            match best {
                Some((best_len, _)) if best_len >= own_len => {}
                _ => best = Some((own_len, element)),
            }
        }

        ContentElement::from_element(best?.1)
    }
}

pub struct EmergencyFallback;

/// How many of the largest text-bearing elements the emergency fallback
/// concatenates.
const EMERGENCY_TOP_N: usize = 20;

impl DetectionStrategy for EmergencyFallback {
    fn name(&self) -> &'static str {
        "emergency-fallback"
    }

    fn try_detect(&self, doc: &Html) -> Option<ContentElement> {
        let mut parts = Vec::new();
        for element in dom::all_elements(doc) {
            if dom::is_noise_element(element) {
                continue;
            }

            let own = dom::own_text(element);
            if own.len() < 50 {
                continue;
            }

            // Skip link farms: mostly anchor text.
            let features = CandidateFeatures::from_element(element, 0);
            if features.text_len > 0
                && features.link_text_len as f32 / features.text_len as f32 > 0.5
            {
                continue;
            }

            parts.push(own);
        }

        if parts.is_empty() {
            return None;
        }

        parts.sort_by_key(|text| std::cmp::Reverse(text.split_whitespace().count()));
        parts.truncate(EMERGENCY_TOP_N);

        Some(ContentElement {
            tag: "div".to_owned(),
            text: parts.join("\n\n"),
            child_count: parts.len(),
            blocks: parts
                .into_iter()
                .map(|text| crate::dom::TextBlock {
                    kind: crate::dom::BlockKind::Paragraph,
                    text,
                })
                .collect(),
            has_headings: false,
            has_lists: false,
            has_blockquotes: false,
        })
    }
}
