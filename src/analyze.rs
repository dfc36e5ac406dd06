use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::{BlockKind, ContentElement};
use crate::error::AnalyzeError;

/// Character cap applied before content is handed to the provider.
pub const MAX_CONTENT_CHARS: usize = 15_000;

const ELLIPSIS: &str = "...";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://|www\.)\S+").expect("url pattern is valid")
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern is valid")
});

static BRACKET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]\n]{0,80}\]|\{[^}\n]{0,80}\}").expect("bracket pattern is valid")
});

static TABLE_RESIDUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[\s|:+=-]{4,}$|\|{2,}").expect("table residue pattern is valid")
});

/// Quality metrics computed during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub word_count: usize,
    pub char_count: usize,
    pub avg_word_length: f64,
    pub unique_word_ratio: f64,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub metrics: ValidationMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Technical,
    LongForm,
    Article,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub word_count: usize,
    pub sentence_count: usize,
    pub char_count: usize,
    /// Flesch-style reading ease estimate; higher is easier.
    pub readability: f64,
    pub content_type: ContentType,
    pub has_headings: bool,
    pub has_lists: bool,
    pub has_blockquotes: bool,
}

/// Immutable result of one analysis pass. Derived from a detected region on
/// demand; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub raw_text: String,
    pub cleaned_text: String,
    /// AI-ready content: structure-annotated and capped at
    /// [`MAX_CONTENT_CHARS`] (plus the ellipsis marker on a hard cut).
    pub processed_content: String,
    pub metadata: ContentMetadata,
    pub validation: ValidationReport,
}

/// Runs the full pipeline: extraction, cleaning, validation, AI preparation,
/// metadata. Each stage is a pure function of its input.
pub fn analyze(element: &ContentElement, source_url: Option<&Url>) -> Result<AnalysisResult, AnalyzeError> {
    let raw_text = extract_text(element);
    let cleaned_text = clean_text(&raw_text);
    let validation = validate(&cleaned_text);

    if !validation.is_valid {
        return Err(validation_error(validation));
    }

    let processed_content = prepare_for_ai(&cleaned_text);
    let metadata = build_metadata(&cleaned_text, element, source_url, &validation);

    Ok(AnalysisResult {
        raw_text,
        cleaned_text,
        processed_content,
        metadata,
        validation,
    })
}

fn validation_error(report: ValidationReport) -> AnalyzeError {
    // The first failed gate decides the variant; size gates come first
    // because a too-short text trivially fails the structural gates too.
    if report.metrics.char_count < 100 || report.metrics.word_count < 20 {
        AnalyzeError::ContentTooShort(report)
    } else if report.metrics.unique_word_ratio < 0.30 {
        AnalyzeError::Repetitive(report)
    } else {
        AnalyzeError::StructureInsufficient(report)
    }
}

/// Stage 1: concatenated text of content-bearing blocks, blank-line
/// separated. Non-content categories were already stripped when the
/// element was snapshotted; blocks without a content kind are a fallback.
pub fn extract_text(element: &ContentElement) -> String {
    let content_blocks = element
        .blocks
        .iter()
        .filter(|b| {
            matches!(
                b.kind,
                BlockKind::Paragraph
                    | BlockKind::Heading
                    | BlockKind::ListItem
                    | BlockKind::Quote
                    | BlockKind::Code
            )
        })
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>();

    if content_blocks.is_empty() {
        return element.text.clone();
    }
    content_blocks.join("\n\n")
}

/// Stage 2: whitespace collapse, punctuation normalization, artifact and
/// URL/e-mail removal. Paragraph separators are preserved.
pub fn clean_text(text: &str) -> String {
    let mut out = text.replace("\r\n", "\n").replace('\r', "\n");

    for (from, to) in [
        ('\u{2018}', '\''),
        ('\u{2019}', '\''),
        ('\u{201C}', '"'),
        ('\u{201D}', '"'),
        ('\u{00A0}', ' '),
    ] {
        out = out.replace(from, &to.to_string());
    }
    out = out.replace('\u{2026}', "...");

    out = URL_PATTERN.replace_all(&out, "").into_owned();
    out = EMAIL_PATTERN.replace_all(&out, "").into_owned();
    out = BRACKET_PATTERN.replace_all(&out, "").into_owned();
    out = TABLE_RESIDUE_PATTERN.replace_all(&out, "").into_owned();

    // Collapse runs of spaces/tabs per line, then runs of blank lines.
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();
    for line in out.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current = Vec::new();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n").trim().to_owned()
}

/// Stage 3: quality gates. Length > 2x the processing cap is a warning
/// (content will be truncated downstream), never a failure.
pub fn validate(text: &str) -> ValidationReport {
    let metrics = compute_metrics(text);
    let mut issues = Vec::new();

    if metrics.char_count < 100 {
        issues.push("too short".to_owned());
    }
    if metrics.word_count < 20 {
        issues.push("too few words".to_owned());
    }
    if metrics.unique_word_ratio < 0.30 {
        issues.push("repetitive content".to_owned());
    }
    if metrics.sentence_count < 3 {
        issues.push("too few sentences".to_owned());
    }

    let is_valid = issues.is_empty();

    if metrics.char_count > 2 * MAX_CONTENT_CHARS {
        issues.push("content exceeds the processing cap and will be truncated".to_owned());
    }

    ValidationReport {
        is_valid,
        issues,
        metrics,
    }
}

fn compute_metrics(text: &str) -> ValidationMetrics {
    let words = text.split_whitespace().collect::<Vec<_>>();
    let word_count = words.len();
    let char_count = text.chars().count();

    let avg_word_length = if word_count == 0 {
        0.0
    } else {
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / word_count as f64
    };

    let unique = words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<HashSet<_>>()
        .len();
    let unique_word_ratio = if word_count == 0 {
        0.0
    } else {
        unique as f64 / word_count as f64
    };

    let sentence_count = split_sentences(text).len();
    let avg_sentence_length = if sentence_count == 0 {
        0.0
    } else {
        word_count as f64 / sentence_count as f64
    };

    ValidationMetrics {
        word_count,
        char_count,
        avg_word_length,
        unique_word_ratio,
        sentence_count,
        avg_sentence_length,
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.split_whitespace().next().is_some())
        .collect()
}

/// Stage 4: structure markers plus the character cap.
///
/// Paragraph markers give the model positional context: the first paragraph
/// is `[intro]`, the last `[conclusion]`, short non-terminal paragraphs are
/// `[heading]`, everything else `[content]`.
pub fn prepare_for_ai(cleaned: &str) -> String {
    let paragraphs = cleaned.split("\n\n").collect::<Vec<_>>();
    let last = paragraphs.len().saturating_sub(1);

    let annotated = paragraphs
        .iter()
        .enumerate()
        .map(|(i, paragraph)| {
            let marker = if i == 0 && paragraphs.len() > 1 {
                "intro"
            } else if i == last && paragraphs.len() > 1 {
                "conclusion"
            } else if looks_like_heading(paragraph) {
                "heading"
            } else {
                "content"
            };
            format!("[{marker}] {paragraph}")
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_at_boundary(&annotated, MAX_CONTENT_CHARS)
}

fn looks_like_heading(paragraph: &str) -> bool {
    let words = paragraph.split_whitespace().count();
    words > 0 && words <= 8 && !paragraph.trim_end().ends_with(['.', '!', '?'])
}

/// Cuts `text` to at most `cap` characters, preferring a sentence or
/// paragraph boundary when one falls within the last 20% of the cap;
/// otherwise a hard cut plus an ellipsis marker. The cap counts characters,
/// matching the validation metrics, not bytes.
pub fn truncate_at_boundary(text: &str, cap: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(cap) else {
        return text.to_owned();
    };
    let window = &text[..cut];

    // Byte offset of the character that opens the last 20% of the window.
    let window_start = text
        .char_indices()
        .nth(cap - cap / 5)
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    let sentence_end = [". ", "! ", "? "]
        .iter()
        .filter_map(|sep| window.rfind(sep).map(|idx| idx + 1))
        .max();
    let paragraph_end = window.rfind("\n\n");

    let boundary = match (sentence_end, paragraph_end) {
        (Some(s), Some(p)) => Some(s.max(p)),
        (Some(s), None) => Some(s),
        (None, Some(p)) => Some(p),
        (None, None) => None,
    };

    if let Some(boundary) = boundary
        && boundary >= window_start
    {
        return window[..boundary].trim_end().to_owned();
    }

    let mut out = window.trim_end().to_owned();
    out.push_str(ELLIPSIS);
    out
}

/// Stage 5: counts, readability, and content-type classification.
fn build_metadata(
    cleaned: &str,
    element: &ContentElement,
    source_url: Option<&Url>,
    validation: &ValidationReport,
) -> ContentMetadata {
    ContentMetadata {
        word_count: validation.metrics.word_count,
        sentence_count: validation.metrics.sentence_count,
        char_count: validation.metrics.char_count,
        readability: readability_score(cleaned),
        content_type: classify_content(cleaned, element, source_url),
        has_headings: element.has_headings,
        has_lists: element.has_lists,
        has_blockquotes: element.has_blockquotes,
    }
}

/// Simplified Flesch reading ease, with syllables estimated by counting
/// vowel groups.
pub fn readability_score(text: &str) -> f64 {
    let words = text.split_whitespace().collect::<Vec<_>>();
    let word_count = words.len();
    let sentence_count = split_sentences(text).len().max(1);
    if word_count == 0 {
        return 0.0;
    }

    let syllables = words.iter().map(|w| estimate_syllables(w)).sum::<usize>();

    let words_per_sentence = word_count as f64 / sentence_count as f64;
    let syllables_per_word = syllables as f64 / word_count as f64;

    (206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word).clamp(0.0, 121.22)
}

fn estimate_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut groups = 0;
    let mut in_group = false;
    for ch in word.chars() {
        let is_vowel = matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !in_group {
            groups += 1;
        }
        in_group = is_vowel;
    }

    // Trailing silent e.
    if groups > 1 && word.ends_with('e') && !word.ends_with("le") {
        groups -= 1;
    }
    groups.max(1)
}

static TECHNICAL_DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(github\.|stackoverflow\.|docs\.|developer\.|\.dev$|api\.)")
        .expect("technical domain pattern is valid")
});

fn classify_content(
    cleaned: &str,
    element: &ContentElement,
    source_url: Option<&Url>,
) -> ContentType {
    let has_code = element.blocks.iter().any(|b| b.kind == BlockKind::Code);
    if has_code {
        return ContentType::Technical;
    }

    if let Some(url) = source_url {
        let host = url.host_str().unwrap_or_default();
        if TECHNICAL_DOMAIN_PATTERN.is_match(host) || url.path().contains("/docs/") {
            return ContentType::Technical;
        }
    }

    let word_count = cleaned.split_whitespace().count();
    if element.has_headings && word_count > 1500 {
        return ContentType::LongForm;
    }

    ContentType::Article
}

/// JSON report emitted by the `analyze` command.
#[derive(Debug, Serialize)]
struct AnalyzeReport<'a> {
    page: &'a crate::page::PageAnalysis,
    metadata: Option<&'a ContentMetadata>,
    validation: Option<&'a ValidationReport>,
}

pub async fn run(args: crate::cli::AnalyzeArgs) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let settings =
        crate::config::Settings::load(args.settings.as_deref()).context("load settings")?;

    let (html, source_url) = crate::fetch::load_input(args.input.as_deref(), args.url.as_deref())
        .await
        .context("load input document")?;

    let doc = scraper::Html::parse_document(&html);
    let page = crate::page::analyze_page(&doc, source_url.as_ref());

    // Validation failure is part of the report here, not a command failure.
    let analysis = page
        .main_content
        .as_ref()
        .map(|element| analyze(element, source_url.as_ref()));

    let report = match &analysis {
        Some(Ok(result)) => AnalyzeReport {
            page: &page,
            metadata: Some(&result.metadata),
            validation: Some(&result.validation),
        },
        Some(Err(err)) => {
            tracing::warn!(error = %err, "detected content failed validation");
            AnalyzeReport {
                page: &page,
                metadata: None,
                validation: Some(err.report()),
            }
        }
        None => AnalyzeReport {
            page: &page,
            metadata: None,
            validation: None,
        },
    };

    let json = serde_json::to_string_pretty(&report).context("serialize analysis report")?;
    println!("{json}");

    // With auto-summarize on, an article page gets a quick summary in the
    // same run, using the configured preferred length.
    if settings.auto_summarize
        && page.is_article
        && let Some(Ok(result)) = &analysis
    {
        tracing::info!("auto-summarize enabled; generating quick summary");
        let preferred_length = settings.preferred_length;
        let orchestrator = crate::summarize::Orchestrator::new(settings)?;
        let options = crate::summarize::SummaryOptions {
            max_length: preferred_length,
            ..Default::default()
        };
        let summary = orchestrator
            .generate(result, &options)
            .await
            .context("auto-summarize")?;
        let json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
        println!("{json}");
    }

    Ok(())
}
