use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::analyze::AnalysisResult;
use crate::cli::HighlightArgs;
use crate::config::Settings;
use crate::error::SummarizeError;
use crate::summarize::Orchestrator;

const HIGHLIGHT_INSTRUCTIONS: &str = "You are a highlighting engine.\n\
Task: Select the sentences worth highlighting in the content between BEGIN_CONTENT and END_CONTENT.\n\
\n\
Rules:\n\
- Copy each sentence EXACTLY as it appears in the content, character for character.\n\
- Group sentences by importance into `high`, `medium`, and `low`.\n\
- At most 5 sentences per group; groups may be empty.\n\
- Output ONLY a JSON object with exactly the keys `high`, `medium`, and `low`, each a JSON array of strings (no markdown fences, no commentary).\n";

/// Sentences to highlight, grouped by importance. `deny_unknown_fields`
/// keeps drifting provider output from silently passing validation.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Highlights {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl Highlights {
    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.medium.is_empty() && self.low.is_empty()
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }
}

/// Asks the provider for highlight-worthy spans and keeps only the ones that
/// occur verbatim in the cleaned content. Spans the model paraphrased are
/// dropped, not matched fuzzily; a missing span cannot be anchored on the
/// page.
pub async fn generate(
    orchestrator: &Orchestrator,
    analysis: &AnalysisResult,
) -> Result<Highlights, SummarizeError> {
    let raw = orchestrator
        .request_structured(HIGHLIGHT_INSTRUCTIONS, &analysis.processed_content)
        .await?;
    let highlights = parse_highlights(&raw)?;
    Ok(retain_verbatim(highlights, &analysis.cleaned_text))
}

pub(crate) fn parse_highlights(raw: &str) -> Result<Highlights, SummarizeError> {
    let json = extract_json_object(raw)?;
    serde_json::from_str(json)
        .map_err(|err| SummarizeError::ParseFailure(format!("expected highlight groups: {err}")))
}

fn extract_json_object(text: &str) -> Result<&str, SummarizeError> {
    let start = text
        .find('{')
        .ok_or_else(|| SummarizeError::ParseFailure("missing `{` in response".to_owned()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| SummarizeError::ParseFailure("missing `}` in response".to_owned()))?;
    if end <= start {
        return Err(SummarizeError::ParseFailure(
            "invalid json object span".to_owned(),
        ));
    }
    Ok(&text[start..=end])
}

pub(crate) fn retain_verbatim(mut highlights: Highlights, content: &str) -> Highlights {
    let before = highlights.len();
    let keep = |span: &String| !span.trim().is_empty() && content.contains(span.as_str());
    highlights.high.retain(keep);
    highlights.medium.retain(keep);
    highlights.low.retain(keep);

    let dropped = before - highlights.len();
    if dropped > 0 {
        tracing::debug!(dropped, kept = highlights.len(), "dropped non-verbatim highlight spans");
    }
    highlights
}

pub async fn run(args: HighlightArgs) -> anyhow::Result<()> {
    let settings = Settings::load(args.settings.as_deref()).context("load settings")?;

    let (html, source_url) = crate::fetch::load_input(args.input.as_deref(), args.url.as_deref())
        .await
        .context("load input document")?;

    let doc = scraper::Html::parse_document(&html);
    let element = crate::detect::detect(&doc).context("nothing to highlight")?;
    let analysis =
        crate::analyze::analyze(&element, source_url.as_ref()).context("nothing to highlight")?;

    let orchestrator = Orchestrator::new(settings).context("build orchestrator")?;
    let highlights = generate(&orchestrator, &analysis)
        .await
        .context("highlight extraction failed")?;

    let json = serde_json::to_string_pretty(&highlights).context("serialize highlights")?;
    println!("{json}");
    Ok(())
}
