use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::analyze::AnalysisResult;
use crate::cache::{self, CacheStore};
use crate::cli::SummarizeArgs;
use crate::config::{MaxLength, Settings};
use crate::error::SummarizeError;
use crate::openai;

/// Provider dispatch attempts per request, with exponential backoff between
/// them (1s, 2s, 4s).
const MAX_ATTEMPTS: usize = 3;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Sampling temperature for free-text outputs.
const TEXT_TEMPERATURE: f32 = 0.3;

/// Sampling temperature for format-sensitive outputs (JSON lists,
/// classification) where determinism matters more than variety.
const STRUCTURED_TEMPERATURE: f32 = 0.1;

/// Which summary formats to produce and at what length. Serialized into the
/// cache fingerprint, except `force_regenerate` which only controls lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub include_quick_summary: bool,
    pub include_detailed_summary: bool,
    pub include_key_points: bool,
    pub include_action_items: bool,
    pub include_eli15: bool,
    pub include_concepts: bool,
    pub max_length: MaxLength,
    pub force_regenerate: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            include_quick_summary: true,
            include_detailed_summary: false,
            include_key_points: false,
            include_action_items: false,
            include_eli15: false,
            include_concepts: false,
            max_length: MaxLength::Medium,
            force_regenerate: false,
        }
    }
}

impl SummaryOptions {
    /// Stable serialization for fingerprinting. `force_regenerate` is
    /// deliberately absent.
    pub fn canonical_key(&self) -> String {
        format!(
            "quick={}|detailed={}|points={}|actions={}|eli={}|concepts={}|len={}",
            self.include_quick_summary as u8,
            self.include_detailed_summary as u8,
            self.include_key_points as u8,
            self.include_action_items as u8,
            self.include_eli15 as u8,
            self.include_concepts as u8,
            self.max_length.as_str(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub term: String,
    pub definition: String,
    pub analogy: String,
}

/// All generated summary formats for one piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    pub quick_summary: String,
    pub detailed_summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub eli_summary: String,
    pub concepts: Vec<Concept>,
    pub difficulty_level: String,
    pub timestamp: DateTime<Utc>,
}

impl Default for SummaryData {
    fn default() -> Self {
        Self {
            quick_summary: String::new(),
            detailed_summary: String::new(),
            key_points: Vec::new(),
            action_items: Vec::new(),
            eli_summary: String::new(),
            concepts: Vec::new(),
            difficulty_level: String::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Status transitions surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStatus {
    Ready,
    Processing,
    Completed,
    Error,
}

/// The presentation layer's side of the contract. Out of scope here beyond
/// this seam; the CLI prints, a real overlay would render.
pub trait Presenter {
    fn status(&self, status: SummaryStatus);
    fn show(&self, summary: &SummaryData);
}

/// Local request throttle: a rolling-window bound plus a minimum
/// inter-request delay. Exceeding the window rejects with `RateLimited`
/// rather than silently dropping; the short delay just sleeps.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    min_interval: Duration,
    recent: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration, min_interval: Duration) -> Self {
        Self {
            max_per_window,
            window,
            min_interval,
            recent: VecDeque::new(),
        }
    }

    pub async fn acquire(&mut self) -> Result<(), SummarizeError> {
        let now = Instant::now();
        while let Some(front) = self.recent.front() {
            if now.duration_since(*front) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        if self.recent.len() >= self.max_per_window {
            tracing::warn!(
                requests = self.recent.len(),
                window_secs = self.window.as_secs(),
                "local rate limit reached"
            );
            return Err(SummarizeError::RateLimited);
        }

        if let Some(last) = self.recent.back() {
            let since_last = now.duration_since(*last);
            if since_last < self.min_interval {
                tokio::time::sleep(self.min_interval - since_last).await;
            }
        }

        self.recent.push_back(Instant::now());
        Ok(())
    }
}

/// Builds prompts, enforces cache/rate-limit/dedup policy, dispatches to the
/// provider, and parses responses. Every call takes immutable snapshots
/// (`AnalysisResult`, `SummaryOptions`); the only state is the cache, the
/// limiter, and the in-flight map.
pub struct Orchestrator {
    settings: Settings,
    client: reqwest::Client,
    endpoint: String,
    cache: Mutex<CacheStore>,
    limiter: Mutex<RateLimiter>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("build http client")?;
        let cache = CacheStore::load(&settings.cache_path).context("load summary cache")?;
        let endpoint = openai::responses_endpoint(&settings.base_url);
        let limiter = RateLimiter::new(
            settings.max_requests_per_hour,
            Duration::from_secs(3600),
            settings.min_request_interval,
        );

        Ok(Self {
            settings,
            client,
            endpoint,
            cache: Mutex::new(cache),
            limiter: Mutex::new(limiter),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Generates all requested summary formats, consulting the cache first.
    ///
    /// At most one provider request is in flight per cache key: concurrent
    /// callers for the same content await the first caller's result and then
    /// observe it as a cache hit. `force_regenerate` bypasses the lookup but
    /// still writes the fresh result.
    pub async fn generate(
        &self,
        analysis: &AnalysisResult,
        options: &SummaryOptions,
    ) -> Result<SummaryData, SummarizeError> {
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or(SummarizeError::NotConfigured)?;

        let key = cache::fingerprint(&analysis.processed_content, options);

        let gate = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(key.clone()).or_default().clone()
        };
        let guard = gate.lock().await;
        let result = self.generate_locked(&api_key, &key, analysis, options).await;
        drop(guard);

        // Prune the gate once the last caller is done with it, so the map
        // stays bounded by concurrency, not by distinct fingerprints seen.
        {
            let mut inflight = self.inflight.lock().await;
            // Our handle goes first; the map holding the only one left
            // means no caller is waiting.
            drop(gate);
            let unused = inflight
                .get(&key)
                .is_some_and(|entry| Arc::strong_count(entry) == 1);
            if unused {
                inflight.remove(&key);
            }
        }

        result
    }

    /// Lookup, dispatch, and store for one fingerprint. Callers must hold
    /// that fingerprint's gate.
    async fn generate_locked(
        &self,
        api_key: &str,
        key: &str,
        analysis: &AnalysisResult,
        options: &SummaryOptions,
    ) -> Result<SummaryData, SummarizeError> {
        if !options.force_regenerate
            && let Some(hit) = self.cache.lock().await.get(key)
        {
            tracing::debug!(key = %key, "summary cache hit");
            return Ok(hit.clone());
        }

        self.limiter.lock().await.acquire().await?;

        tracing::info!(key = %key, options = %options.canonical_key(), "generating summary");
        let summary = self.request_summary(api_key, analysis, options).await?;

        let mut cache = self.cache.lock().await;
        cache.put(key.to_owned(), summary.clone());
        cache
            .persist()
            .map_err(|err| SummarizeError::Cache(format!("{err:#}")))?;

        Ok(summary)
    }

    /// Per-fingerprint gates currently tracked; at most one per in-flight
    /// request.
    pub async fn inflight_len(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Same as [`generate`], with status transitions for a presenter.
    /// A presenter that goes away mid-request only loses the `show` call;
    /// the result is still cached for next access.
    pub async fn generate_and_show(
        &self,
        analysis: &AnalysisResult,
        options: &SummaryOptions,
        presenter: &dyn Presenter,
    ) -> Result<SummaryData, SummarizeError> {
        presenter.status(SummaryStatus::Processing);
        match self.generate(analysis, options).await {
            Ok(summary) => {
                presenter.status(SummaryStatus::Completed);
                presenter.show(&summary);
                Ok(summary)
            }
            Err(err) => {
                presenter.status(SummaryStatus::Error);
                Err(err)
            }
        }
    }

    /// Drops the cached entry for this content and generates afresh.
    pub async fn regenerate(
        &self,
        analysis: &AnalysisResult,
        options: &SummaryOptions,
    ) -> Result<SummaryData, SummarizeError> {
        let key = cache::fingerprint(&analysis.processed_content, options);
        self.cache.lock().await.remove(&key);

        let mut forced = options.clone();
        forced.force_regenerate = true;
        self.generate(analysis, &forced).await
    }

    pub async fn has_cached(&self, analysis: &AnalysisResult, options: &SummaryOptions) -> bool {
        let key = cache::fingerprint(&analysis.processed_content, options);
        self.cache.lock().await.contains(&key)
    }

    pub async fn clear_cache(&self) -> Result<(), SummarizeError> {
        let mut cache = self.cache.lock().await;
        cache.clear();
        cache
            .persist()
            .map_err(|err| SummarizeError::Cache(format!("{err:#}")))
    }

    async fn request_summary(
        &self,
        api_key: &str,
        analysis: &AnalysisResult,
        options: &SummaryOptions,
    ) -> Result<SummaryData, SummarizeError> {
        let content = &analysis.processed_content;
        let mut summary = SummaryData {
            difficulty_level: difficulty_level(analysis.metadata.readability).to_owned(),
            timestamp: Utc::now(),
            ..SummaryData::default()
        };

        if options.include_quick_summary {
            let instructions = quick_summary_instructions(options.max_length);
            summary.quick_summary = self
                .request_text(api_key, &instructions, content, TEXT_TEMPERATURE, options.max_length.max_output_tokens())
                .await?
                .trim()
                .to_owned();
        }

        if options.include_detailed_summary {
            summary.detailed_summary = self
                .request_text(
                    api_key,
                    DETAILED_INSTRUCTIONS,
                    content,
                    TEXT_TEMPERATURE,
                    options.max_length.max_output_tokens(),
                )
                .await?
                .trim()
                .to_owned();
        }

        if options.include_key_points {
            let raw = self
                .request_text(
                    api_key,
                    KEY_POINTS_INSTRUCTIONS,
                    content,
                    STRUCTURED_TEMPERATURE,
                    options.max_length.max_output_tokens(),
                )
                .await?;
            summary.key_points = parse_string_array(&raw)?;
        }

        if options.include_action_items {
            let raw = self
                .request_text(
                    api_key,
                    ACTION_ITEMS_INSTRUCTIONS,
                    content,
                    STRUCTURED_TEMPERATURE,
                    options.max_length.max_output_tokens(),
                )
                .await?;
            summary.action_items = parse_string_array(&raw)?;
        }

        if options.include_eli15 {
            summary.eli_summary = self
                .request_text(api_key, ELI15_INSTRUCTIONS, content, TEXT_TEMPERATURE, options.max_length.max_output_tokens())
                .await?
                .trim()
                .to_owned();
        }

        if options.include_concepts {
            let raw = self
                .request_text(
                    api_key,
                    CONCEPTS_INSTRUCTIONS,
                    content,
                    STRUCTURED_TEMPERATURE,
                    options.max_length.max_output_tokens(),
                )
                .await?;
            summary.concepts = parse_concepts(&raw)?;
        }

        Ok(summary)
    }

    /// One provider call with the retry/backoff policy: transient failures
    /// retry up to [`MAX_ATTEMPTS`]; credential and parse failures surface
    /// immediately.
    pub(crate) async fn request_text(
        &self,
        api_key: &str,
        instructions: &str,
        content: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, SummarizeError> {
        let input = format!("BEGIN_CONTENT\n{content}\nEND_CONTENT");
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            let result = openai::responses_text(
                &self.client,
                &self.endpoint,
                api_key,
                &self.settings.model,
                instructions,
                &input,
                temperature,
                max_output_tokens,
            )
            .await;

            match result {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        attempts = MAX_ATTEMPTS,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "provider request failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        }

        Err(SummarizeError::Transient(
            "provider retries exhausted".to_owned(),
        ))
    }

    /// A single rate-limited, low-temperature provider call outside the
    /// summary-format set. Used for highlight extraction.
    pub async fn request_structured(
        &self,
        instructions: &str,
        content: &str,
    ) -> Result<String, SummarizeError> {
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or(SummarizeError::NotConfigured)?;
        self.limiter.lock().await.acquire().await?;
        self.request_text(
            &api_key,
            instructions,
            content,
            STRUCTURED_TEMPERATURE,
            MaxLength::Medium.max_output_tokens(),
        )
        .await
    }
}

fn difficulty_level(readability: f64) -> &'static str {
    if readability >= 60.0 {
        "beginner"
    } else if readability >= 30.0 {
        "intermediate"
    } else {
        "advanced"
    }
}

fn quick_summary_instructions(max_length: MaxLength) -> String {
    let target = match max_length {
        MaxLength::Short => "2-3 sentences",
        MaxLength::Medium => "4-6 sentences",
        MaxLength::Long => "8-10 sentences",
    };
    format!(
        "You are a summarization engine.\n\
Task: Write a quick summary of the content between BEGIN_CONTENT and END_CONTENT.\n\
\n\
Rules:\n\
- The content is annotated with positional markers like [intro], [heading], [content], [conclusion]; use them for structure, never repeat them.\n\
- Length: {target}.\n\
- Output ONLY the summary as plain text (no markdown, no commentary).\n"
    )
}

const DETAILED_INSTRUCTIONS: &str = "You are a summarization engine.\n\
Task: Write a detailed summary of the content between BEGIN_CONTENT and END_CONTENT.\n\
\n\
Rules:\n\
- The content is annotated with positional markers like [intro], [heading], [content], [conclusion]; use them for structure, never repeat them.\n\
- Structure the summary as Markdown: `##` section headings with short paragraphs and bullet lists.\n\
- Output ONLY the Markdown summary.\n";

const KEY_POINTS_INSTRUCTIONS: &str = "You are a summarization engine.\n\
Task: Extract the key points of the content between BEGIN_CONTENT and END_CONTENT.\n\
\n\
Rules:\n\
- 5 to 7 points, each a single self-contained sentence.\n\
- Output ONLY a JSON array of strings (no markdown fences, no commentary).\n";

const ACTION_ITEMS_INSTRUCTIONS: &str = "You are a summarization engine.\n\
Task: Extract concrete action items a reader could take from the content between BEGIN_CONTENT and END_CONTENT.\n\
\n\
Rules:\n\
- Each item starts with a verb; omit items the content does not support.\n\
- Output ONLY a JSON array of strings (no markdown fences, no commentary).\n";

const ELI15_INSTRUCTIONS: &str = "You are a summarization engine.\n\
Task: Explain the content between BEGIN_CONTENT and END_CONTENT to a fifteen-year-old.\n\
\n\
Rules:\n\
- Plain words, short sentences, one or two everyday analogies.\n\
- Output ONLY the explanation as plain text.\n";

const CONCEPTS_INSTRUCTIONS: &str = "You are a summarization engine.\n\
Task: Identify the key concepts in the content between BEGIN_CONTENT and END_CONTENT.\n\
\n\
Rules:\n\
- 3 to 5 concepts.\n\
- Output ONLY a JSON array of objects with exactly the keys `term`, `definition`, and `analogy` (no markdown fences, no commentary).\n";

/// Locates the outermost JSON array in provider output. Models sometimes
/// wrap JSON in prose despite instructions; anything that still fails to
/// parse cleanly is a `ParseFailure`, never coerced.
fn extract_json_array(text: &str) -> Result<&str, SummarizeError> {
    let start = text
        .find('[')
        .ok_or_else(|| SummarizeError::ParseFailure("missing `[` in response".to_owned()))?;
    let end = text
        .rfind(']')
        .ok_or_else(|| SummarizeError::ParseFailure("missing `]` in response".to_owned()))?;
    if end <= start {
        return Err(SummarizeError::ParseFailure(
            "invalid json array span".to_owned(),
        ));
    }
    Ok(&text[start..=end])
}

pub(crate) fn parse_string_array(raw: &str) -> Result<Vec<String>, SummarizeError> {
    let json = extract_json_array(raw)?;
    let items: Vec<String> = serde_json::from_str(json)
        .map_err(|err| SummarizeError::ParseFailure(format!("expected a string array: {err}")))?;
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect())
}

pub(crate) fn parse_concepts(raw: &str) -> Result<Vec<Concept>, SummarizeError> {
    let json = extract_json_array(raw)?;
    serde_json::from_str(json)
        .map_err(|err| SummarizeError::ParseFailure(format!("expected concept objects: {err}")))
}

/// CLI presenter: status on stderr via tracing, summary as JSON on stdout.
struct CliPresenter;

impl Presenter for CliPresenter {
    fn status(&self, status: SummaryStatus) {
        tracing::info!(?status, "summary status");
    }

    fn show(&self, summary: &SummaryData) {
        match serde_json::to_string_pretty(summary) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::error!(?err, "serialize summary"),
        }
    }
}

pub async fn run(args: SummarizeArgs) -> anyhow::Result<()> {
    let mut settings = Settings::load(args.settings.as_deref()).context("load settings")?;
    if let Some(cache) = args.cache {
        settings.cache_path = cache;
    }

    let (html, source_url) = crate::fetch::load_input(args.input.as_deref(), args.url.as_deref())
        .await
        .context("load input document")?;

    let doc = scraper::Html::parse_document(&html);
    let element = crate::detect::detect(&doc).context("nothing to summarize")?;
    let analysis =
        crate::analyze::analyze(&element, source_url.as_ref()).context("nothing to summarize")?;

    let options = SummaryOptions {
        include_quick_summary: !args.no_quick,
        include_detailed_summary: args.detailed,
        include_key_points: args.key_points,
        include_action_items: args.action_items,
        include_eli15: args.eli15,
        include_concepts: args.concepts,
        max_length: args.max_length.unwrap_or(settings.preferred_length),
        force_regenerate: args.force,
    };

    let orchestrator = Orchestrator::new(settings).context("build orchestrator")?;
    orchestrator
        .generate_and_show(&analysis, &options, &CliPresenter)
        .await
        .context("summarization failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_is_stable_and_excludes_force() {
        let mut options = SummaryOptions::default();
        let base = options.canonical_key();
        options.force_regenerate = true;
        assert_eq!(options.canonical_key(), base);

        options.include_concepts = true;
        assert_ne!(options.canonical_key(), base);
    }

    #[test]
    fn string_array_parses_with_surrounding_prose() -> anyhow::Result<()> {
        let items = parse_string_array("Here you go:\n[\"one\", \" two \", \"\"]\nthanks")
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(items, vec!["one".to_owned(), "two".to_owned()]);
        Ok(())
    }

    #[test]
    fn malformed_array_is_a_parse_failure() {
        assert!(matches!(
            parse_string_array("no list here at all"),
            Err(SummarizeError::ParseFailure(_))
        ));
        assert!(matches!(
            parse_string_array("[{\"not\": \"strings\"}]"),
            Err(SummarizeError::ParseFailure(_))
        ));
    }

    #[test]
    fn concepts_require_exact_shape() {
        let good = r#"[{"term":"cache","definition":"stored results","analogy":"a pantry"}]"#;
        assert_eq!(parse_concepts(good).expect("parses").len(), 1);

        let bad = r#"[{"term":"cache"}]"#;
        assert!(matches!(
            parse_concepts(bad),
            Err(SummarizeError::ParseFailure(_))
        ));
    }

    #[test]
    fn difficulty_maps_from_readability() {
        assert_eq!(difficulty_level(75.0), "beginner");
        assert_eq!(difficulty_level(45.0), "intermediate");
        assert_eq!(difficulty_level(10.0), "advanced");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_rejects_when_window_is_full() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(3600), Duration::from_millis(0));
        limiter.acquire().await.expect("first");
        limiter.acquire().await.expect("second");
        assert!(matches!(
            limiter.acquire().await,
            Err(SummarizeError::RateLimited)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_window_slides() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(3600), Duration::from_millis(0));
        limiter.acquire().await.expect("first");
        assert!(limiter.acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(3601)).await;
        limiter.acquire().await.expect("window slid");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_enforces_min_interval() {
        let mut limiter = RateLimiter::new(10, Duration::from_secs(3600), Duration::from_secs(1));
        limiter.acquire().await.expect("first");

        let before = Instant::now();
        limiter.acquire().await.expect("second");
        // Paused clock advances only via sleeps, so the gap is the sleep.
        assert!(Instant::now().duration_since(before) >= Duration::from_secs(1));
    }
}
