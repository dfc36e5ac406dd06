mod openai_stub;

use std::time::Duration;

use openai_stub::{OpenAiStub, StubBehavior};
use pagegist::analyze::AnalysisResult;
use pagegist::config::{MaxLength, Settings};
use pagegist::error::SummarizeError;
use pagegist::summarize::{Orchestrator, SummaryOptions};

fn article_html() -> String {
    let paragraph = |range: std::ops::Range<usize>| {
        range
            .map(|i| format!("Sentence {i} explains topic{i} with detail{i} and context{i} today."))
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "<html><body><article><p>{}</p><p>{}</p></article></body></html>",
        paragraph(0..20),
        paragraph(20..40),
    )
}

fn analysis() -> AnalysisResult {
    let html = article_html();
    let doc = scraper::Html::parse_document(&html);
    let element = pagegist::detect::detect(&doc).expect("detect content");
    pagegist::analyze::analyze(&element, None).expect("content is valid")
}

fn stub_settings(stub: &OpenAiStub, dir: &tempfile::TempDir) -> Settings {
    Settings {
        api_key: Some("test-key".to_owned()),
        base_url: stub.base_url.clone(),
        model: "stub-model".to_owned(),
        cache_path: dir.path().join("cache.json"),
        request_timeout: Duration::from_secs(5),
        max_requests_per_hour: 100,
        min_request_interval: Duration::ZERO,
        ..Settings::default()
    }
}

#[tokio::test]
async fn second_call_is_served_from_cache() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let options = SummaryOptions::default();

    let first = orchestrator.generate(&analysis, &options).await?;
    let second = orchestrator.generate(&analysis, &options).await?;

    assert_eq!(first, second);
    assert_eq!(first.quick_summary, "A concise stub summary of the page.");
    assert_eq!(stub.request_count(), 1);
    Ok(())
}

#[tokio::test]
async fn cache_persists_across_sessions() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;

    let analysis = analysis();
    let options = SummaryOptions::default();

    let first = {
        let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;
        orchestrator.generate(&analysis, &options).await?
    };

    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;
    let second = orchestrator.generate(&analysis, &options).await?;

    assert_eq!(first, second);
    assert_eq!(stub.request_count(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_calls_share_one_request() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let options = SummaryOptions::default();

    let (a, b) = tokio::join!(
        orchestrator.generate(&analysis, &options),
        orchestrator.generate(&analysis, &options),
    );

    assert_eq!(a?, b?);
    assert_eq!(stub.request_count(), 1);
    assert_eq!(orchestrator.inflight_len().await, 0);
    Ok(())
}

#[tokio::test]
async fn inflight_gates_do_not_accumulate_across_keys() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();

    // Each option set fingerprints to a distinct cache key; a long-lived
    // orchestrator must not retain a gate per key it has ever seen.
    for max_length in [MaxLength::Short, MaxLength::Medium, MaxLength::Long] {
        for include_key_points in [false, true] {
            let options = SummaryOptions {
                include_key_points,
                max_length,
                ..SummaryOptions::default()
            };
            orchestrator.generate(&analysis, &options).await?;
        }
    }

    assert_eq!(orchestrator.inflight_len().await, 0);
    Ok(())
}

#[tokio::test]
async fn force_regenerate_dispatches_again() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let options = SummaryOptions::default();

    orchestrator.generate(&analysis, &options).await?;
    orchestrator.regenerate(&analysis, &options).await?;

    assert_eq!(stub.request_count(), 2);
    // The forced result overwrote the same entry.
    assert!(orchestrator.has_cached(&analysis, &options).await);

    orchestrator.clear_cache().await?;
    assert!(!orchestrator.has_cached(&analysis, &options).await);
    Ok(())
}

#[tokio::test]
async fn every_requested_format_is_populated() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let options = SummaryOptions {
        include_quick_summary: true,
        include_detailed_summary: true,
        include_key_points: true,
        include_action_items: true,
        include_eli15: true,
        include_concepts: true,
        ..SummaryOptions::default()
    };

    let summary = orchestrator.generate(&analysis, &options).await?;

    assert!(!summary.quick_summary.is_empty());
    assert!(summary.detailed_summary.starts_with("## "));
    assert_eq!(summary.key_points.len(), 5);
    assert_eq!(summary.action_items.len(), 1);
    assert!(!summary.eli_summary.is_empty());
    assert_eq!(summary.concepts[0].term, "stub");
    assert!(!summary.difficulty_level.is_empty());
    // One provider request per requested format.
    assert_eq!(stub.request_count(), 6);
    Ok(())
}

#[tokio::test]
async fn malformed_structured_output_fails_without_caching() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::MalformedStructured);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let options = SummaryOptions {
        include_quick_summary: false,
        include_key_points: true,
        ..SummaryOptions::default()
    };

    let err = orchestrator
        .generate(&analysis, &options)
        .await
        .expect_err("prose instead of JSON must fail");
    assert!(matches!(err, SummarizeError::ParseFailure(_)));
    assert!(!orchestrator.has_cached(&analysis, &options).await);
    Ok(())
}

#[tokio::test]
async fn transient_failures_are_retried() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::FailFirst(2));
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let summary = orchestrator
        .generate(&analysis, &SummaryOptions::default())
        .await?;

    assert_eq!(summary.quick_summary, "A concise stub summary of the page.");
    assert_eq!(stub.request_count(), 3);
    Ok(())
}

#[tokio::test]
async fn missing_api_key_is_not_configured() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let mut settings = stub_settings(&stub, &dir);
    settings.api_key = None;
    let orchestrator = Orchestrator::new(settings)?;

    let err = orchestrator
        .generate(&analysis(), &SummaryOptions::default())
        .await
        .expect_err("no key means no request");
    assert!(matches!(err, SummarizeError::NotConfigured));
    assert_eq!(stub.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn fabricated_highlight_spans_are_dropped() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;
    let orchestrator = Orchestrator::new(stub_settings(&stub, &dir))?;

    let analysis = analysis();
    let highlights = pagegist::highlight::generate(&orchestrator, &analysis).await?;

    assert_eq!(highlights.high.len(), 1, "verbatim span survives");
    assert!(analysis.cleaned_text.contains(&highlights.high[0]));
    assert!(highlights.medium.is_empty(), "fabricated span is dropped");
    Ok(())
}
