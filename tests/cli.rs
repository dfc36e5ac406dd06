mod openai_stub;

use assert_cmd::Command;
use openai_stub::{OpenAiStub, StubBehavior};
use predicates::prelude::*;

fn article_html() -> String {
    let paragraph = |range: std::ops::Range<usize>| {
        range
            .map(|i| format!("Sentence {i} explains topic{i} with detail{i} and context{i} today."))
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "<html><head><title>CLI Test Page</title></head>\
         <body><article><h2>Background</h2><p>{}</p><p>{}</p></article></body></html>",
        paragraph(0..30),
        paragraph(30..60),
    )
}

#[test]
fn analyze_reports_an_article() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("page.html");
    std::fs::write(&path, article_html())?;

    Command::cargo_bin("pagegist")?
        .arg("analyze")
        .arg("--input")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"is_article\": true"))
        .stdout(predicate::str::contains("CLI Test Page"));
    Ok(())
}

#[test]
fn analyze_flags_a_contentless_page() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.html");
    std::fs::write(
        &path,
        "<html><body><nav><a href='/a'>Home</a><a href='/b'>About</a></nav></body></html>",
    )?;

    Command::cargo_bin("pagegist")?
        .arg("analyze")
        .arg("--input")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"is_article\": false"));
    Ok(())
}

#[test]
fn analyze_auto_summarizes_articles_when_enabled() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(StubBehavior::Normal);
    let dir = tempfile::tempdir()?;

    let page = dir.path().join("page.html");
    std::fs::write(&page, article_html())?;

    let settings = dir.path().join("settings.yaml");
    std::fs::write(
        &settings,
        format!(
            "api_key: test-key\nbase_url: \"{}\"\nauto_summarize: true\ncache_path: \"{}\"\n",
            stub.base_url,
            dir.path().join("cache.json").display(),
        ),
    )?;

    Command::cargo_bin("pagegist")?
        .env_remove("OPENAI_API_KEY")
        .env_remove("PAGEGIST_API_KEY")
        .env_remove("PAGEGIST_BASE_URL")
        .env_remove("PAGEGIST_CACHE")
        .arg("analyze")
        .arg("--input")
        .arg(&page)
        .arg("--settings")
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"is_article\": true"))
        .stdout(predicate::str::contains("A concise stub summary of the page."));

    assert_eq!(stub.request_count(), 1);
    Ok(())
}

#[test]
fn analyze_without_settings_skips_summarization() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("page.html");
    std::fs::write(&path, article_html())?;

    Command::cargo_bin("pagegist")?
        .env_remove("OPENAI_API_KEY")
        .env_remove("PAGEGIST_API_KEY")
        .arg("analyze")
        .arg("--input")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("quick_summary").not());
    Ok(())
}

#[test]
fn summarize_without_api_key_fails_with_guidance() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("page.html");
    std::fs::write(&path, article_html())?;

    Command::cargo_bin("pagegist")?
        .env_remove("OPENAI_API_KEY")
        .env_remove("PAGEGIST_API_KEY")
        .arg("summarize")
        .arg("--input")
        .arg(&path)
        .arg("--cache")
        .arg(dir.path().join("cache.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
    Ok(())
}

#[test]
fn summarize_rejects_an_input_without_content() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.html");
    std::fs::write(&path, "<html><body><nav>Menu</nav></body></html>")?;

    Command::cargo_bin("pagegist")?
        .env_remove("OPENAI_API_KEY")
        .env_remove("PAGEGIST_API_KEY")
        .arg("summarize")
        .arg("--input")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to summarize"));
    Ok(())
}

#[test]
fn cache_stats_reports_an_empty_cache() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    Command::cargo_bin("pagegist")?
        .arg("cache")
        .arg("stats")
        .arg("--cache")
        .arg(dir.path().join("cache.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"entries\": 0"));
    Ok(())
}
