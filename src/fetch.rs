use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, bail};
use url::Url;

const USER_AGENT: &str = concat!("pagegist/", env!("CARGO_PKG_VERSION"));

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads the document to process: a local HTML file when `input` is given,
/// otherwise an HTTP fetch of `url`. The returned URL (when fetching) feeds
/// metadata classification downstream.
pub async fn load_input(
    input: Option<&Path>,
    url: Option<&str>,
) -> anyhow::Result<(String, Option<Url>)> {
    match (input, url) {
        (Some(path), _) => {
            let html = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read input file: {}", path.display()))?;
            Ok((html, None))
        }
        (None, Some(raw)) => {
            let url = Url::parse(raw).with_context(|| format!("parse url: {raw}"))?;
            let html = fetch_html(&url).await?;
            Ok((html, Some(url)))
        }
        (None, None) => bail!("either --input or --url is required"),
    }
}

/// Fetches a page over HTTP and returns its body, rejecting non-HTML
/// responses up front rather than feeding binary data into the parser.
pub async fn fetch_html(url: &Url) -> anyhow::Result<String> {
    if !matches!(url.scheme(), "http" | "https") {
        bail!("unsupported url scheme: {}", url.scheme());
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("build http client")?;

    tracing::info!(url = %url, "fetching page");
    let response = client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("GET {url}: status {status}");
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    if !is_html_content_type(&content_type) {
        bail!("GET {url}: not an html page (content-type: {content_type})");
    }

    response
        .text()
        .await
        .with_context(|| format!("read body of {url}"))
}

fn is_html_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    // An absent content-type is treated as HTML; servers that omit it are
    // overwhelmingly static HTML hosts.
    essence.is_empty() || essence == "text/html" || essence == "application/xhtml+xml"
}
