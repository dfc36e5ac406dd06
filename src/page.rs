use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::detect;
use crate::dom::ContentElement;

/// Word count above which a detected region can count as an article.
const ARTICLE_MIN_WORDS: usize = 100;

/// Confidence above which a detected region counts as an article.
const ARTICLE_MIN_CONFIDENCE: f32 = 0.6;

/// Per-navigation snapshot of a page: detection outcome plus document
/// metadata. Discarded when the host document changes.
#[derive(Debug, Serialize)]
pub struct PageAnalysis {
    pub is_article: bool,
    pub title: String,
    pub author: String,
    pub publish_date: String,
    pub word_count: usize,
    pub confidence: f32,
    #[serde(skip)]
    pub main_content: Option<ContentElement>,
    pub source_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Detects the main content and gathers page metadata. Detection failure is
/// not an error here; it yields a non-article analysis with no content.
pub fn analyze_page(doc: &Html, source_url: Option<&Url>) -> PageAnalysis {
    let main_content = detect::detect(doc).ok();

    let (word_count, confidence) = match &main_content {
        Some(element) => {
            let words = element.word_count();
            (words, confidence_score(element))
        }
        None => (0, 0.0),
    };

    PageAnalysis {
        is_article: word_count >= ARTICLE_MIN_WORDS && confidence > ARTICLE_MIN_CONFIDENCE,
        title: page_title(doc),
        author: meta_content(doc, "meta[name='author']").unwrap_or_default(),
        publish_date: publish_date(doc),
        word_count,
        confidence,
        main_content,
        source_url: source_url.map(|u| u.to_string()),
        timestamp: Utc::now(),
    }
}

/// [0,1] estimate that the detected region is genuine article content,
/// driven by word count and structural markers.
pub fn confidence_score(element: &ContentElement) -> f32 {
    let mut confidence = 0.2_f32;

    let words = element.word_count();
    if words >= 100 {
        confidence += 0.25;
    }
    if words >= 300 {
        confidence += 0.15;
    }
    if words >= 500 {
        confidence += 0.1;
    }

    if element.has_headings {
        confidence += 0.1;
    }
    if element.has_lists {
        confidence += 0.05;
    }
    if element.paragraph_like_count() >= 5 {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

fn select_first<'a>(doc: &'a Html, raw: &str) -> Option<scraper::ElementRef<'a>> {
    let selector = Selector::parse(raw).ok()?;
    doc.select(&selector).next()
}

fn meta_content(doc: &Html, raw_selector: &str) -> Option<String> {
    let element = select_first(doc, raw_selector)?;
    let content = element.value().attr("content")?.trim();
    if content.is_empty() {
        return None;
    }
    Some(content.to_owned())
}

fn page_title(doc: &Html) -> String {
    if let Some(title) = meta_content(doc, "meta[property='og:title']") {
        return title;
    }
    select_first(doc, "title")
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .unwrap_or_default()
}

fn publish_date(doc: &Html) -> String {
    if let Some(element) = select_first(doc, "time[datetime]")
        && let Some(datetime) = element.value().attr("datetime")
    {
        return datetime.to_owned();
    }
    meta_content(doc, "meta[property='article:published_time']").unwrap_or_default()
}
