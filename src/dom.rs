use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

/// Class/id fragments that mark navigation, ads, and other non-content
/// chrome. Applied to the concatenated `class` + `id` string of an element.
static NOISE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(nav|navbar|menu|sidebar|side-bar|comment|footer|header|banner|advert|ads?[-_]|[-_]ads?\b|sponsor|promo|social|share|sharing|related|recommend|newsletter|subscribe|cookie|consent|popup|modal|breadcrumb|pagination|widget)",
    )
    .expect("noise pattern is valid")
});

static AD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(advert|\bads?\b|ads?[-_]|[-_]ads?\b|sponsor|promo|banner)")
        .expect("ad pattern is valid")
});

static SOCIAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(social|share|sharing|twitter|facebook|follow)").expect("social pattern is valid")
});

static NAV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(nav|menu|breadcrumb|pagination)").expect("nav pattern is valid"));

/// Element names never counted as readable content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "nav", "aside", "footer", "form",
    "button", "select", "input", "label", "figcaption",
];

/// Kind of a text-bearing block inside a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading,
    ListItem,
    Quote,
    Code,
    Other,
}

#[derive(Debug, Clone)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub text: String,
}

/// Owned snapshot of a detected content region. Built by walking a parsed
/// document once; the original HTML string is never modified. Construction
/// guarantees non-empty readable text.
#[derive(Debug, Clone)]
pub struct ContentElement {
    pub tag: String,
    pub text: String,
    pub child_count: usize,
    pub blocks: Vec<TextBlock>,
    pub has_headings: bool,
    pub has_lists: bool,
    pub has_blockquotes: bool,
}

impl ContentElement {
    /// Snapshots an element subtree, skipping non-content descendants.
    /// Returns `None` when no readable text remains after stripping.
    pub fn from_element(element: ElementRef) -> Option<Self> {
        let mut blocks = Vec::new();
        collect_blocks(element, &mut blocks);

        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.trim().is_empty() {
            return None;
        }

        let has_headings = blocks.iter().any(|b| b.kind == BlockKind::Heading);
        let has_lists = blocks.iter().any(|b| b.kind == BlockKind::ListItem);
        let has_blockquotes = blocks.iter().any(|b| b.kind == BlockKind::Quote);

        Some(Self {
            tag: element.value().name().to_owned(),
            text,
            child_count: element.children().count(),
            blocks,
            has_headings,
            has_lists,
            has_blockquotes,
        })
    }

    /// Merges several snapshots into one synthetic container, preserving
    /// document order of the parts.
    pub fn synthetic(parts: Vec<ContentElement>) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }

        let mut blocks = Vec::new();
        let mut child_count = 0;
        for part in parts {
            child_count += 1;
            blocks.extend(part.blocks);
        }

        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.trim().is_empty() {
            return None;
        }

        let has_headings = blocks.iter().any(|b| b.kind == BlockKind::Heading);
        let has_lists = blocks.iter().any(|b| b.kind == BlockKind::ListItem);
        let has_blockquotes = blocks.iter().any(|b| b.kind == BlockKind::Quote);

        Some(Self {
            tag: "div".to_owned(),
            text,
            child_count,
            blocks,
            has_headings,
            has_lists,
            has_blockquotes,
        })
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Blocks that count as paragraph-like for the significance test.
    pub fn paragraph_like_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| {
                matches!(
                    b.kind,
                    BlockKind::Paragraph | BlockKind::ListItem | BlockKind::Quote
                )
            })
            .count()
    }
}

fn collect_blocks(element: ElementRef, out: &mut Vec<TextBlock>) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) || is_noise_element(element) {
        return;
    }

    let kind = match name {
        "p" => Some(BlockKind::Paragraph),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some(BlockKind::Heading),
        "li" => Some(BlockKind::ListItem),
        "blockquote" => Some(BlockKind::Quote),
        "pre" | "code" => Some(BlockKind::Code),
        _ => None,
    };

    if let Some(kind) = kind {
        let text = normalize_inline_text(&element.text().collect::<String>());
        if !text.is_empty() {
            out.push(TextBlock { kind, text });
        }
        return;
    }

    let mut recursed = false;
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            recursed = true;
            collect_blocks(child_el, out);
        }
    }

    // Leaf containers with bare text (e.g. text-only divs) still contribute.
    if !recursed {
        let text = normalize_inline_text(&element.text().collect::<String>());
        if !text.is_empty() {
            out.push(TextBlock {
                kind: BlockKind::Other,
                text,
            });
        }
    }
}

fn normalize_inline_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the element's class/id marks it as chrome rather than content.
pub fn is_noise_element(element: ElementRef) -> bool {
    NOISE_PATTERN.is_match(&class_and_id(element))
}

pub fn class_and_id(element: ElementRef) -> String {
    let class = element.value().attr("class").unwrap_or_default();
    let id = element.value().attr("id").unwrap_or_default();
    format!("{class} {id}")
}

/// Text directly inside the element, excluding descendant elements.
pub fn own_text(element: ElementRef) -> String {
    let mut out = String::new();
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    normalize_inline_text(&out)
}

/// Structural features of a scoring candidate, decoupled from the live
/// document so the scoring function stays pure and property-testable.
#[derive(Debug, Clone, Default)]
pub struct CandidateFeatures {
    pub text_len: usize,
    pub markup_len: usize,
    pub word_count: usize,
    pub paragraph_count: usize,
    pub heading_count: usize,
    pub list_item_count: usize,
    pub nav_count: usize,
    pub form_count: usize,
    pub ad_count: usize,
    pub social_count: usize,
    pub link_text_len: usize,
    pub class_and_id: String,
    pub has_paragraph_marker: bool,
    pub position_index: usize,
}

impl CandidateFeatures {
    pub fn from_element(element: ElementRef, position_index: usize) -> Self {
        let text = element.text().collect::<String>();
        let text = normalize_inline_text(&text);

        let mut features = Self {
            text_len: text.len(),
            markup_len: element.html().len().max(1),
            word_count: text.split_whitespace().count(),
            class_and_id: class_and_id(element),
            position_index,
            ..Self::default()
        };

        for node in element.descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            match el.value().name() {
                "p" => features.paragraph_count += 1,
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => features.heading_count += 1,
                "li" => features.list_item_count += 1,
                "nav" => features.nav_count += 1,
                "form" => features.form_count += 1,
                "a" => {
                    features.link_text_len +=
                        normalize_inline_text(&el.text().collect::<String>()).len();
                }
                _ => {}
            }

            let marker = class_and_id(el);
            if AD_PATTERN.is_match(&marker) {
                features.ad_count += 1;
            }
            if SOCIAL_PATTERN.is_match(&marker) {
                features.social_count += 1;
            }
            if el.value().name() != "nav" && NAV_PATTERN.is_match(&marker) {
                features.nav_count += 1;
            }
            if el.value().attr("data-selectable-paragraph").is_some() {
                features.has_paragraph_marker = true;
            }
        }

        features
    }
}

/// All elements of the document in document order, wrapped for detection.
pub fn all_elements(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
}
