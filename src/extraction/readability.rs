//! Readability pass over raw article HTML
//!
//! Picks the element most likely to hold the article, then re-serializes it
//! through a tag and attribute allowlist. Anything not on the list is either
//! dropped with its subtree (scripts, navigation, forms) or unwrapped so only
//! its children survive (`div`, `section`, `span`, ...).

use super::NormalizedDocument;
use crate::error::FetchError;
use scraper::node::Text;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Elements whose whole subtree is discarded
const DROPPED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "nav", "footer", "aside", "form", "button",
    "input", "select", "textarea", "iframe", "frame", "frameset", "object", "embed", "svg",
    "canvas", "link", "meta",
];

/// Elements serialized with their tag
const KEPT: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "a", "img", "ul", "ol", "li", "blockquote", "pre",
    "code", "em", "strong", "b", "i", "u", "s", "sup", "sub", "br", "hr", "figure", "figcaption",
    "table", "thead", "tbody", "tfoot", "tr", "th", "td", "dl", "dt", "dd", "abbr", "cite", "q",
];

const VOID: &[&str] = &["br", "hr", "img"];

const ATTRIBUTES: &[&str] = &["href", "src", "alt", "title"];

/// Likely article containers, most specific first
const CANDIDATES: &[&str] = &[
    "article",
    "[itemprop='articleBody']",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".article-content",
    "#article",
    "main",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".post",
];

/// Normalize `html` fetched from (or supplied for) `base`
///
/// Relative `href`/`src` values are resolved against `base`. Fails with
/// [`FetchError::NoContent`] when nothing readable survives.
///
/// Parsing is CPU-bound; async callers should go through [`normalize_blocking`].
pub fn normalize(html: &str, base: &Url) -> Result<NormalizedDocument, FetchError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)
        .or_else(|| base.host_str().map(str::to_string))
        .unwrap_or_else(|| "Untitled".to_string());

    let body = render(main_container(&document), base).ok_or_else(|| FetchError::NoContent {
        url: base.to_string(),
    })?;

    Ok(NormalizedDocument { title, body })
}

/// [`normalize`] on the blocking thread pool
pub async fn normalize_blocking(
    html: String,
    base: Url,
) -> Result<NormalizedDocument, FetchError> {
    let url = base.to_string();
    tokio::task::spawn_blocking(move || normalize(&html, &base))
        .await
        .map_err(|e| FetchError::Parse {
            url,
            reason: format!("readability task failed: {e}"),
        })?
}

/// Escape text for use between tags
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    if let Some(og) = selector("meta[property='og:title']") {
        let title = document
            .select(&og)
            .filter_map(|meta| meta.value().attr("content"))
            .map(collapse_whitespace)
            .find(|title| !title.is_empty());
        if title.is_some() {
            return title;
        }
    }

    for css in ["title", "h1"] {
        let Some(sel) = selector(css) else { continue };
        let title = document
            .select(&sel)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|title| !title.is_empty());
        if title.is_some() {
            return title;
        }
    }

    None
}

/// Tree walk step. Walks use an explicit stack so nesting depth is bounded
/// by the heap, not the thread stack.
enum Visit<'a> {
    Enter(ElementRef<'a>),
    Leave(ElementRef<'a>),
}

fn paragraph_length(paragraph: ElementRef<'_>) -> usize {
    paragraph.text().collect::<String>().trim().len()
}

fn main_container(document: &Html) -> ElementRef<'_> {
    // Paragraph text length under every element, summed bottom-up in one pass
    let mut scores = HashMap::new();
    let mut totals: Vec<usize> = Vec::new();
    let mut stack = vec![Visit::Enter(document.root_element())];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(element) => {
                stack.push(Visit::Leave(element));
                if element.value().name() == "p" {
                    totals.push(paragraph_length(element));
                    continue;
                }
                totals.push(0);
                stack.extend(
                    element
                        .children()
                        .rev()
                        .filter_map(ElementRef::wrap)
                        .map(Visit::Enter),
                );
            }
            Visit::Leave(element) => {
                let total = totals.pop().unwrap_or(0);
                scores.insert(element.id(), total);
                if let Some(parent) = totals.last_mut() {
                    *parent += total;
                }
            }
        }
    }

    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for candidate in CANDIDATES.iter().filter_map(|css| selector(css)) {
        for element in document.select(&candidate) {
            let score = scores.get(&element.id()).copied().unwrap_or(0);
            if score > 0 && best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, element));
            }
        }
    }

    if let Some((_, element)) = best {
        return element;
    }

    selector("body")
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element())
}

fn resolve(base: &Url, value: &str) -> Option<String> {
    let resolved = base.join(value.trim()).ok()?;
    match resolved.scheme() {
        "http" | "https" | "mailto" | "data" => Some(resolved.to_string()),
        _ => None,
    }
}

fn render_attributes(element: ElementRef<'_>, base: &Url) -> String {
    let mut attributes = String::new();
    for &attribute in ATTRIBUTES {
        let Some(value) = element.value().attr(attribute) else {
            continue;
        };
        let value = match attribute {
            "href" | "src" => match resolve(base, value) {
                Some(resolved) => resolved,
                None => continue,
            },
            _ => value.to_string(),
        };
        attributes.push(' ');
        attributes.push_str(attribute);
        attributes.push_str("=\"");
        attributes.push_str(&escape_attribute(&value));
        attributes.push('"');
    }
    attributes
}

enum Frame<'a> {
    Text(&'a Text),
    Open(ElementRef<'a>),
    Close(&'a str),
}

fn push_children<'a>(element: ElementRef<'a>, stack: &mut Vec<Frame<'a>>) {
    for child in element.children().rev() {
        if let Some(text) = child.value().as_text() {
            stack.push(Frame::Text(text));
        } else if let Some(child) = ElementRef::wrap(child) {
            stack.push(Frame::Open(child));
        }
    }
}

/// Serialize the children of `root` through the allowlist
///
/// Returns `None` when no text or image survives.
fn render(root: ElementRef<'_>, base: &Url) -> Option<String> {
    let mut out = String::new();
    let mut readable = false;
    let mut stack = Vec::new();
    push_children(root, &mut stack);

    while let Some(frame) = stack.pop() {
        let element = match frame {
            Frame::Text(text) => {
                readable |= !text.trim().is_empty();
                out.push_str(&escape_text(text));
                continue;
            }
            Frame::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
                continue;
            }
            Frame::Open(element) => element,
        };

        let name = element.value().name();
        if DROPPED.contains(&name) {
            continue;
        }
        if !KEPT.contains(&name) {
            push_children(element, &mut stack);
            continue;
        }

        let attributes = render_attributes(element, base);
        if name == "img" {
            // An image without a usable source renders as nothing
            if !attributes.contains(" src=\"") {
                continue;
            }
            readable = true;
        }

        out.push('<');
        out.push_str(name);
        out.push_str(&attributes);
        if VOID.contains(&name) {
            out.push_str(" />");
            continue;
        }
        out.push('>');
        stack.push(Frame::Close(name));
        push_children(element, &mut stack);
    }

    readable.then(|| out.trim().to_string())
}
