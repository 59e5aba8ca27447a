//! Forum page parser
//!
//! This module turns a fetched discussion page into [`Post`] records:
//! - Post boundaries from the first matching boundary selector
//! - Field extraction through fixed relative selector cascades
//! - Timestamp normalization (absolute formats and "N hours ago")
//! - Link extraction and internal/external classification

use crate::post::{Link, LinkType, Post, Section};
use crate::ForumError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use sha2::{Digest, Sha256};
use url::Url;

const POST_SELECTORS: &[&str] = &[
    ".post",
    ".message",
    ".forum-post",
    ".topic-post",
    ".thread-item",
    "[data-post-id]",
];
const AUTHOR_SELECTORS: &[&str] = &[".author", ".username", ".poster", ".user-name"];
const TIMESTAMP_SELECTORS: &[&str] = &["time", ".timestamp", ".date", ".time", ".posted-date"];
const TITLE_SELECTORS: &[&str] = &[".title", ".subject", ".topic-title", "h1", "h2", "h3"];
const CONTENT_SELECTORS: &[&str] = &[".content", ".message-content", ".post-content", ".body"];
const REPLIES_SELECTORS: &[&str] = &[".replies", ".reply-count"];
const VIEWS_SELECTORS: &[&str] = &[".views", ".view-count"];
const TAG_SELECTORS: &[&str] = &[".tag", ".category", ".label"];
const LISTING_SELECTORS: &[&str] = &[
    ".forum",
    ".topic-list",
    ".thread-list",
    ".posts",
    "#posts",
    "[data-section]",
    ".no-posts",
    ".empty",
];

/// Page titles starting with these mark a server error page
const ERROR_TITLE_PREFIXES: &[&str] = &["400", "403", "404", "500", "502", "503", "error", "not found"];

/// Attributes that carry a post id, in preference order
const ID_ATTRIBUTES: &[&str] = &["id", "data-post-id", "data-id", "data-message-id"];

/// Absolute timestamp formats without zone; read as UTC
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

static RELATIVE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(minute|min|hour|hr|day)s?\s+ago").expect("valid relative time regex")
});

static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").expect("valid count regex"));

/// Compiled selector cascades
struct Selectors {
    posts: Vec<Selector>,
    author: Vec<Selector>,
    timestamp: Vec<Selector>,
    title: Vec<Selector>,
    content: Vec<Selector>,
    replies: Vec<Selector>,
    views: Vec<Selector>,
    tags: Vec<Selector>,
    listing: Vec<Selector>,
    links: Vec<Selector>,
    ids: Vec<Selector>,
    page_title: Vec<Selector>,
}

impl Selectors {
    fn new() -> Self {
        Self {
            posts: compile(POST_SELECTORS),
            author: compile(AUTHOR_SELECTORS),
            timestamp: compile(TIMESTAMP_SELECTORS),
            title: compile(TITLE_SELECTORS),
            content: compile(CONTENT_SELECTORS),
            replies: compile(REPLIES_SELECTORS),
            views: compile(VIEWS_SELECTORS),
            tags: compile(TAG_SELECTORS),
            listing: compile(LISTING_SELECTORS),
            links: compile(&["a[href]"]),
            ids: compile(&["[id]"]),
            page_title: compile(&["title"]),
        }
    }
}

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Invalid selector {}: {:?}", s, e);
                None
            }
        })
        .collect()
}

/// Extracts posts from forum page markup
pub struct PostParser {
    base_url: Url,
    reference_time: DateTime<Utc>,
    selectors: Selectors,
}

impl PostParser {
    /// Creates a parser that resolves links against `base_url`
    ///
    /// Relative timestamps are resolved against the current time.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            reference_time: Utc::now(),
            selectors: Selectors::new(),
        }
    }

    /// Fixes the instant that "N hours ago" is measured from
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = reference_time;
        self
    }

    /// Parses a page body into posts, in page order
    ///
    /// # Arguments
    ///
    /// * `body` - Raw HTML of one section page
    /// * `section` - Section the page belongs to
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Post>)` - Posts found (empty for an empty listing)
    /// * `Err(ForumError::ParseFailed)` - Empty body, or no posts on a page
    ///   that is an error page or has no listing container
    pub fn parse(&self, body: &str, section: &Section) -> Result<Vec<Post>, ForumError> {
        if body.trim().is_empty() {
            return Err(ForumError::ParseFailed {
                reason: "empty page body".to_string(),
            });
        }

        let document = Html::parse_document(body);

        let candidates = self
            .selectors
            .posts
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        // The page title only matters when the markup has no posts at all
        if candidates.is_empty() {
            if let Some(title) = self.error_page_title(&document) {
                return Err(ForumError::ParseFailed {
                    reason: format!("error page: {}", title),
                });
            }

            let has_listing = self
                .selectors
                .listing
                .iter()
                .any(|selector| document.select(selector).next().is_some());

            if has_listing {
                return Ok(Vec::new());
            }
            return Err(ForumError::ParseFailed {
                reason: "no posts and no listing container".to_string(),
            });
        }

        let posts: Vec<Post> = candidates
            .into_iter()
            .filter_map(|element| self.extract_post(element, section))
            .collect();

        tracing::debug!("Parsed {} posts for section {}", posts.len(), section);
        Ok(posts)
    }

    fn error_page_title(&self, document: &Html) -> Option<String> {
        let title = first_text(document.root_element(), &self.selectors.page_title)?;
        let lowered = title.to_lowercase();
        let error_shaped = ERROR_TITLE_PREFIXES
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
            || lowered.contains("page not found")
            || lowered.ends_with(" error");
        if error_shaped {
            Some(title)
        } else {
            None
        }
    }

    fn extract_post(&self, element: ElementRef<'_>, section: &Section) -> Option<Post> {
        let title = first_text(element, &self.selectors.title).unwrap_or_default();
        let content = match first_match(element, &self.selectors.content) {
            Some(content) => clean_text(content),
            None => clean_text(element),
        };

        if title.is_empty() && content.is_empty() {
            return None;
        }

        let author = first_text(element, &self.selectors.author).unwrap_or_default();
        let raw_time = self.raw_timestamp(element);

        let post_id = explicit_post_id(element, &self.selectors.ids).unwrap_or_else(|| {
            synthetic_post_id(section, &author, &title, &content, raw_time.as_deref())
        });

        let mut post = Post::new(section.clone(), post_id);
        post.timestamp = raw_time
            .as_deref()
            .and_then(|raw| parse_timestamp(raw, self.reference_time));
        post.author = author;
        post.title = title;
        post.content = content;
        post.replies_count = first_count(element, &self.selectors.replies);
        post.views_count = first_count(element, &self.selectors.views);
        post.reply_depth = reply_depth(element);
        post.tags = self
            .selectors
            .tags
            .iter()
            .flat_map(|selector| element.select(selector))
            .map(|tag| normalize_whitespace(&tag.text().collect::<String>()))
            .filter(|tag| !tag.is_empty())
            .collect();
        post.links = self.extract_links(element);

        Some(post)
    }

    /// Timestamp source text: `datetime` attribute, then `title`, then element text
    fn raw_timestamp(&self, element: ElementRef<'_>) -> Option<String> {
        let time = first_match(element, &self.selectors.timestamp)?;
        let value = time.value();

        value
            .attr("datetime")
            .or_else(|| value.attr("title"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                let text = normalize_whitespace(&time.text().collect::<String>());
                (!text.is_empty()).then_some(text)
            })
    }

    fn extract_links(&self, element: ElementRef<'_>) -> Vec<Link> {
        let host = self.base_url.host_str();

        self.selectors
            .links
            .iter()
            .flat_map(|selector| element.select(selector))
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let url = resolve_link(href, &self.base_url)?;
                let link_type = if url.host_str() == host {
                    LinkType::Internal
                } else {
                    LinkType::External
                };
                Some(Link {
                    url: url.to_string(),
                    text: normalize_whitespace(&anchor.text().collect::<String>()),
                    link_type,
                })
            })
            .collect()
    }
}

/// Parses page-local timestamp text
///
/// Accepts RFC 3339, a handful of common absolute formats (read as UTC),
/// and relative "N minutes/hours/days ago" measured from `reference`.
pub fn parse_timestamp(raw: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    let captures = RELATIVE_TIME.captures(raw)?;
    let amount: i64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().to_lowercase();
    let offset = match unit.as_str() {
        "minute" | "min" => Duration::try_minutes(amount)?,
        "hour" | "hr" => Duration::try_hours(amount)?,
        _ => Duration::try_days(amount)?,
    };
    reference.checked_sub_signed(offset)
}

fn first_match<'a>(element: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|selector| element.select(selector).next())
}

fn first_text(element: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        element
            .select(selector)
            .map(|found| normalize_whitespace(&found.text().collect::<String>()))
            .find(|text| !text.is_empty())
    })
}

/// First integer in the first matching element; thousands separators allowed
fn first_count(element: ElementRef<'_>, selectors: &[Selector]) -> u64 {
    selectors
        .iter()
        .filter_map(|selector| element.select(selector).next())
        .find_map(|found| {
            let text = found.text().collect::<String>();
            let digits = COUNT.find(&text)?.as_str().replace(',', "");
            digits.parse().ok()
        })
        .unwrap_or(0)
}

fn reply_depth(element: ElementRef<'_>) -> u32 {
    let value = element.value();
    let explicit = ["data-depth", "data-reply-depth"]
        .iter()
        .find_map(|attr| value.attr(attr)?.trim().parse().ok());

    explicit.unwrap_or_else(|| {
        u32::from(value.classes().any(|class| class.eq_ignore_ascii_case("reply")))
    })
}

fn explicit_post_id(element: ElementRef<'_>, ids: &[Selector]) -> Option<String> {
    let value = element.value();
    let direct = ID_ATTRIBUTES
        .iter()
        .filter_map(|attr| value.attr(attr))
        .map(str::trim)
        .find(|id| !id.is_empty());

    if let Some(id) = direct {
        return Some(id.to_string());
    }

    ids.iter()
        .flat_map(|selector| element.select(selector))
        .filter_map(|child| child.value().attr("id"))
        .find(|id| {
            let lowered = id.to_lowercase();
            lowered.contains("post") || lowered.contains("message")
        })
        .map(str::to_string)
}

/// Content-derived id for markup without one: `h` + 16 hex chars of SHA-256
fn synthetic_post_id(
    section: &Section,
    author: &str,
    title: &str,
    content: &str,
    raw_time: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    for part in [section.name(), author, title, content, raw_time.unwrap_or("")] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("h{}", &digest[..16])
}

/// Quote, signature and edit-notice blocks are not part of a post's own text
fn is_noise(element: ElementRef<'_>) -> bool {
    if element.value().name() == "blockquote" {
        return true;
    }
    element.value().classes().any(|class| {
        let class = class.to_lowercase();
        class.contains("quote")
            || class.contains("signature")
            || class == "sig"
            || class.starts_with("edit")
            || class.contains("modified")
    })
}

fn clean_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    normalize_whitespace(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_noise(child) {
                        collect_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves an href against the base URL
///
/// Returns None for non-HTTP schemes, fragment-only links and unparsable hrefs.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = base_url.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}
