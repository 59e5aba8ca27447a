//! Author masking and contact-detail redaction

use crate::config::PrivacyConfig;
use crate::post::Post;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const TOKEN_PREFIX: &str = "anon_";
const TOKEN_HEX_LEN: usize = 12;

/// Usernames shorter than this are masked but not redacted from text
const MIN_REDACTED_NAME_LEN: usize = 3;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b")
        .expect("valid phone regex")
});

static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\B@[A-Za-z0-9_]{2,}").expect("valid mention regex"));

static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[REDACTED_[A-Z]+\]").expect("valid marker regex"));

/// Kinds of redacted fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redaction {
    Email,
    Phone,
    Mention,
    Name,
    /// An existing marker; kept as is
    Marker,
}

impl Redaction {
    fn placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Email => Some("[REDACTED_EMAIL]"),
            Self::Phone => Some("[REDACTED_PHONE]"),
            Self::Mention => Some("[REDACTED_MENTION]"),
            Self::Name => Some("[REDACTED_NAME]"),
            Self::Marker => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Detection {
    kind: Redaction,
    start: usize,
    end: usize,
}

/// Replaces authors with salted tokens and redacts contact details
///
/// Tokens are deterministic within one run (one salt) and not reversible.
#[derive(Debug, Clone)]
pub struct Anonymizer {
    salt: String,
    redact_contact_info: bool,
    known_names: BTreeSet<String>,
    names_pattern: Option<Regex>,
}

impl Anonymizer {
    /// Creates an anonymizer with a fresh random salt
    pub fn new(redact_contact_info: bool) -> Self {
        let salt: [u8; 16] = rand::thread_rng().gen();
        Self::with_salt(&hex::encode(salt), redact_contact_info)
    }

    pub fn from_config(config: &PrivacyConfig) -> Self {
        Self::new(config.redact_contact_info)
    }

    /// Creates an anonymizer with a fixed salt
    pub fn with_salt(salt: &str, redact_contact_info: bool) -> Self {
        Self {
            salt: salt.to_string(),
            redact_contact_info,
            known_names: BTreeSet::new(),
            names_pattern: None,
        }
    }

    /// Same salt and settings, no usernames seen yet
    ///
    /// Parallel workers each get a fork so tokens agree across the run.
    pub fn fork(&self) -> Self {
        Self::with_salt(&self.salt, self.redact_contact_info)
    }

    /// Returns the token for a username
    pub fn token_for(&self, username: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(username.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("{}{}", TOKEN_PREFIX, &digest[..TOKEN_HEX_LEN])
    }

    /// Returns true if `value` already has the token shape
    pub fn is_token(value: &str) -> bool {
        value
            .strip_prefix(TOKEN_PREFIX)
            .map(|rest| {
                rest.len() == TOKEN_HEX_LEN
                    && rest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            })
            .unwrap_or(false)
    }

    /// Masks the author and, if enabled, redacts title and content
    ///
    /// Applying it twice yields the same post.
    pub fn anonymize(&mut self, mut post: Post) -> Post {
        let author = post.author.trim().to_string();
        if !author.is_empty() && !Self::is_token(&author) {
            self.remember(&author);
            post.author = self.token_for(&author);
        }

        if self.redact_contact_info {
            post.title = self.redact(&post.title);
            post.content = self.redact(&post.content);
        }

        post
    }

    /// Redacts e-mail addresses, phone numbers, mentions and known usernames
    pub fn redact(&self, text: &str) -> String {
        let mut accepted: Vec<Detection> = Vec::new();

        let mut consider = |kind: Redaction, regex: &Regex| {
            for m in regex.find_iter(text) {
                let overlaps = accepted
                    .iter()
                    .any(|d| m.start() < d.end && d.start < m.end());
                if !overlaps {
                    accepted.push(Detection {
                        kind,
                        start: m.start(),
                        end: m.end(),
                    });
                }
            }
        };

        consider(Redaction::Marker, &*MARKER_REGEX);
        consider(Redaction::Email, &*EMAIL_REGEX);
        consider(Redaction::Phone, &*PHONE_REGEX);
        consider(Redaction::Mention, &*MENTION_REGEX);
        if let Some(names) = &self.names_pattern {
            consider(Redaction::Name, names);
        }

        // Apply replacements in reverse order to keep indices valid
        accepted.sort_by_key(|d| std::cmp::Reverse(d.start));
        let mut result = text.to_string();
        for detection in accepted {
            if let Some(placeholder) = detection.kind.placeholder() {
                result.replace_range(detection.start..detection.end, placeholder);
            }
        }
        result
    }

    fn remember(&mut self, username: &str) {
        let redactable = username.chars().count() >= MIN_REDACTED_NAME_LEN
            && username.chars().next().map_or(false, char::is_alphanumeric)
            && username.chars().last().map_or(false, char::is_alphanumeric);

        if !redactable || !self.known_names.insert(username.to_string()) {
            return;
        }

        // Longest first so a name never matches only a prefix of a longer one
        let mut names: Vec<&String> = self.known_names.iter().collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");

        self.names_pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
            .case_insensitive(true)
            .build()
            .map_err(|e| tracing::warn!("Cannot build username pattern: {}", e))
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Section;

    fn post(author: &str, content: &str) -> Post {
        let mut post = Post::new(Section::new("general"), "p1");
        post.author = author.to_string();
        post.content = content.to_string();
        post
    }

    #[test]
    fn test_author_is_tokenized_deterministically() {
        let mut anon = Anonymizer::with_salt("salt", true);
        let a = anon.anonymize(post("mommy_sarah", "hi"));
        let b = anon.anonymize(post("mommy_sarah", "hello"));
        let c = anon.anonymize(post("rivka", "hey"));

        assert!(Anonymizer::is_token(&a.author));
        assert_eq!(a.author, b.author);
        assert_ne!(a.author, c.author);
        assert_eq!(a.author.len(), TOKEN_PREFIX.len() + TOKEN_HEX_LEN);
    }

    #[test]
    fn test_different_salts_give_different_tokens() {
        let a = Anonymizer::with_salt("one", true).token_for("rivka");
        let b = Anonymizer::with_salt("two", true).token_for("rivka");
        assert_ne!(a, b);

        let fresh = Anonymizer::new(true);
        assert_eq!(fresh.fork().token_for("rivka"), fresh.token_for("rivka"));
    }

    #[test]
    fn test_empty_author_stays_empty() {
        let mut anon = Anonymizer::with_salt("salt", true);
        assert_eq!(anon.anonymize(post("", "text")).author, "");
    }

    #[test]
    fn test_redacts_contact_details() {
        let anon = Anonymizer::with_salt("salt", true);
        let text = "Email me at sarah.k@gmail.com or call (718) 555-1234, thanks @rivka_b";
        assert_eq!(
            anon.redact(text),
            "Email me at [REDACTED_EMAIL] or call [REDACTED_PHONE], thanks [REDACTED_MENTION]"
        );
        assert_eq!(anon.redact("718-555-1234"), "[REDACTED_PHONE]");
    }

    #[test]
    fn test_redacts_known_usernames() {
        let mut anon = Anonymizer::with_salt("salt", true);
        anon.anonymize(post("mommy_sarah", "first"));
        let reply = anon.anonymize(post("leah", "I agree with Mommy_Sarah on this"));
        assert_eq!(reply.content, "I agree with [REDACTED_NAME] on this");
    }

    #[test]
    fn test_short_names_are_not_redacted_from_text() {
        let mut anon = Anonymizer::with_salt("salt", true);
        anon.anonymize(post("al", "x"));
        let reply = anon.anonymize(post("dina", "totally normal text"));
        assert_eq!(reply.content, "totally normal text");
    }

    #[test]
    fn test_redaction_can_be_disabled() {
        let mut anon = Anonymizer::with_salt("salt", false);
        let out = anon.anonymize(post("rivka", "mail rivka@example.com"));
        assert!(Anonymizer::is_token(&out.author));
        assert_eq!(out.content, "mail rivka@example.com");
    }

    #[test]
    fn test_idempotent() {
        let mut anon = Anonymizer::with_salt("salt", true);
        let once = anon.anonymize(post(
            "mommy_sarah",
            "Ask @leah or mail a@b.com, mommy_sarah says hi",
        ));
        let twice = anon.anonymize(once.clone());
        assert_eq!(once, twice);
        assert!(!once.content.contains("a@b.com"));
    }

    #[test]
    fn test_is_token() {
        assert!(Anonymizer::is_token("anon_0123456789ab"));
        assert!(!Anonymizer::is_token("anon_0123456789AB"));
        assert!(!Anonymizer::is_token("anon_short"));
        assert!(!Anonymizer::is_token("sarah"));
    }
}
