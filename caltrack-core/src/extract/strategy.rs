//! Ways of finding a task id in an event body.
//!
//! The extractor walks an ordered list of strategies and stops at the first
//! one that produces an acceptable candidate.

use regex::Regex;

use crate::extract::Method;

/// An event body in both forms the strategies look at.
pub struct Body<'a> {
    /// Unsanitized markup, link attributes included.
    pub markup: &'a str,
    /// Markup stripped to plain text and trimmed.
    pub text: String,
}

pub trait MatchStrategy: Send + Sync {
    fn method(&self) -> Method;

    /// Candidate token, before shape validation.
    fn capture(&self, body: &Body<'_>) -> Option<String>;

    /// Whether a candidate failing shape validation still counts as a match.
    fn accepts_unvalidated(&self) -> bool {
        true
    }
}

fn first_group(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

/// Task URL anywhere in the raw markup, `href` attributes included.
pub struct EmbeddedUrl {
    pub url: Regex,
}

impl MatchStrategy for EmbeddedUrl {
    fn method(&self) -> Method {
        Method::UrlEmbedded
    }

    fn capture(&self, body: &Body<'_>) -> Option<String> {
        first_group(&self.url, body.markup)
    }
}

/// Task URL in the plain-text rendering of the body.
pub struct TextUrl {
    pub url: Regex,
}

impl MatchStrategy for TextUrl {
    fn method(&self) -> Method {
        Method::UrlFullBody
    }

    fn capture(&self, body: &Body<'_>) -> Option<String> {
        first_group(&self.url, &body.text)
    }
}

/// The whole body is nothing but the id.
pub struct ExactBody;

impl MatchStrategy for ExactBody {
    fn method(&self) -> Method {
        Method::BodyExact
    }

    fn capture(&self, body: &Body<'_>) -> Option<String> {
        let text = body.text.trim();
        if text.is_empty() || text.contains(char::is_whitespace) {
            return None;
        }
        Some(text.to_string())
    }

    fn accepts_unvalidated(&self) -> bool {
        false
    }
}

/// `<prefix><id>` anywhere in the text, prefix matched case-insensitively.
pub struct Prefixed {
    re: Regex,
}

impl Prefixed {
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("(?i){}([A-Za-z0-9_-]+)", regex::escape(prefix)))?;
        Ok(Prefixed { re })
    }
}

impl MatchStrategy for Prefixed {
    fn method(&self) -> Method {
        Method::Prefixed
    }

    fn capture(&self, body: &Body<'_>) -> Option<String> {
        first_group(&self.re, &body.text)
    }
}
