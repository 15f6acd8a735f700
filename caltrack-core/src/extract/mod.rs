//! Task id extraction from event bodies.

mod html;
mod strategy;

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ExtractConfig;
use crate::error::{CalTrackError, CalTrackResult};
use crate::event::SourceEvent;

pub use html::strip_html;
pub use strategy::{Body, EmbeddedUrl, ExactBody, MatchStrategy, Prefixed, TextUrl};

/// Which strategy produced a task id. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    UrlEmbedded,
    UrlFullBody,
    BodyExact,
    Prefixed,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::UrlEmbedded => "url_embedded",
            Method::UrlFullBody => "url_full_body",
            Method::BodyExact => "body_exact",
            Method::Prefixed => "prefixed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub task_ref: String,
    pub method: Method,
    /// False when the token did not match the configured id shape.
    pub validated: bool,
}

impl ExtractionResult {
    /// `prefixed`, `url_embedded_unvalidated`, ...
    pub fn label(&self) -> String {
        if self.validated {
            self.method.to_string()
        } else {
            format!("{}_unvalidated", self.method)
        }
    }
}

fn compile(pattern: &str) -> CalTrackResult<Regex> {
    Regex::new(pattern).map_err(|e| CalTrackError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

pub struct Extractor {
    strategies: Vec<Box<dyn MatchStrategy>>,
    /// The configured id shape, anchored to the whole token.
    shape: Regex,
}

impl Extractor {
    /// Build the standard strategy chain: embedded URL, text URL, exact body,
    /// prefixed token.
    pub fn from_config(config: &ExtractConfig) -> CalTrackResult<Self> {
        let url = compile(&config.url_pattern)?;
        if url.captures_len() < 2 {
            return Err(CalTrackError::InvalidPattern {
                pattern: config.url_pattern.clone(),
                message: "URL pattern needs a capture group for the task id".into(),
            });
        }

        let mut strategies: Vec<Box<dyn MatchStrategy>> = vec![
            Box::new(EmbeddedUrl { url: url.clone() }),
            Box::new(TextUrl { url }),
            Box::new(ExactBody),
        ];

        if !config.prefix.is_empty() {
            let prefixed = Prefixed::new(&config.prefix).map_err(|e| CalTrackError::InvalidPattern {
                pattern: config.prefix.clone(),
                message: e.to_string(),
            })?;
            strategies.push(Box::new(prefixed));
        }

        Self::with_strategies(&config.task_id_pattern, strategies)
    }

    /// Build an extractor around a custom strategy list, tried in order.
    pub fn with_strategies(
        task_id_pattern: &str,
        strategies: Vec<Box<dyn MatchStrategy>>,
    ) -> CalTrackResult<Self> {
        compile(task_id_pattern)?;
        let shape = compile(&format!("^(?:{})$", task_id_pattern))?;
        Ok(Extractor { strategies, shape })
    }

    pub fn is_valid_task_id(&self, token: &str) -> bool {
        self.shape.is_match(token)
    }

    /// Find the task id for an event. None means the event is not reconciled.
    pub fn extract(&self, event: &SourceEvent) -> Option<ExtractionResult> {
        self.extract_markup(event.body_markup())
    }

    pub fn extract_markup(&self, markup: &str) -> Option<ExtractionResult> {
        let body = Body {
            markup,
            text: strip_html(markup),
        };

        for strategy in &self.strategies {
            let Some(token) = strategy.capture(&body) else {
                continue;
            };

            let validated = self.is_valid_task_id(&token);
            if validated || strategy.accepts_unvalidated() {
                return Some(ExtractionResult {
                    task_ref: token,
                    method: strategy.method(),
                    validated,
                });
            }
        }

        None
    }
}
