//! Subject → time entry description rewriting.
//!
//! The planner treats the transform as enrichment: when it fails, the raw
//! subject is used instead.

use regex::Regex;

use crate::config::TransformConfig;
use crate::error::{CalTrackError, CalTrackResult};

pub trait SubjectTransform: Send + Sync {
    fn transform(&self, subject: &str) -> CalTrackResult<String>;
}

impl<F> SubjectTransform for F
where
    F: Fn(&str) -> CalTrackResult<String> + Send + Sync,
{
    fn transform(&self, subject: &str) -> CalTrackResult<String> {
        self(subject)
    }
}

/// Trim surrounding whitespace. The default.
pub struct TrimTransform;

impl SubjectTransform for TrimTransform {
    fn transform(&self, subject: &str) -> CalTrackResult<String> {
        Ok(subject.trim().to_string())
    }
}

/// Regex replace-all, then trim.
pub struct RegexTransform {
    re: Regex,
    replacement: String,
}

impl RegexTransform {
    pub fn new(pattern: &str, replacement: &str) -> CalTrackResult<Self> {
        let re = Regex::new(pattern).map_err(|e| CalTrackError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(RegexTransform {
            re,
            replacement: replacement.to_string(),
        })
    }
}

impl SubjectTransform for RegexTransform {
    fn transform(&self, subject: &str) -> CalTrackResult<String> {
        Ok(self
            .re
            .replace_all(subject, self.replacement.as_str())
            .trim()
            .to_string())
    }
}

impl TransformConfig {
    pub fn build(&self) -> CalTrackResult<Box<dyn SubjectTransform>> {
        match self.pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => {
                Ok(Box::new(RegexTransform::new(pattern, &self.replacement)?))
            }
            _ => Ok(Box::new(TrimTransform)),
        }
    }
}
