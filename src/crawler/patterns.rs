//! Text pattern mining
//!
//! Optional extraction pass that scans a page's text for well-known shapes:
//! email addresses, phone numbers, bare URLs, prices and dates.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// A family of text patterns that can be mined from page text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPattern {
    Emails,
    Phones,
    Urls,
    Prices,
    Dates,
}

impl TextPattern {
    /// Key under which matches are stored in a page record
    pub fn key(&self) -> &'static str {
        match self {
            Self::Emails => "emails",
            Self::Phones => "phones",
            Self::Urls => "urls",
            Self::Prices => "prices",
            Self::Dates => "dates",
        }
    }

    fn expressions(&self) -> &'static [&'static str] {
        match self {
            Self::Emails => &[r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"],
            Self::Phones => &[
                r"\+86[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}[-.\s]?[0-9]{4}",
                r"\+?1?[-.\s]?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}",
                r"[0-9]{3}[-.\s]?[0-9]{4}[-.\s]?[0-9]{4}",
            ],
            Self::Urls => &[r#"https?://[^\s<>"{}|\\^`\[\]]+"#],
            Self::Prices => &[
                r"¥\s*\d+(?:,\d{3})*(?:\.\d{2})?",
                r"\$\s*\d+(?:,\d{3})*(?:\.\d{2})?",
                r"€\s*\d+(?:,\d{3})*(?:\.\d{2})?",
                r"\d+(?:,\d{3})*(?:\.\d{2})?\s*(?:美元|欧元|元)",
            ],
            Self::Dates => &[
                r"\d{4}-\d{2}-\d{2}",
                r"\d{2}/\d{2}/\d{4}",
                r"\d{4}年\d{1,2}月\d{1,2}日",
                r"\d{1,2}月\d{1,2}日",
            ],
        }
    }
}

impl fmt::Display for TextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A compiled set of text patterns
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    compiled: Vec<(TextPattern, Vec<Regex>)>,
}

impl PatternMatcher {
    /// Compiles the expressions for each requested pattern
    pub fn new(patterns: &[TextPattern]) -> Result<Self, regex::Error> {
        let mut compiled = Vec::with_capacity(patterns.len());
        let mut seen = HashSet::new();

        for pattern in patterns {
            if !seen.insert(*pattern) {
                continue;
            }
            let regexes = pattern
                .expressions()
                .iter()
                .map(|expr| Regex::new(expr))
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push((*pattern, regexes));
        }

        Ok(Self { compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Finds matches for every compiled pattern
    ///
    /// Matches are de-duplicated per pattern, keeping first-seen order. A
    /// pattern with no matches is still returned, with an empty list.
    pub fn find_all(&self, text: &str) -> Vec<(TextPattern, Vec<String>)> {
        self.compiled
            .iter()
            .map(|(pattern, regexes)| {
                let mut seen = HashSet::new();
                let mut found = Vec::new();
                for regex in regexes {
                    for m in regex.find_iter(text) {
                        let value = m.as_str().trim();
                        if !value.is_empty() && seen.insert(value.to_string()) {
                            found.push(value.to_string());
                        }
                    }
                }
                (*pattern, found)
            })
            .collect()
    }
}
