//! HTML extractor producing page records
//!
//! This module turns a fetched [`Document`] into a [`PageRecord`]:
//! - Page title (from the first `<title>` tag)
//! - Same-origin links (from `<a href>` tags)
//! - Images, tables and forms
//! - Ad hoc key/value text for configured selectors
//! - Optional text pattern matches
//!
//! Extraction never fails. Missing attributes become empty strings and a
//! document without matching elements yields empty collections.

use crate::config::{compile_selector, ExtractConfig};
use crate::crawler::fetcher::Document;
use crate::crawler::patterns::PatternMatcher;
use crate::url::{Address, Origin};
use crate::ConfigError;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// A table as rows of cell text
pub type Table = Vec<Vec<String>>;

/// Structured content extracted from one successfully fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// The fetched address
    pub address: Address,

    /// Text of the `<title>` element, empty if absent
    pub title: String,

    /// When extraction completed
    pub fetched_at: DateTime<Utc>,

    /// Same-origin links in document order (not de-duplicated)
    pub links: Vec<Address>,

    pub images: Vec<ImageRecord>,

    pub tables: Vec<Table>,

    pub forms: Vec<FormRecord>,

    /// Text of the first element matching each configured selector, in selector order
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "ordered_pairs")]
    pub fields: Vec<(String, String)>,

    /// Text pattern matches keyed by pattern name, in configured pattern order
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "ordered_pairs")]
    pub matches: Vec<(String, Vec<String>)>,
}

impl PageRecord {
    /// Returns the ad hoc text stored for a selector
    pub fn field(&self, selector: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == selector)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the matches stored for a pattern name
    pub fn matches_for(&self, pattern: &str) -> Option<&[String]> {
        self.matches
            .iter()
            .find(|(key, _)| key == pattern)
            .map(|(_, found)| found.as_slice())
    }

    /// Flattens the record into key/value pairs for tabular output
    ///
    /// Base columns come first (`url`, `title`, `fetched_at`), then the ad hoc
    /// fields, then pattern matches joined with `"; "`.
    pub fn flat_row(&self) -> Vec<(String, String)> {
        let mut row = vec![
            ("url".to_string(), self.address.to_string()),
            ("title".to_string(), self.title.clone()),
            ("fetched_at".to_string(), self.fetched_at.to_rfc3339()),
        ];

        for (key, value) in &self.fields {
            row.push((key.clone(), value.clone()));
        }

        for (key, values) in &self.matches {
            row.push((key.clone(), values.join("; ")));
        }

        row
    }
}

/// Serde adapter storing ordered key/value pairs as a map
mod ordered_pairs {
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(pairs: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(pairs.iter().map(|(key, value)| (key, value)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct PairsVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    pairs.push(entry);
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor(PhantomData))
    }
}

/// An `<img>` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Source resolved against the page address
    pub url: String,
    pub alt: String,
    /// Display hint, kept verbatim
    pub width: String,
    /// Display hint, kept verbatim
    pub height: String,
}

/// A `<form>` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    /// Action resolved against the page address
    pub action: String,
    pub method: String,
    pub fields: Vec<FormField>,
}

/// An `<input>` element inside a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub value: String,
}

/// Extracts page records for one crawl origin
#[derive(Debug, Clone)]
pub struct PageExtractor {
    origin: Origin,
    selectors: Vec<(String, Selector)>,
    patterns: PatternMatcher,
}

impl PageExtractor {
    /// Creates an extractor for the given origin and extraction settings
    ///
    /// # Returns
    ///
    /// * `Ok(PageExtractor)` - All selectors and patterns compiled
    /// * `Err(ConfigError)` - A selector or pattern failed to compile
    pub fn new(origin: Origin, config: &ExtractConfig) -> Result<Self, ConfigError> {
        let selectors = config
            .selectors
            .iter()
            .map(|css| compile_selector(css).map(|selector| (css.clone(), selector)))
            .collect::<Result<Vec<_>, _>>()?;

        let patterns = PatternMatcher::new(&config.patterns)
            .map_err(|e| ConfigError::Validation(format!("Invalid text pattern: {}", e)))?;

        Ok(Self {
            origin,
            selectors,
            patterns,
        })
    }

    /// Creates an extractor that only produces the structural fields
    pub fn structural(origin: Origin) -> Self {
        Self {
            origin,
            selectors: Vec::new(),
            patterns: PatternMatcher::default(),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Extracts a page record from a document
    ///
    /// Relative references are resolved against the document's address.
    pub fn extract(&self, document: &Document) -> PageRecord {
        let html = Html::parse_document(document.body());
        let base = document.address();

        let fields = self.extract_fields(&html);
        let matches = if self.patterns.is_empty() {
            Vec::new()
        } else {
            let text = page_text(&html);
            self.patterns
                .find_all(&text)
                .into_iter()
                .map(|(pattern, found)| (pattern.key().to_string(), found))
                .collect()
        };

        PageRecord {
            address: base.clone(),
            title: extract_title(&html),
            links: extract_links(&html, base, &self.origin),
            images: extract_images(&html, base),
            tables: extract_tables(&html),
            forms: extract_forms(&html, base),
            fields,
            matches,
            fetched_at: Utc::now(),
        }
    }

    fn extract_fields(&self, html: &Html) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = Vec::with_capacity(self.selectors.len());
        for (key, selector) in &self.selectors {
            if fields.iter().any(|(seen, _)| seen == key) {
                continue;
            }
            if let Some(element) = html.select(selector).next() {
                fields.push((key.clone(), element_text(&element)));
            }
        }
        fields
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| element_text(&element))
        .unwrap_or_default()
}

/// Extracts the links that stay within the crawl origin
fn extract_links(document: &Html, base: &Address, origin: &Origin) -> Vec<Address> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            match base.resolve(href) {
                Some(link) if origin.contains(&link) => links.push(link),
                Some(link) => tracing::trace!("Dropping off-origin link {}", link),
                None => {}
            }
        }
    }

    links
}

/// Extracts `<img>` elements that carry a source
fn extract_images(document: &Html, base: &Address) -> Vec<ImageRecord> {
    let mut images = Vec::new();

    if let Ok(img_selector) = Selector::parse("img") {
        for element in document.select(&img_selector) {
            let attrs = element.value();
            let src = attrs.attr("src").map(str::trim).unwrap_or_default();
            if src.is_empty() {
                continue;
            }

            images.push(ImageRecord {
                url: resolve_reference(base, src),
                alt: attrs.attr("alt").unwrap_or_default().to_string(),
                width: attrs.attr("width").unwrap_or_default().to_string(),
                height: attrs.attr("height").unwrap_or_default().to_string(),
            });
        }
    }

    images
}

/// Extracts tables as rows of trimmed cell text
///
/// Rows without cells and tables without rows are skipped.
fn extract_tables(document: &Html) -> Vec<Table> {
    let (Ok(table_selector), Ok(row_selector), Ok(cell_selector)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td, th"),
    ) else {
        return Vec::new();
    };

    document
        .select(&table_selector)
        .map(|table| {
            table
                .select(&row_selector)
                .map(|row| {
                    row.select(&cell_selector)
                        .map(|cell| element_text(&cell))
                        .collect::<Vec<_>>()
                })
                .filter(|cells| !cells.is_empty())
                .collect::<Table>()
        })
        .filter(|rows| !rows.is_empty())
        .collect()
}

/// Extracts forms with their input fields
fn extract_forms(document: &Html, base: &Address) -> Vec<FormRecord> {
    let (Ok(form_selector), Ok(input_selector)) =
        (Selector::parse("form"), Selector::parse("input"))
    else {
        return Vec::new();
    };

    document
        .select(&form_selector)
        .map(|form| {
            let attrs = form.value();
            let action = attrs.attr("action").unwrap_or_default();

            let fields = form
                .select(&input_selector)
                .map(|input| {
                    let attrs = input.value();
                    FormField {
                        kind: attrs.attr("type").unwrap_or("text").to_string(),
                        name: attrs.attr("name").unwrap_or_default().to_string(),
                        value: attrs.attr("value").unwrap_or_default().to_string(),
                    }
                })
                .collect();

            FormRecord {
                action: resolve_reference(base, action),
                method: attrs.attr("method").unwrap_or("GET").to_string(),
                fields,
            }
        })
        .collect()
}

/// Resolves a reference against the base, keeping it verbatim if it cannot be joined
fn resolve_reference(base: &Address, reference: &str) -> String {
    base.as_url()
        .join(reference.trim())
        .map(|url| url.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

/// Concatenated, trimmed text of an element
fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Whitespace-separated text of the whole document
fn page_text(document: &Html) -> String {
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
