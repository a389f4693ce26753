//! The filter engine.
//!
//! Raw filter definitions from the configuration are compiled once at startup
//! into an immutable [`FilterSet`], which is then evaluated against every
//! incoming event.

use crate::core::NormalizedEvent;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

/// A filter as it appears in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilter {
    pub name: String,
    #[serde(default, rename = "subreddits", alias = "forums")]
    pub forums: Vec<String>,
    /// An empty string means the text predicate is absent.
    #[serde(default, alias = "textRegex")]
    pub text_regex: String,
    /// An empty string means the author predicate is absent.
    #[serde(default, alias = "authorRegex")]
    pub author_regex: String,
}

/// The regex-bearing fields of a [`RawFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    TextRegex,
    AuthorRegex,
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterField::TextRegex => write!(f, "text_regex"),
            FilterField::AuthorRegex => write!(f, "author_regex"),
        }
    }
}

/// A malformed filter definition. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error regex parsing filter[{index}].{field}({pattern:?}): {source}")]
    InvalidRegex {
        index: usize,
        field: FilterField,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("filter[{index}] has an empty name")]
    EmptyName { index: usize },
}

/// A single compiled filter.
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    forums: HashSet<String>,
    text_pattern: Option<Regex>,
    author_pattern: Option<Regex>,
}

impl Filter {
    /// Compiles a raw definition. `index` is only used for error reporting.
    pub fn compile(index: usize, raw: &RawFilter) -> Result<Self, ConfigError> {
        if raw.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { index });
        }

        Ok(Self {
            name: raw.name.clone(),
            forums: raw.forums.iter().map(|f| f.to_lowercase()).collect(),
            text_pattern: compile_optional(index, FilterField::TextRegex, &raw.text_regex)?,
            author_pattern: compile_optional(index, FilterField::AuthorRegex, &raw.author_regex)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lower-cased forums this filter applies to.
    pub fn forums(&self) -> &HashSet<String> {
        &self.forums
    }

    /// Evaluates every active predicate against the event.
    ///
    /// An empty forum set never matches.
    pub fn is_match(&self, event: &NormalizedEvent) -> bool {
        if !self.forums.contains(&event.forum.to_lowercase()) {
            return false;
        }
        if let Some(regex) = &self.text_pattern {
            if !regex.is_match(&event.filterable_text) {
                return false;
            }
        }
        if let Some(regex) = &self.author_pattern {
            if !regex.is_match(&event.author) {
                return false;
            }
        }
        true
    }
}

fn compile_optional(
    index: usize,
    field: FilterField,
    pattern: &str,
) -> Result<Option<Regex>, ConfigError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| ConfigError::InvalidRegex {
            index,
            field,
            pattern: pattern.to_string(),
            source,
        })
}

/// The ordered, immutable collection of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    /// Compiles all raw filters, preserving their order.
    ///
    /// Fails on the first invalid definition; no partial set is returned.
    pub fn new(raw: &[RawFilter]) -> Result<Self, ConfigError> {
        let filters = raw
            .iter()
            .enumerate()
            .map(|(index, f)| Filter::compile(index, f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// The sorted union of every filter's forums.
    pub fn forums(&self) -> Vec<String> {
        self.filters
            .iter()
            .flat_map(|f| f.forums.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns the filter that should alert for this event, if any.
    ///
    /// When several filters match, the last one in configuration order wins.
    pub fn find_match(&self, event: &NormalizedEvent) -> Option<&Filter> {
        self.filters.iter().fold(None, |selected, filter| {
            if filter.is_match(event) {
                if let Some(previous) = selected {
                    tracing::debug!(
                        previous = previous.name(),
                        current = filter.name(),
                        "Later filter overrides earlier match"
                    );
                }
                Some(filter)
            } else {
                selected
            }
        })
    }

    /// Convenience wrapper over [`FilterSet::find_match`] returning only the name.
    pub fn matching_name(&self, event: &NormalizedEvent) -> Option<&str> {
        self.find_match(event).map(Filter::name)
    }
}
