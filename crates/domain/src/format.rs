//! Block format grammar shared by prompt rendering and response extraction
//!
//! Grammar (version 1):
//! - a block starts on a line beginning with `<label> <number>`, optionally
//!   wrapped in markdown emphasis or preceded by `#` headings, followed by one
//!   of `:` `.` `)` `-` or the end of the line;
//! - the block body runs until the next block label or the end of input;
//! - an optional sub-field marker line splits the body into the post text
//!   and an image suggestion.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Candidate;

/// Errors raised while compiling a block format
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Block label must not be empty")]
    EmptyLabel,
    #[error("Sub-field marker must not be empty")]
    EmptyMarker,
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Versioned description of the numbered-block delimiter convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFormat {
    /// Word that labels each block (e.g., "Tweet")
    pub label: String,
    /// Marker introducing the optional image suggestion line
    pub sub_field_marker: Option<String>,
}

impl Default for BlockFormat {
    fn default() -> Self {
        Self {
            label: "Tweet".to_string(),
            sub_field_marker: Some("Image suggestion:".to_string()),
        }
    }
}

impl BlockFormat {
    pub const VERSION: u32 = 1;

    pub fn new(label: impl Into<String>, sub_field_marker: Option<String>) -> Self {
        Self {
            label: label.into(),
            sub_field_marker,
        }
    }

    /// Compile the grammar into an extractor
    pub fn compile(&self) -> Result<BlockExtractor, FormatError> {
        let label = self.label.trim();
        if label.is_empty() {
            return Err(FormatError::EmptyLabel);
        }

        let block_pattern = Regex::new(&format!(
            r"(?mi)^[ \t>#*_]*{}[ \t]*#?(\d{{1,9}})[ \t*_]*(?:[:.)\-][ \t*_]*|\r?$)",
            regex::escape(label)
        ))?;

        let sub_field_pattern = match &self.sub_field_marker {
            Some(marker) => {
                let marker = marker.trim();
                if marker.is_empty() {
                    return Err(FormatError::EmptyMarker);
                }
                Some(Regex::new(&format!(
                    r"(?mi)^[ \t>*_\-]*{}[ \t*_]*",
                    regex::escape(marker)
                ))?)
            }
            None => None,
        };

        Ok(BlockExtractor {
            block_pattern,
            sub_field_pattern,
        })
    }

    /// Formatting instructions to embed in a prompt
    pub fn instructions(&self, count: usize) -> String {
        let label = self.label.trim();
        let mut text = format!(
            "Return exactly {count} posts. Start each post on its own line with '{label} N:' \
             where N runs from 1 to {count}, then write the post text on the following lines.\n"
        );

        if let Some(marker) = &self.sub_field_marker {
            text.push_str(&format!(
                "Optionally end a post with a line starting '{}' followed by an image idea.\n",
                marker.trim()
            ));
        }

        text.push_str("Do not include any other text or explanations.\n\nFormat:\n");
        text.push_str(&format!("{label} 1:\nyour post\n"));
        if let Some(marker) = &self.sub_field_marker {
            text.push_str(&format!("{} your image idea\n", marker.trim()));
        }
        text.push_str(&format!("\n{label} 2:\n..."));

        text
    }
}

/// Compiled extractor for one block format
#[derive(Debug, Clone)]
pub struct BlockExtractor {
    block_pattern: Regex,
    sub_field_pattern: Option<Regex>,
}

impl BlockExtractor {
    /// Parse raw provider output into candidates
    ///
    /// Returns an empty vector when no block label is present. Text before
    /// the first label and blocks without a body are dropped.
    pub fn extract(&self, raw: &str) -> Vec<Candidate> {
        let starts: Vec<_> = self
            .block_pattern
            .captures_iter(raw)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let index = caps.get(1)?.as_str().parse::<u32>().ok()?;
                Some((index, whole.start(), whole.end()))
            })
            .collect();

        let mut candidates = Vec::with_capacity(starts.len());

        for (position, &(index, _, body_start)) in starts.iter().enumerate() {
            let body_end = starts
                .get(position + 1)
                .map(|&(_, next_start, _)| next_start)
                .unwrap_or(raw.len());
            let body = &raw[body_start..body_end];

            let (text, image_suggestion) = self.split_sub_field(body);
            if text.is_empty() {
                tracing::debug!(index = index, "Dropping block without text");
                continue;
            }

            candidates.push(Candidate {
                index,
                text,
                image_suggestion,
            });
        }

        candidates
    }

    fn split_sub_field(&self, body: &str) -> (String, Option<String>) {
        let Some(pattern) = &self.sub_field_pattern else {
            return (body.trim().to_string(), None);
        };

        match pattern.find(body) {
            Some(found) => {
                let text = body[..found.start()].trim().to_string();
                let image = body[found.end()..].trim();
                let image = (!image.is_empty()).then(|| image.to_string());
                (text, image)
            }
            None => (body.trim().to_string(), None),
        }
    }
}
