//! Prompt templates

use crate::format::BlockFormat;
use crate::model::Prompt;

/// Default template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "Generate {count} funny, sarcastic, or witty tech-related \
social media posts. Each post must be between {min_chars} and {max_chars} characters long, \
upbeat in tone, and must not repeat earlier posts.\n\n{format}";

/// A prompt template with `{count}`, `{min_chars}`, `{max_chars}` and `{format}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the template for one generation round
    pub fn render(
        &self,
        count: usize,
        min_chars: usize,
        max_chars: usize,
        format: &BlockFormat,
    ) -> Prompt {
        let instructions = format.instructions(count);

        let mut text = self
            .template
            .replace("{count}", &count.to_string())
            .replace("{min_chars}", &min_chars.to_string())
            .replace("{max_chars}", &max_chars.to_string());

        if text.contains("{format}") {
            text = text.replace("{format}", &instructions);
        } else {
            text.push_str("\n\n");
            text.push_str(&instructions);
        }

        Prompt::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_placeholders() {
        let prompt = PromptTemplate::default().render(5, 1, 280, &BlockFormat::default());

        assert!(prompt.as_str().contains("Generate 5 "));
        assert!(prompt.as_str().contains("between 1 and 280 characters"));
        assert!(prompt.as_str().contains("Tweet 1:"));
        assert!(!prompt.as_str().contains("{format}"));
    }

    #[test]
    fn test_render_appends_format_when_placeholder_missing() {
        let template = PromptTemplate::new("Write {count} posts about Rust.");
        let prompt = template.render(3, 10, 200, &BlockFormat::new("Post", None));

        assert!(prompt.as_str().starts_with("Write 3 posts about Rust."));
        assert!(prompt.as_str().contains("Post 1:"));
    }
}
