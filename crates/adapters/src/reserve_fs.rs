//! Reserve list loader

use std::path::Path;

/// Load pre-written fallback posts, one per line
///
/// Blank lines and lines starting with `#` are ignored.
pub async fn load_reserve(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(parse_reserve(&contents))
}

pub fn parse_reserve(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
