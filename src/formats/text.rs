use crate::error::Result;
use crate::formats::{ExtractedDocument, FormatHandler};
use std::path::Path;

/// Handler for plain text files.
pub struct TextHandler;

impl FormatHandler for TextHandler {
    fn extract(&self, path: &Path, chars_per_page: usize) -> Result<ExtractedDocument> {
        let content = std::fs::read_to_string(path)?;

        Ok(ExtractedDocument {
            title: None,
            description: None,
            pages: paginate(&content, chars_per_page),
        })
    }
}

/// Split text into pages of at most `max_chars` characters.
///
/// Pages break at the last whitespace inside the budget; a single word
/// longer than the budget is cut. Pages are trimmed and never empty.
pub fn paginate(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pages = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let Some((limit, _)) = rest.char_indices().nth(max_chars) else {
            pages.push(rest.to_string());
            break;
        };

        let cut = if rest[limit..].starts_with(char::is_whitespace) {
            limit
        } else {
            rest[..limit]
                .rfind(char::is_whitespace)
                .filter(|&i| i > 0)
                .unwrap_or(limit)
        };

        let page = rest[..cut].trim_end();
        if !page.is_empty() {
            pages.push(page.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_page() {
        assert_eq!(paginate("  hello world \n", 100), vec!["hello world"]);
    }

    #[test]
    fn test_empty_text_has_no_pages() {
        assert!(paginate("", 10).is_empty());
        assert!(paginate(" \n\t ", 10).is_empty());
    }

    #[test]
    fn test_breaks_at_whitespace() {
        assert_eq!(
            paginate("one two three four", 9),
            vec!["one two", "three", "four"]
        );
    }

    #[test]
    fn test_exact_fit() {
        assert_eq!(paginate("abcd efgh", 4), vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_long_word_is_cut() {
        assert_eq!(paginate("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_multibyte_text() {
        let pages = paginate("ééé ààà üüü", 7);
        assert_eq!(pages, vec!["ééé ààà", "üüü"]);
        assert!(pages.iter().all(|p| p.chars().count() <= 7));
    }

    #[test]
    fn test_extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        std::fs::write(&path, "It was a dark and stormy night.").unwrap();

        let doc = TextHandler.extract(&path, 12).unwrap();
        assert_eq!(doc.pages, vec!["It was a", "dark and", "stormy", "night."]);
        assert!(doc.title.is_none());
    }
}
