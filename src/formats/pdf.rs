use crate::error::{AppError, Result};
use crate::formats::{ExtractedDocument, FormatHandler};
use lopdf::Document;
use std::path::Path;

/// Handler for PDF files. Each PDF page becomes one page of text.
pub struct PdfHandler;

impl PdfHandler {
    /// Decode a PDF info dictionary string.
    fn info_string(obj: &lopdf::Object) -> Option<String> {
        match obj {
            lopdf::Object::String(bytes, _) => {
                // UTF-16BE with BOM
                if bytes.starts_with(&[0xFE, 0xFF]) {
                    let utf16: Vec<u16> = bytes[2..]
                        .chunks(2)
                        .map(|chunk| {
                            u16::from_be_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)])
                        })
                        .collect();
                    String::from_utf16(&utf16).ok()
                } else {
                    // UTF-8, falling back to Latin-1
                    Some(
                        String::from_utf8(bytes.clone())
                            .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect()),
                    )
                }
            }
            lopdf::Object::Name(name) => String::from_utf8(name.clone()).ok(),
            _ => None,
        }
    }

    /// Read a non-empty entry of the document info dictionary.
    fn info_entry(doc: &Document, key: &[u8]) -> Option<String> {
        let info_ref = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
        let info = doc.get_dictionary(info_ref).ok()?;
        let text = Self::info_string(info.get(key).ok()?)?;
        let trimmed = text.trim();

        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Collapse runs of blank lines and trailing spaces left by text extraction.
    fn tidy(text: &str) -> String {
        text.lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FormatHandler for PdfHandler {
    fn extract(&self, path: &Path, _chars_per_page: usize) -> Result<ExtractedDocument> {
        let doc = Document::load(path).map_err(|e| AppError::Pdf(e.to_string()))?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            // Pages without a text layer (scans, images) come back empty.
            let text = match doc.extract_text(&[*page_number]) {
                Ok(text) => Self::tidy(&text),
                Err(e) => {
                    tracing::debug!(page = page_number, error = %e, "No text on PDF page");
                    String::new()
                }
            };
            pages.push(text);
        }

        if pages.iter().all(|p| p.is_empty()) {
            return Err(AppError::InvalidInput(
                "PDF contains no extractable text".to_string(),
            ));
        }

        Ok(ExtractedDocument {
            title: Self::info_entry(&doc, b"Title"),
            description: Self::info_entry(&doc, b"Subject"),
            pages,
        })
    }
}

/// Write a small PDF with one text page per entry and an optional
/// (title, subject) info dictionary. Empty entries become pages without text.
#[cfg(test)]
pub(crate) fn write_sample_pdf(
    path: &Path,
    pages: &[&str],
    info: Option<(&str, &str)>,
) -> lopdf::Result<()> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some((title, subject)) = info {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Subject" => Object::string_literal(subject),
        });
        doc.trailer.set("Info", info_id);
    }

    doc.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_string_utf16() {
        let obj = lopdf::Object::String(
            vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69],
            lopdf::StringFormat::Literal,
        );
        assert_eq!(PdfHandler::info_string(&obj), Some("Hi".to_string()));
    }

    #[test]
    fn test_info_string_latin1() {
        let obj = lopdf::Object::String(vec![0x43, 0x61, 0x66, 0xE9], lopdf::StringFormat::Literal);
        assert_eq!(PdfHandler::info_string(&obj), Some("Café".to_string()));
    }

    #[test]
    fn test_tidy() {
        assert_eq!(PdfHandler::tidy("line one   \n\n  \nline two\n"), "line one\nline two");
    }

    #[test]
    fn test_missing_file() {
        let result = PdfHandler.extract(Path::new("/nonexistent/book.pdf"), 100);
        assert!(matches!(result, Err(AppError::Pdf(_))));
    }

    #[test]
    fn test_extract_pages_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voyage.pdf");
        write_sample_pdf(
            &path,
            &["The ship left at dawn.", "Land was sighted at noon."],
            Some(("The Voyage", "A short sea story")),
        )
        .unwrap();

        let doc = PdfHandler.extract(&path, 100).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[0].contains("The ship left at dawn."));
        assert!(doc.pages[1].contains("Land was sighted at noon."));
        assert_eq!(doc.title.as_deref(), Some("The Voyage"));
        assert_eq!(doc.description.as_deref(), Some("A short sea story"));
    }

    #[test]
    fn test_extract_without_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.pdf");
        write_sample_pdf(&path, &["Only a page of text."], None).unwrap();

        let doc = PdfHandler.extract(&path, 100).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.title.is_none());
        assert!(doc.description.is_none());
    }

    #[test]
    fn test_blank_page_kept_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gap.pdf");
        write_sample_pdf(&path, &["Before the gap.", "", "After the gap."], None).unwrap();

        let doc = PdfHandler.extract(&path, 100).unwrap();
        assert_eq!(doc.pages.len(), 3);
        assert!(doc.pages[0].contains("Before the gap."));
        assert!(doc.pages[1].is_empty());
        assert!(doc.pages[2].contains("After the gap."));
    }

    #[test]
    fn test_no_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        write_sample_pdf(&path, &["", ""], None).unwrap();

        let result = PdfHandler.extract(&path, 100);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
