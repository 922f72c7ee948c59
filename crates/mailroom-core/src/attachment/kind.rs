//! Effective attachment type resolution
//!
//! The declared MIME type wins whenever it is present and specific. Only an
//! absent or generic declared type falls back to the filename extension.

use std::path::Path;

/// Format category an attachment is converted as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Spreadsheet,
    WordDocument,
    Pdf,
    Unknown,
}

impl AttachmentKind {
    /// Human-readable label used in messages and errors
    pub fn label(self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Spreadsheet => "spreadsheet",
            AttachmentKind::WordDocument => "word document",
            AttachmentKind::Pdf => "pdf",
            AttachmentKind::Unknown => "unknown",
        }
    }
}

/// Declared types that carry no format information
const GENERIC_MIME_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

fn is_spreadsheet(mime: &str) -> bool {
    mime.contains("spreadsheet") || mime.contains("excel")
}

fn is_word(mime: &str) -> bool {
    mime.contains("word")
}

fn is_pdf(mime: &str) -> bool {
    mime.contains("pdf")
}

/// Keyword rules over a lower-cased MIME type, first match wins
const MIME_RULES: &[(fn(&str) -> bool, AttachmentKind)] = &[
    (is_image, AttachmentKind::Image),
    (is_spreadsheet, AttachmentKind::Spreadsheet),
    (is_word, AttachmentKind::WordDocument),
    (is_pdf, AttachmentKind::Pdf),
];

/// Extension rules over a lower-cased extension (no dot)
const EXTENSION_RULES: &[(&[&str], AttachmentKind)] = &[
    (&["xlsx", "xls"], AttachmentKind::Spreadsheet),
    (&["docx", "doc"], AttachmentKind::WordDocument),
    (&["pdf"], AttachmentKind::Pdf),
    (&["jpg", "jpeg", "png", "webp"], AttachmentKind::Image),
];

/// Lower-case a declared type and drop parameters such as `; name=x.pdf`
pub fn normalize_mime(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// True when the declared type should defer to the filename
pub fn is_generic(mime: &str) -> bool {
    mime.is_empty() || GENERIC_MIME_TYPES.contains(&mime)
}

/// Classify a normalized MIME type
pub fn kind_from_mime(mime: &str) -> AttachmentKind {
    MIME_RULES
        .iter()
        .find(|(matches, _)| matches(mime))
        .map(|(_, kind)| *kind)
        .unwrap_or(AttachmentKind::Unknown)
}

/// Classify a filename by its extension, case-insensitively
pub fn kind_from_filename(filename: &str) -> AttachmentKind {
    let Some(ext) = Path::new(filename).extension().and_then(|e| e.to_str()) else {
        return AttachmentKind::Unknown;
    };
    let ext = ext.to_ascii_lowercase();
    EXTENSION_RULES
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map(|(_, kind)| *kind)
        .unwrap_or(AttachmentKind::Unknown)
}

/// Resolve the effective kind from the declared type and optional filename
pub fn resolve(declared_mime: &str, filename: Option<&str>) -> AttachmentKind {
    let mime = normalize_mime(declared_mime);
    if !is_generic(&mime) {
        return kind_from_mime(&mime);
    }
    filename
        .map(kind_from_filename)
        .unwrap_or(AttachmentKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types() {
        let cases = [
            ("image/jpeg", AttachmentKind::Image),
            ("IMAGE/WEBP", AttachmentKind::Image),
            (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                AttachmentKind::Spreadsheet,
            ),
            ("application/vnd.ms-excel", AttachmentKind::Spreadsheet),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                AttachmentKind::WordDocument,
            ),
            ("application/msword", AttachmentKind::WordDocument),
            ("application/pdf", AttachmentKind::Pdf),
            ("application/pdf; name=\"invoice.pdf\"", AttachmentKind::Pdf),
            ("text/calendar", AttachmentKind::Unknown),
        ];
        for (mime, expected) in cases {
            assert_eq!(resolve(mime, None), expected, "{mime}");
        }
    }

    #[test]
    fn test_extension_fallback_is_case_insensitive() {
        assert_eq!(resolve("", Some("report.XLSX")), AttachmentKind::Spreadsheet);
        assert_eq!(
            resolve("application/octet-stream", Some("Scan.JPEG")),
            AttachmentKind::Image
        );
        assert_eq!(
            resolve("Application/Octet-Stream", Some("notes.docx")),
            AttachmentKind::WordDocument
        );
        assert_eq!(resolve("", Some("contract.pdf")), AttachmentKind::Pdf);
        assert_eq!(resolve("", Some("ledger.Xls")), AttachmentKind::Spreadsheet);
        assert_eq!(resolve("", Some("memo.DOC")), AttachmentKind::WordDocument);
        assert_eq!(
            resolve("binary/octet-stream", Some("chart.PNG")),
            AttachmentKind::Image
        );
        assert_eq!(resolve("", Some("photo.webp")), AttachmentKind::Image);
    }

    #[test]
    fn test_specific_declared_type_beats_extension() {
        assert_eq!(resolve("text/csv", Some("data.xlsx")), AttachmentKind::Unknown);
        assert_eq!(resolve("application/pdf", Some("photo.png")), AttachmentKind::Pdf);
    }

    #[test]
    fn test_unresolvable() {
        assert_eq!(resolve("", None), AttachmentKind::Unknown);
        assert_eq!(resolve("", Some("archive.tar.gz")), AttachmentKind::Unknown);
        assert_eq!(resolve("", Some("README")), AttachmentKind::Unknown);
    }
}
