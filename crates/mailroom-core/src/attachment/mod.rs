//! Attachment normalization
//!
//! Turns a wire-encoded attachment with an untrusted MIME type into MCP
//! content blocks a text-oriented client can consume:
//!
//! - images are re-encoded as PNG and returned as one image block
//! - spreadsheets render their first sheet as CSV text
//! - word documents become Markdown text
//! - PDFs pass through untouched as a resource block, preceded by a note
//! - anything else yields a short "not converted" text block
//!
//! Normalization is synchronous and CPU bound; async callers should run it on
//! the blocking pool.

mod document;
mod image;
mod kind;
mod spreadsheet;
pub mod wire;

pub use self::image::{to_png, CANONICAL_IMAGE_MIME};
pub use document::{docx_to_html, docx_to_markdown};
pub use kind::{kind_from_filename, kind_from_mime, normalize_mime, resolve, AttachmentKind};
pub use spreadsheet::{first_sheet_to_csv, RenderedSheet};

use tracing::{debug, info};

use crate::error::Result;
use crate::mcp::{ResourceContent, ToolResultContent};

/// MIME type reported for passed-through PDFs
pub const PDF_MIME: &str = "application/pdf";

/// Where an attachment came from, used to build resource locators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSource {
    pub message_id: String,
    pub attachment_id: String,
}

impl AttachmentSource {
    /// Synthetic URI for a passed-through attachment
    pub fn uri(&self) -> String {
        format!(
            "email://{}/attachments/{}",
            self.message_id, self.attachment_id
        )
    }
}

/// One attachment awaiting conversion
#[derive(Debug, Clone)]
pub struct AttachmentDescriptor {
    /// Base64 data as delivered by the provider (URL-safe or standard alphabet)
    pub raw_encoded: String,
    /// MIME type claimed by the sender; may be empty or generic
    pub declared_mime_type: String,
    /// Original filename, used for extension fallback and messages
    pub filename: Option<String>,
    /// Provider identifiers, when known
    pub source: Option<AttachmentSource>,
}

impl AttachmentDescriptor {
    pub fn new(raw_encoded: impl Into<String>, declared_mime_type: impl Into<String>) -> Self {
        Self {
            raw_encoded: raw_encoded.into(),
            declared_mime_type: declared_mime_type.into(),
            filename: None,
            source: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_source(
        mut self,
        message_id: impl Into<String>,
        attachment_id: impl Into<String>,
    ) -> Self {
        self.source = Some(AttachmentSource {
            message_id: message_id.into(),
            attachment_id: attachment_id.into(),
        });
        self
    }

    /// Effective kind after reconciling declared type and filename
    pub fn kind(&self) -> AttachmentKind {
        resolve(&self.declared_mime_type, self.filename.as_deref())
    }

    fn resource_uri(&self) -> String {
        match (&self.source, &self.filename) {
            (Some(source), _) => source.uri(),
            (None, Some(name)) => format!("attachment:///{name}"),
            (None, None) => "attachment:///unnamed".to_string(),
        }
    }

    fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or("attachment")
    }
}

/// Decode and convert an attachment. Either every block is produced or the
/// call fails; there are no partial results.
pub fn normalize(descriptor: &AttachmentDescriptor) -> Result<Vec<ToolResultContent>> {
    let bytes = wire::decode(&descriptor.raw_encoded)?;
    let kind = descriptor.kind();

    info!(
        "Normalizing {} ({} bytes, declared {:?}) as {}",
        descriptor.display_name(),
        bytes.len(),
        descriptor.declared_mime_type,
        kind.label()
    );

    let blocks = match kind {
        AttachmentKind::Image => {
            let png = to_png(&bytes)?;
            vec![ToolResultContent::Image {
                data: wire::encode(&png),
                mime_type: CANONICAL_IMAGE_MIME.to_string(),
            }]
        }
        AttachmentKind::Spreadsheet => {
            let sheet = first_sheet_to_csv(&bytes)?;
            info!("Rendered {} rows from sheet {:?}", sheet.rows, sheet.name);
            vec![ToolResultContent::text(sheet.to_text())]
        }
        AttachmentKind::WordDocument => {
            vec![ToolResultContent::text(docx_to_markdown(&bytes)?)]
        }
        AttachmentKind::Pdf => vec![
            ToolResultContent::text(format!(
                "PDF detected: {} ({} bytes). Returned unconverted as an embedded resource.",
                descriptor.display_name(),
                bytes.len()
            )),
            ToolResultContent::Resource {
                resource: ResourceContent {
                    uri: descriptor.resource_uri(),
                    mime_type: Some(PDF_MIME.to_string()),
                    text: None,
                    blob: Some(wire::encode(&bytes)),
                },
            },
        ],
        AttachmentKind::Unknown => {
            let mime = normalize_mime(&descriptor.declared_mime_type);
            let text = match (&descriptor.filename, mime.is_empty()) {
                (Some(name), false) => format!(
                    "File {name} retrieved ({} bytes, {mime}) but not converted: unsupported type.",
                    bytes.len()
                ),
                (Some(name), true) => format!(
                    "File {name} retrieved ({} bytes) but not converted: unsupported type.",
                    bytes.len()
                ),
                (None, _) => format!(
                    "File retrieved ({} bytes) but not converted: unsupported type.",
                    bytes.len()
                ),
            };
            vec![ToolResultContent::text(text)]
        }
    };

    debug!("Produced {} content block(s)", blocks.len());
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ::image::ImageFormat;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;

    fn wire(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    #[test]
    fn test_images_always_come_back_as_png() {
        for (format, mime) in [
            (ImageFormat::Jpeg, "image/jpeg"),
            (ImageFormat::Png, "image/png"),
            (ImageFormat::WebP, "image/webp"),
            (ImageFormat::Gif, "image/gif"),
        ] {
            let bytes = self::image::tests::sample_image(format);
            let blocks = normalize(&AttachmentDescriptor::new(wire(&bytes), mime)).unwrap();

            assert_eq!(blocks.len(), 1);
            match &blocks[0] {
                ToolResultContent::Image { data, mime_type } => {
                    assert_eq!(mime_type, CANONICAL_IMAGE_MIME);
                    let png = STANDARD.decode(data).unwrap();
                    assert_eq!(::image::guess_format(&png).unwrap(), ImageFormat::Png);
                }
                other => panic!("expected image block for {mime}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_mislabelled_image_uses_extension() {
        let bytes = self::image::tests::sample_image(ImageFormat::Jpeg);
        let descriptor = AttachmentDescriptor::new(wire(&bytes), "application/octet-stream")
            .with_filename("IMG_0042.JPG");
        let blocks = normalize(&descriptor).unwrap();
        assert!(matches!(
            &blocks[0],
            ToolResultContent::Image { mime_type, .. } if mime_type == "image/png"
        ));
    }

    #[test]
    fn test_spreadsheet_renders_first_sheet_only() {
        let bytes = spreadsheet::tests::sample_workbook();
        let descriptor = AttachmentDescriptor::new(wire(&bytes), "").with_filename("report.XLSX");
        let blocks = normalize(&descriptor).unwrap();

        assert_eq!(blocks.len(), 1);
        let text = blocks[0].as_text().unwrap();
        assert!(text.starts_with("Sheet: Sheet1\n"));
        assert!(text.contains("Globex,42"));
        assert!(!text.contains("hidden-from-output"));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn test_word_document_becomes_markdown() {
        let bytes = document::tests::sample_docx();
        let descriptor = AttachmentDescriptor::new(
            wire(&bytes),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        );
        let blocks = normalize(&descriptor).unwrap();

        assert_eq!(blocks.len(), 1);
        let text = blocks[0].as_text().unwrap();
        assert!(text.contains("Quarterly Report"));
        assert!(!text.contains("<p>"));
        assert!(!text.contains("<strong>"));
        assert!(!text.contains("<table>"));
    }

    #[test]
    fn test_pdf_passes_through_byte_for_byte() {
        let bytes: Vec<u8> = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n%%EOF"
            .iter()
            .copied()
            .chain(0u8..=255)
            .collect();
        let descriptor = AttachmentDescriptor::new(wire(&bytes), "application/pdf")
            .with_filename("invoice.pdf")
            .with_source("18c2f0a", "ANGjdJ-x_y");
        let blocks = normalize(&descriptor).unwrap();

        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].as_text().unwrap().starts_with("PDF detected"));
        match &blocks[1] {
            ToolResultContent::Resource { resource } => {
                assert_eq!(resource.uri, "email://18c2f0a/attachments/ANGjdJ-x_y");
                assert_eq!(resource.mime_type.as_deref(), Some(PDF_MIME));
                let blob = resource.blob.as_deref().unwrap();
                assert_eq!(STANDARD.decode(blob).unwrap(), bytes);
            }
            other => panic!("expected resource block, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_mentions_filename() {
        let descriptor =
            AttachmentDescriptor::new(wire(b"BEGIN:VCALENDAR"), "text/calendar").with_filename("invite.ics");
        let blocks = normalize(&descriptor).unwrap();
        assert_eq!(blocks.len(), 1);
        let text = blocks[0].as_text().unwrap();
        assert!(text.contains("invite.ics"));
        assert!(text.contains("not converted"));
    }

    #[test]
    fn test_malformed_wire_data_fails_before_conversion() {
        for raw in ["", "abcde", "%%%%"] {
            let descriptor = AttachmentDescriptor::new(raw, "application/pdf");
            assert!(matches!(normalize(&descriptor), Err(Error::Decode(_))), "{raw:?}");
        }
    }

    #[test]
    fn test_conversion_failure_yields_no_blocks() {
        let descriptor = AttachmentDescriptor::new(wire(b"not a workbook"), "application/vnd.ms-excel");
        let err = normalize(&descriptor).unwrap_err();
        assert!(matches!(err, Error::Conversion { format: "spreadsheet", .. }));
    }
}
