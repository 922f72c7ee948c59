//! Word-processing document conversion: DOCX -> HTML -> Markdown

use std::io::{Cursor, Read};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{Error, Result};

const MAIN_PART: &str = "word/document.xml";

/// Convert a .docx package to Markdown
pub fn docx_to_markdown(bytes: &[u8]) -> Result<String> {
    let html = docx_to_html(bytes)?;
    let markdown = html_to_markdown_rs::convert(&html, None)
        .map_err(|e| Error::conversion("word document", e))?;
    debug!(
        "Converted word document: {} bytes html -> {} bytes markdown",
        html.len(),
        markdown.len()
    );
    Ok(markdown.trim().to_string())
}

/// Extract the main document part and render it as HTML
pub fn docx_to_html(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::conversion("word document", format!("not a docx package: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(MAIN_PART)
        .map_err(|e| Error::conversion("word document", format!("{MAIN_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::conversion("word document", e))?;

    document_xml_to_html(&xml)
}

#[derive(Default)]
struct Paragraph {
    style: Option<String>,
    is_list: bool,
    html: String,
}

#[derive(Default, Clone, Copy)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
}

/// Streaming WordprocessingML walker. Paragraphs and runs nest when a run
/// holds a text box (`w:txbxContent`), so both are kept as stacks.
#[derive(Default)]
struct HtmlBuilder {
    out: String,
    paragraphs: Vec<Paragraph>,
    runs: Vec<RunFormat>,
    in_run_props: bool,
    in_paragraph_props: bool,
    in_text: bool,
    in_list: bool,
    table_depth: usize,
}

impl HtmlBuilder {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"p" => self.paragraphs.push(Paragraph::default()),
            b"pPr" => self.in_paragraph_props = true,
            b"r" => self.runs.push(RunFormat::default()),
            b"rPr" => self.in_run_props = true,
            b"t" => self.in_text = self.in_run(),
            b"tbl" => {
                self.close_list();
                self.table_depth += 1;
                self.out.push_str("<table>");
            }
            b"tr" => self.out.push_str("<tr>"),
            b"tc" => self.out.push_str("<td>"),
            _ => self.property(e),
        }
    }

    fn in_run(&self) -> bool {
        !self.runs.is_empty()
    }

    /// Self-closing elements: properties, breaks and tabs
    fn empty(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"br" | b"cr" if self.in_run() => self.push_html("<br>"),
            b"tab" if self.in_run() => self.push_html(" "),
            _ => self.property(e),
        }
    }

    fn property(&mut self, e: &BytesStart<'_>) {
        let name = e.local_name();
        if self.in_run_props {
            if let Some(run) = self.runs.last_mut() {
                match name.as_ref() {
                    b"b" => run.bold = toggle_on(e),
                    b"i" => run.italic = toggle_on(e),
                    b"u" => run.underline = val_attr(e).map_or(true, |v| v != "none"),
                    _ => {}
                }
            }
        } else if self.in_paragraph_props {
            if let Some(paragraph) = self.paragraphs.last_mut() {
                match name.as_ref() {
                    b"pStyle" => paragraph.style = val_attr(e),
                    b"numPr" => paragraph.is_list = true,
                    _ => {}
                }
            }
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"p" => self.finish_paragraph(),
            b"pPr" => self.in_paragraph_props = false,
            b"r" => {
                self.runs.pop();
            }
            b"rPr" => self.in_run_props = false,
            b"t" => self.in_text = false,
            b"tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                self.out.push_str("</table>");
            }
            b"tr" => self.out.push_str("</tr>"),
            b"tc" => self.out.push_str("</td>"),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.in_text || text.is_empty() {
            return;
        }
        let run = self.runs.last().copied().unwrap_or_default();
        let mut html = escape(text).into_owned();
        if run.underline {
            html = format!("<u>{html}</u>");
        }
        if run.italic {
            html = format!("<em>{html}</em>");
        }
        if run.bold {
            html = format!("<strong>{html}</strong>");
        }
        self.push_html(&html);
    }

    fn push_html(&mut self, html: &str) {
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.html.push_str(html);
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(paragraph) = self.paragraphs.pop() else {
            return;
        };
        let body = paragraph.html.trim();

        // Text box content stays inline in the paragraph that anchors it
        if let Some(outer) = self.paragraphs.last_mut() {
            if !body.is_empty() {
                if !outer.html.is_empty() && !outer.html.ends_with(char::is_whitespace) {
                    outer.html.push(' ');
                }
                outer.html.push_str(body);
                outer.html.push(' ');
            }
            return;
        }

        if self.table_depth > 0 {
            if !body.is_empty() {
                self.out.push_str(body);
                self.out.push(' ');
            }
            return;
        }

        if paragraph.is_list {
            if !self.in_list {
                self.out.push_str("<ul>");
                self.in_list = true;
            }
            self.out.push_str(&format!("<li>{body}</li>"));
            return;
        }

        self.close_list();
        if body.is_empty() {
            return;
        }
        match paragraph.style.as_deref().and_then(heading_level) {
            Some(level) => self.out.push_str(&format!("<h{level}>{body}</h{level}>")),
            None => self.out.push_str(&format!("<p>{body}</p>")),
        }
    }

    fn close_list(&mut self) {
        if self.in_list {
            self.out.push_str("</ul>");
            self.in_list = false;
        }
    }

    fn finish(mut self) -> String {
        self.close_list();
        self.out
    }
}

/// `w:val` attribute of an element, whatever its namespace prefix
fn val_attr(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// OOXML on/off properties are on unless explicitly `0`/`false`/`none`
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(val_attr(e).as_deref(), Some("0" | "false" | "off" | "none"))
}

/// Map built-in paragraph styles to heading levels
fn heading_level(style: &str) -> Option<u8> {
    let style = style.to_ascii_lowercase().replace(' ', "");
    match style.as_str() {
        "title" => Some(1),
        "subtitle" => Some(2),
        _ => style
            .strip_prefix("heading")
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=6).contains(n)),
    }
}

/// Render `word/document.xml` as HTML
pub fn document_xml_to_html(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut builder = HtmlBuilder::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => builder.start(&e),
            Ok(Event::Empty(e)) => builder.empty(&e),
            Ok(Event::End(e)) => builder.end(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::conversion("word document", e))?;
                builder.text(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::conversion(
                    "word document",
                    format!("malformed XML at byte {}: {e}", reader.buffer_position()),
                ))
            }
        }
    }

    Ok(builder.finish())
}
