// Collaborator adapters for uploads and audio
// Text comes back as `ExtractedContent`; binary results are rejected by the orchestrator


use async_trait::async_trait;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use scraper::{ElementRef, Html};
use std::path::Path;
use tracing::debug;

use crate::config::UploadConfig;
use crate::{RagError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "head", "template", "svg"];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "h1", "h2", "h3",
    "h4", "h5", "h6", "li", "ul", "ol", "pre", "blockquote", "table", "tr", "td", "th", "dt",
    "dd",
];

/// Result of extracting an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    Text(String),
    /// Content with no text representation (images)
    Binary(Vec<u8>),
}

/// Turns uploaded bytes into text
pub trait DocumentParser: Send + Sync {
    fn extract_text(&self, bytes: &[u8], extension: &str) -> Result<ExtractedContent>;
}

/// Speech-to-text provider
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Parser for plain text, Markdown and HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicParser;

impl DocumentParser for BasicParser {
    #[inline]
    fn extract_text(&self, bytes: &[u8], extension: &str) -> Result<ExtractedContent> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(ExtractedContent::Binary(bytes.to_vec()));
        }

        let text = match extension.as_str() {
            "txt" | "text" => decode_utf8(bytes)?,
            "md" | "markdown" => markdown_to_text(&decode_utf8(bytes)?),
            "html" | "htm" => html_to_text(&decode_utf8(bytes)?),
            other => {
                return Err(RagError::UnsupportedContent(format!(
                    "No parser for .{other} files"
                )));
            }
        };

        debug!(
            "Extracted {} characters from .{} upload",
            text.chars().count(),
            extension
        );
        Ok(ExtractedContent::Text(text))
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| RagError::UnsupportedContent("File is not valid UTF-8 text".to_string()))
}

/// Lowercased extension of `filename`, if it has one
#[inline]
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Check an upload against the allowed extensions and size limit, returning its extension
#[inline]
pub fn validate_upload(filename: &str, size: u64, config: &UploadConfig) -> Result<String> {
    let extension = file_extension(filename).ok_or_else(|| {
        RagError::UnsupportedContent(format!("File {filename:?} has no extension"))
    })?;

    if !config
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return Err(RagError::UnsupportedContent(format!(
            "File type .{extension} is not allowed (allowed: {})",
            config.allowed_extensions.join(", ")
        )));
    }

    if size > config.max_file_bytes {
        return Err(RagError::UnsupportedContent(format!(
            "File is {size} bytes; the limit is {} bytes",
            config.max_file_bytes
        )));
    }

    Ok(extension)
}

/// Plain text of a Markdown document, one block per paragraph
#[inline]
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => out.push_str("- "),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock | TagEnd::BlockQuote(_),
            ) => out.push_str("\n\n"),
            Event::End(TagEnd::Item) => out.push('\n'),
            _ => {}
        }
    }

    tidy_whitespace(&out)
}

/// Visible text of an HTML document, skipping scripts and styles
#[inline]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    collect_html_text(document.root_element(), &mut out);
    tidy_whitespace(&out)
}

fn collect_html_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child.value().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }

        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            out.push_str("\n\n");
        }
        collect_html_text(child, out);
        if block {
            out.push_str("\n\n");
        }
    }
}

/// Collapse runs of spaces within lines and keep at most one blank line between blocks
fn tidy_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_blank = false;
    }

    out
}
