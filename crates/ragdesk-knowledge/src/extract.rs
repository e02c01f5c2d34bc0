//! Text extraction contract.
//!
//! The indexer only understands normalized text: markdown (rendered to plain
//! text) and `.txt`. Binary office formats are converted elsewhere before they
//! reach this crate. CSV and Excel files belong to the tabular engine.

use std::path::Path;

use pulldown_cmark::{Event, Options, Parser, Tag};
use ragdesk_core::error::{RagDeskError, Result};

/// How an uploaded or discovered file is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Markdown,
    PlainText,
    /// Loaded by the tabular engine at startup, never indexed.
    Tabular,
    Unsupported,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::PlainText,
            "csv" | "xlsx" | "xls" => Self::Tabular,
            _ => Self::Unsupported,
        }
    }

    pub fn is_indexable(self) -> bool {
        matches!(self, Self::Markdown | Self::PlainText)
    }
}

/// Read a document and return its plain text.
pub fn extract_text(path: &Path) -> Result<String> {
    let kind = DocumentKind::from_path(path);
    if !kind.is_indexable() {
        return Err(RagDeskError::UnsupportedFormat(
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_else(|| path.display().to_string()),
        ));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(match kind {
        DocumentKind::Markdown => markdown_to_text(&raw),
        _ => strip_front_matter(&raw).to_string(),
    })
}

/// Drop a leading `---` metadata block, if any.
pub fn strip_front_matter(content: &str) -> &str {
    let is_fence = |line: &str| line.trim_end_matches(['\r', '\n']) == "---";
    let mut lines = content.split_inclusive('\n');
    let Some(opening) = lines.next().filter(|line| is_fence(*line)) else {
        return content;
    };
    let mut offset = opening.len();
    for line in lines {
        offset += line.len();
        if is_fence(line) {
            return content[offset..].trim_start_matches(['\r', '\n']);
        }
    }
    content
}

/// Render markdown and keep only the visible text.
pub fn markdown_to_text(markdown: &str) -> String {
    let body = strip_front_matter(markdown);
    let parser = Parser::new_ext(body, Options::ENABLE_TABLES);

    let mut out = String::with_capacity(body.len());
    for event in parser {
        match event {
            Event::Text(t) | Event::Code(t) | Event::Html(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::Rule => out.push('\n'),
            Event::End(
                Tag::Paragraph
                | Tag::Heading(..)
                | Tag::Item
                | Tag::CodeBlock(_)
                | Tag::BlockQuote
                | Tag::TableHead
                | Tag::TableRow,
            ) => out.push('\n'),
            Event::End(Tag::TableCell) => out.push(' '),
            _ => {}
        }
    }
    out
}

/// Write text as markdown with an optional front-matter header.
pub fn save_as_markdown(text: &str, output: &Path, metadata: &[(&str, &str)]) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    if !metadata.is_empty() {
        content.push_str("---\n");
        for (key, value) in metadata {
            content.push_str(&format!("{key}: {value}\n"));
        }
        content.push_str("---\n\n");
    }
    content.push_str(text);
    std::fs::write(output, content)?;
    Ok(())
}
