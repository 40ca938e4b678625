use docx_rs::{
    DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild, StructuredDataTag,
    StructuredDataTagChild, Table, TableCellContent, TableChild, TableRowChild, read_docx,
};

use crate::{error::ExtractionError, models::DocumentFormat};

/// Extracts raw text, without formatting, from a DOCX package
pub trait DocxDecoder: Send + Sync {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// `DocxDecoder` backed by `docx-rs`.
///
/// Paragraphs are separated by a blank line, tabs and breaks are kept as
/// `\t` and `\n`. Table cells are read as ordinary paragraphs. Text inside
/// hyperlinks, tracked insertions and content controls counts as body text;
/// tracked deletions do not.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxRsDecoder;

impl DocxDecoder for DocxRsDecoder {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let docx = read_docx(bytes).map_err(|e| ExtractionError::decode(DocumentFormat::Docx, e))?;

        let mut paragraphs = Vec::new();
        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(paragraph) => paragraphs.push(paragraph_text(paragraph)),
                DocumentChild::Table(table) => collect_table(table, &mut paragraphs),
                DocumentChild::StructuredDataTag(tag) => collect_block_tag(tag, &mut paragraphs),
                _ => {}
            }
        }

        Ok(paragraphs.join("\n\n"))
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_paragraph_children(&paragraph.children, &mut text);
    text
}

fn push_paragraph_children(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, text),
            ParagraphChild::Hyperlink(link) => push_paragraph_children(&link.children, text),
            ParagraphChild::Insert(insert) => {
                for child in &insert.children {
                    if let InsertChild::Run(run) = child {
                        push_run(run, text);
                    }
                }
            }
            ParagraphChild::StructuredDataTag(tag) => push_inline_tag(tag, text),
            _ => {}
        }
    }
}

fn push_run(run: &Run, text: &mut String) {
    for run_child in &run.children {
        match run_child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}

/// Content control inside a paragraph
fn push_inline_tag(tag: &StructuredDataTag, text: &mut String) {
    for child in &tag.children {
        match child {
            StructuredDataTagChild::Run(run) => push_run(run, text),
            StructuredDataTagChild::Paragraph(paragraph) => {
                push_paragraph_children(&paragraph.children, text)
            }
            StructuredDataTagChild::StructuredDataTag(nested) => push_inline_tag(nested, text),
            _ => {}
        }
    }
}

/// Content control wrapping whole paragraphs or tables
fn collect_block_tag(tag: &StructuredDataTag, paragraphs: &mut Vec<String>) {
    let mut loose_runs = String::new();
    for child in &tag.children {
        match child {
            StructuredDataTagChild::Paragraph(paragraph) => paragraphs.push(paragraph_text(paragraph)),
            StructuredDataTagChild::Table(table) => collect_table(table, paragraphs),
            StructuredDataTagChild::StructuredDataTag(nested) => collect_block_tag(nested, paragraphs),
            StructuredDataTagChild::Run(run) => push_run(run, &mut loose_runs),
            _ => {}
        }
    }
    if !loose_runs.is_empty() {
        paragraphs.push(loose_runs);
    }
}

fn collect_table(table: &Table, paragraphs: &mut Vec<String>) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => {
                        paragraphs.push(paragraph_text(paragraph))
                    }
                    TableCellContent::Table(nested) => collect_table(nested, paragraphs),
                    TableCellContent::StructuredDataTag(tag) => collect_block_tag(tag, paragraphs),
                    _ => {}
                }
            }
        }
    }
}
