//! Debug-level descriptions of analysis results.
//!
//! Purely observational: nothing here feeds back into responses.

use crate::analysis::result::{AnalyzeResult, DocumentStyle, ModelDetails};
use tracing::{debug, Level};

/// Style confidence above which handwritten spans are reported.
pub const HANDWRITING_CONFIDENCE: f32 = 0.8;

/// Pages, lines, selection marks, paragraphs, handwriting and table cells.
pub fn log_layout(result: &AnalyzeResult) {
    for page in result.pages.iter().flatten() {
        debug!(
            page = page.page_number,
            lines = page.lines.len(),
            words = page.words.len(),
            selection_marks = page.selection_marks.len(),
            "layout page"
        );

        for (i, line) in page.lines.iter().enumerate() {
            debug!(
                page = page.page_number,
                line = i,
                polygon = %format_polygon(&line.polygon),
                "line content: '{}'",
                line.content
            );
        }

        for (i, mark) in page.selection_marks.iter().enumerate() {
            debug!(
                page = page.page_number,
                mark = i,
                state = %mark.state,
                polygon = %format_polygon(&mark.polygon),
                "selection mark"
            );
        }
    }

    for paragraph in result.paragraphs.iter().flatten() {
        debug!(role = ?paragraph.role, "paragraph: {}", paragraph.content);
    }

    if tracing::enabled!(Level::DEBUG) {
        for content in handwritten_content(result) {
            debug!("handwritten content: {}", content);
        }
    }

    for (i, table) in result.tables.iter().flatten().enumerate() {
        debug!(
            table = i,
            rows = table.row_count,
            columns = table.column_count,
            "table extracted"
        );
        for cell in &table.cells {
            debug!(
                table = i,
                row = cell.row_index,
                column = cell.column_index,
                kind = %cell.kind,
                "cell content: '{}'",
                cell.content
            );
        }
    }
}

/// Classified documents and their fields.
pub fn log_documents(result: &AnalyzeResult) {
    debug!(model_id = %result.model_id, "document analyzed");
    for document in result.documents.iter().flatten() {
        debug!(doc_type = %document.doc_type, confidence = document.confidence, "document");
        for (name, field) in &document.fields {
            debug!(
                doc_type = %document.doc_type,
                field = %name,
                confidence = ?field.confidence,
                "field content: '{}'",
                field.content.as_deref().unwrap_or_default()
            );
        }
    }
}

/// Document types and field confidences of a trained model.
pub fn log_model(model: &ModelDetails) {
    for (doc_type, details) in &model.doc_types {
        debug!(
            model_id = %model.model_id,
            doc_type = %doc_type,
            fields = details.field_schema.len(),
            "document type"
        );
        for name in details.field_schema.keys() {
            debug!(
                doc_type = %doc_type,
                field = %name,
                confidence = ?details.field_confidence.get(name),
                "field schema"
            );
        }
    }
}

/// Text of every span marked handwritten with enough confidence.
pub fn handwritten_content(result: &AnalyzeResult) -> impl Iterator<Item = String> + '_ {
    result
        .styles
        .iter()
        .flatten()
        .filter(|style| is_confident_handwriting(style))
        .flat_map(move |style| style.spans.iter().map(move |span| result.span_text(span)))
}

fn is_confident_handwriting(style: &DocumentStyle) -> bool {
    style.is_handwritten == Some(true) && style.confidence > HANDWRITING_CONFIDENCE
}

fn format_polygon(polygon: &[f32]) -> String {
    polygon
        .chunks(2)
        .filter(|point| point.len() == 2)
        .map(|point| format!("({}, {})", point[0], point[1]))
        .collect::<Vec<_>>()
        .join(" ")
}
