//! Result graph returned by the document analysis service.
//!
//! These mirror the service's JSON (camelCase) closely enough to be passed
//! straight through to our own responses. Collections the service may omit
//! are either `Option` (when callers need to tell "absent" from "empty") or
//! defaulted to empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSpan {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    pub page_number: u32,
    /// Flattened `[x1, y1, x2, y2, ...]`, clockwise from top-left.
    #[serde(default)]
    pub polygon: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pages: Option<Vec<DocumentPage>>,
    #[serde(default)]
    pub paragraphs: Option<Vec<DocumentParagraph>>,
    #[serde(default)]
    pub tables: Option<Vec<DocumentTable>>,
    #[serde(default)]
    pub key_value_pairs: Option<Vec<DocumentKeyValuePair>>,
    #[serde(default)]
    pub styles: Option<Vec<DocumentStyle>>,
    #[serde(default)]
    pub documents: Option<Vec<AnalyzedDocument>>,
}

impl AnalyzeResult {
    /// Text covered by `span`. Offsets are Unicode code points.
    pub fn span_text(&self, span: &DocumentSpan) -> String {
        self.content
            .chars()
            .skip(span.offset)
            .take(span.length)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPage {
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
    #[serde(default)]
    pub words: Vec<DocumentWord>,
    #[serde(default)]
    pub lines: Vec<DocumentLine>,
    #[serde(default)]
    pub selection_marks: Vec<DocumentSelectionMark>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWord {
    pub content: String,
    #[serde(default)]
    pub polygon: Vec<f32>,
    pub span: DocumentSpan,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLine {
    pub content: String,
    #[serde(default)]
    pub polygon: Vec<f32>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSelectionMark {
    /// `selected` or `unselected`.
    pub state: String,
    #[serde(default)]
    pub polygon: Vec<f32>,
    pub span: DocumentSpan,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParagraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: String,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTable {
    pub row_count: u32,
    pub column_count: u32,
    #[serde(default)]
    pub cells: Vec<DocumentTableCell>,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTableCell {
    /// `content`, `rowHeader`, `columnHeader`, `stubHead` or `description`.
    #[serde(default = "default_cell_kind")]
    pub kind: String,
    pub row_index: u32,
    pub column_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_span: Option<u32>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

fn default_cell_kind() -> String {
    "content".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentKeyValueElement {
    pub content: String,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentKeyValuePair {
    pub key: DocumentKeyValueElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<DocumentKeyValueElement>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_handwritten: Option<bool>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    pub doc_type: String,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
    #[serde(default)]
    pub fields: BTreeMap<String, DocumentField>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentField {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
    /// Typed value (`valueString`, `valueDate`, `valueArray`, ...), kept as-is.
    #[serde(flatten)]
    pub value: serde_json::Map<String, serde_json::Value>,
}

/// A trained (or prebuilt) model as described by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDetails {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub doc_types: BTreeMap<String, DocumentTypeDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTypeDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_mode: Option<String>,
    #[serde(default)]
    pub field_schema: BTreeMap<String, DocumentFieldSchema>,
    #[serde(default)]
    pub field_confidence: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFieldSchema {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<DocumentFieldSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, DocumentFieldSchema>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout_result() {
        let json = r#"{
            "apiVersion": "2023-07-31",
            "modelId": "prebuilt-layout",
            "content": "Hello world\nSigned",
            "pages": [{
                "pageNumber": 1,
                "angle": 0,
                "width": 8.5,
                "height": 11,
                "unit": "inch",
                "spans": [{"offset": 0, "length": 18}],
                "words": [
                    {"content": "Hello", "polygon": [1,1,2,1,2,2,1,2], "span": {"offset": 0, "length": 5}, "confidence": 0.99},
                    {"content": "world", "polygon": [3,1,4,1,4,2,3,2], "span": {"offset": 6, "length": 5}, "confidence": 0.98}
                ],
                "lines": [{"content": "Hello world", "polygon": [1,1,4,1,4,2,1,2], "spans": [{"offset": 0, "length": 11}]}]
            }],
            "tables": [{
                "rowCount": 1,
                "columnCount": 2,
                "cells": [
                    {"kind": "columnHeader", "rowIndex": 0, "columnIndex": 0, "content": "A"},
                    {"rowIndex": 0, "columnIndex": 1, "content": "B"}
                ]
            }],
            "styles": [{"isHandwritten": true, "confidence": 0.95, "spans": [{"offset": 12, "length": 6}]}]
        }"#;

        let result: AnalyzeResult = serde_json::from_str(json).unwrap();
        let pages = result.pages.as_ref().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].words.len(), 2);
        assert_eq!(pages[0].lines.len(), 1);
        assert!(pages[0].selection_marks.is_empty());
        assert!(result.paragraphs.is_none());

        let tables = result.tables.as_ref().unwrap();
        assert_eq!(tables[0].cells[0].kind, "columnHeader");
        assert_eq!(tables[0].cells[1].kind, "content");

        let styles = result.styles.as_ref().unwrap();
        assert_eq!(result.span_text(&styles[0].spans[0]), "Signed");
    }

    #[test]
    fn test_span_text_counts_code_points() {
        let result = AnalyzeResult {
            content: "Zürich Straße".to_string(),
            ..Default::default()
        };
        let span = DocumentSpan { offset: 7, length: 6 };
        assert_eq!(result.span_text(&span), "Straße");
    }

    #[test]
    fn test_document_field_keeps_typed_value() {
        let json = r#"{
            "docType": "invoice",
            "confidence": 0.9,
            "fields": {
                "InvoiceTotal": {"type": "currency", "content": "$10.00", "confidence": 0.8,
                                 "valueCurrency": {"amount": 10.0, "currencySymbol": "$"}}
            }
        }"#;

        let doc: AnalyzedDocument = serde_json::from_str(json).unwrap();
        let field = &doc.fields["InvoiceTotal"];
        assert_eq!(field.field_type, "currency");
        assert_eq!(field.value["valueCurrency"]["amount"], 10.0);

        let back = serde_json::to_value(field).unwrap();
        assert_eq!(back["valueCurrency"]["currencySymbol"], "$");
        assert_eq!(back["type"], "currency");
    }

    #[test]
    fn test_parse_model_details() {
        let json = r#"{
            "modelId": "neural-1",
            "description": "claims",
            "createdDateTime": "2023-05-01T10:00:00Z",
            "docTypes": {
                "neural-1": {
                    "buildMode": "neural",
                    "fieldSchema": {
                        "Name": {"type": "string"},
                        "Items": {"type": "array", "items": {"type": "object", "properties": {"Sku": {"type": "string"}}}}
                    },
                    "fieldConfidence": {"Name": 0.91, "Items": 0.7}
                }
            }
        }"#;

        let model: ModelDetails = serde_json::from_str(json).unwrap();
        assert_eq!(model.model_id, "neural-1");
        let doc_type = &model.doc_types["neural-1"];
        assert_eq!(doc_type.build_mode.as_deref(), Some("neural"));
        let items = doc_type.field_schema["Items"].items.as_ref().unwrap();
        assert!(items.properties.as_ref().unwrap().contains_key("Sku"));
        assert_eq!(doc_type.field_confidence["Name"], 0.91);
    }
}
