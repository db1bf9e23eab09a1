use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

/// One extracted document. When any content is present both forms are
/// populated: raw bytes and their base64 text stay derivable from each
/// other.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
}

impl DocumentEntry {
    /// Content the remote delivered as raw bytes; the base64 form is
    /// computed from it.
    pub fn with_raw_content(mut self, content: Vec<u8>) -> Self {
        self.content_base64 = Some(BASE64.encode(&content));
        self.content = Some(content);
        self
    }

    /// Content the remote delivered as text: kept verbatim as base64 and
    /// decoded into bytes. Text that is not valid base64 degrades to its
    /// own UTF-8 bytes rather than failing.
    pub fn with_text_content(mut self, text: &str) -> Self {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        self.content = match BASE64.decode(compact.as_bytes()) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                debug!("document content is not base64 ({err}), keeping it as opaque text");
                Some(text.as_bytes().to_vec())
            }
        };
        self.content_base64 = Some(text.to_owned());
        self
    }
}

/// Outcome of a document query. Mirrors the two shapes the extraction can
/// produce: a parsed document list, or the error plus the untouched raw
/// response for debugging.
#[derive(Debug, Serialize)]
pub struct DocumentQueryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    pub documents: Vec<DocumentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl DocumentQueryResult {
    fn failure(error: String, raw_response: Value) -> Self {
        Self {
            success: false,
            receipt: None,
            documents: Vec::new(),
            error: Some(error),
            raw_response: Some(raw_response),
        }
    }
}

/// Walks a normalized document-query response. Never panics and never
/// returns an error: any unexpected shape is folded into a failure-shaped
/// result that echoes the raw response.
pub fn extract(raw: Value) -> DocumentQueryResult {
    match try_extract(&raw) {
        Ok(result) => result,
        Err(reason) => {
            error!("error extracting documents from response: {reason}");
            DocumentQueryResult::failure(reason, raw)
        }
    }
}

fn try_extract(raw: &Value) -> Result<DocumentQueryResult, String> {
    let root = raw
        .as_object()
        .ok_or_else(|| format!("unexpected response shape: {}", shape_of(raw)))?;

    let mut documents = Vec::new();
    if let Some(value) = root.get("documentos") {
        for document in normalize_sequence(value)? {
            documents.push(parse_entry(document)?);
        }
    }

    Ok(DocumentQueryResult {
        success: true,
        receipt: root.get("recibo").and_then(receipt_text),
        documents,
        error: None,
        raw_response: None,
    })
}

// A lone document arrives as an object rather than a one-element list.
fn normalize_sequence(value: &Value) -> Result<Vec<&Value>, String> {
    match value {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(_) => Ok(vec![value]),
        other => Err(format!("documentos has unexpected shape: {}", shape_of(other))),
    }
}

fn parse_entry(value: &Value) -> Result<DocumentEntry, String> {
    let document = value
        .as_object()
        .ok_or_else(|| format!("document entry has unexpected shape: {}", shape_of(value)))?;

    let mut entry = DocumentEntry {
        id: field_text(document, "idDocumento"),
        mimetype: field_text(document, "mimetype"),
        encoding: field_text(document, "encoding"),
        hash: field_text(document, "hash"),
        content: None,
        content_base64: None,
    };

    match document.get("conteudo") {
        Some(Value::String(text)) => entry = entry.with_text_content(text),
        Some(content) => {
            if let Some(text) = scalar_text(content) {
                entry = entry.with_text_content(&text);
            } else if !content.is_null() {
                return Err(format!(
                    "document content has unexpected shape: {}",
                    shape_of(content)
                ));
            }
        }
        None => (),
    }

    Ok(entry)
}

fn field_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_text)
}

// Receipts are usually plain strings; a structured one is kept as JSON
// text rather than dropped.
fn receipt_text(value: &Value) -> Option<String> {
    scalar_text(value).or_else(|| match value {
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
        _ => None,
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => match map.get("$value") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        },
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_document_object_becomes_a_one_element_list() {
        let raw = json!({
            "recibo": "r-1",
            "documentos": {
                "idDocumento": "55",
                "mimetype": "application/pdf",
                "conteudo": "SGVsbG8="
            }
        });

        let result = extract(raw);
        assert!(result.success);
        assert_eq!(result.receipt.as_deref(), Some("r-1"));
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].id.as_deref(), Some("55"));
    }

    #[test]
    fn base64_content_decodes_to_raw_bytes() {
        let entry = DocumentEntry::default().with_text_content("SGVsbG8=");

        assert_eq!(entry.content.as_deref(), Some(b"Hello".as_ref()));
        assert_eq!(entry.content_base64.as_deref(), Some("SGVsbG8="));
    }

    #[test]
    fn wrapped_base64_lines_still_decode() {
        let entry = DocumentEntry::default().with_text_content("SGVs\nbG8=");
        assert_eq!(entry.content.as_deref(), Some(b"Hello".as_ref()));
    }

    #[test]
    fn malformed_base64_degrades_to_utf8_bytes() {
        let entry = DocumentEntry::default().with_text_content("not base64!!");

        assert_eq!(entry.content.as_deref(), Some(b"not base64!!".as_ref()));
        assert_eq!(entry.content_base64.as_deref(), Some("not base64!!"));
    }

    #[test]
    fn raw_content_round_trips_through_base64() {
        let original = vec![0u8, 1, 2, 254, 255];
        let entry = DocumentEntry::default().with_raw_content(original.clone());

        let encoded = entry.content_base64.clone().unwrap();
        let rebuilt = DocumentEntry::default().with_text_content(&encoded);

        assert_eq!(entry.content.as_deref(), Some(original.as_slice()));
        assert_eq!(rebuilt.content.as_deref(), Some(original.as_slice()));
    }

    #[test]
    fn missing_fields_are_absent_not_errors() {
        let raw = json!({ "documentos": [{ "idDocumento": "1" }] });
        let result = extract(raw);

        assert!(result.success);
        let entry = &result.documents[0];
        assert!(entry.mimetype.is_none());
        assert!(entry.encoding.is_none());
        assert!(entry.hash.is_none());
        assert!(entry.content.is_none());
        assert!(entry.content_base64.is_none());
    }

    #[test]
    fn attribute_style_fields_are_unwrapped() {
        let raw = json!({
            "documentos": [{
                "idDocumento": "9",
                "hash": { "algoritmo": "md5", "$value": "abc" },
                "conteudo": { "$value": "SGVsbG8=" }
            }]
        });

        let result = extract(raw);
        assert!(result.success);
        let entry = &result.documents[0];
        assert_eq!(entry.hash.as_deref(), Some("abc"));
        assert_eq!(entry.content.as_deref(), Some(b"Hello".as_ref()));
    }

    #[test]
    fn absent_documentos_yields_an_empty_list() {
        let result = extract(json!({ "recibo": "r-2" }));

        assert!(result.success);
        assert!(result.documents.is_empty());
    }

    #[test]
    fn unexpected_shape_is_absorbed_into_a_failure_result() {
        let raw = json!({ "documentos": "garbage" });
        let result = extract(raw.clone());

        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(result.raw_response, Some(raw));
    }

    #[test]
    fn non_object_response_is_absorbed_too() {
        let result = extract(json!("plain text response"));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("string"));
    }

    #[test]
    fn structured_receipt_is_serialized_to_text() {
        let raw = json!({ "recibo": { "dataRecebimento": "2024-01-01" } });
        let result = extract(raw);

        assert!(result.success);
        let receipt = result.receipt.unwrap();
        assert!(receipt.contains("dataRecebimento"));
    }
}
