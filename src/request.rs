use serde_json::{Map, Value};

/// A process-metadata query. The process number is expected to be the
/// 20-digit unformatted CNJ number; stripping formatting is the caller's
/// job. Defaults mirror the service's usual consultation profile.
#[derive(Debug, Clone)]
pub struct ProcessQueryRequest {
    pub process_number: String,
    pub initial_date: Option<String>,
    pub final_date: Option<String>,
    pub include_header: bool,
    pub include_parties: bool,
    pub include_addresses: bool,
    pub include_movements: bool,
    pub include_documents: bool,
    pub extra_params: Option<Vec<Map<String, Value>>>,
}

impl ProcessQueryRequest {
    pub fn new(process_number: impl Into<String>) -> Self {
        Self {
            process_number: process_number.into(),
            initial_date: None,
            final_date: None,
            include_header: true,
            include_parties: false,
            include_addresses: false,
            include_movements: true,
            include_documents: true,
            extra_params: None,
        }
    }
}

/// A document-content query for one or more document ids of a process.
#[derive(Debug, Clone)]
pub struct DocumentQueryRequest {
    pub process_number: String,
    pub document_ids: Vec<String>,
    pub extra_params: Option<Vec<Map<String, Value>>>,
}

impl DocumentQueryRequest {
    pub fn new(process_number: impl Into<String>, document_ids: Vec<String>) -> Self {
        Self {
            process_number: process_number.into(),
            document_ids,
            extra_params: None,
        }
    }
}
