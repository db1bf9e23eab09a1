use std::time::Duration;

use serde_json::{json, Map, Value};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use mni_util::{
    xml::pretty_print,
    ExchangeRecorder, SoapCall, SoapClient,
};
use mni_wsdl::{OperationCatalog, OperationHandle, RewrittenWsdl};

use super::{
    config::ServiceConfig,
    documents::{self, DocumentQueryResult},
    error::Error,
    request::{DocumentQueryRequest, ProcessQueryRequest},
};

pub const PROCESS_QUERY: &str = "consultarprocesso";
pub const DOCUMENT_QUERY: &str = "consultardocumentosprocesso";

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Request/response envelopes captured for diagnostic display. When the
/// call failed after the request left the client, `error` carries the
/// failure and `response_xml` is absent.
#[derive(Debug, Serialize)]
pub struct RawXmlExchange {
    pub request_xml: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_xml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A connected client for one service deployment. Construction downloads
/// (and, when a server base is configured, rewrites) the WSDL and
/// discovers the remote operations; afterwards the instance is immutable
/// apart from the exchange recorder.
pub struct QueryService {
    config: ServiceConfig,
    soap: SoapClient,
    catalog: OperationCatalog,
    recorder: ExchangeRecorder,
    // Keeps the rewritten WSDL on disk for the service's lifetime; the
    // temp file is removed on drop.
    _rewritten: Option<RewrittenWsdl>,
}

impl QueryService {
    pub fn connect(config: ServiceConfig) -> Result<Self, Error> {
        config.validate()?;

        if !config.verify_ssl {
            warn!("SSL certificate verification is disabled; development use only");
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(CALL_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|err| Error::Configuration(format!("unable to build HTTP client: {err}")))?;

        let (definition, rewritten) = match &config.server_base {
            Some(server_base) => {
                let rewritten = mni_wsdl::rewrite::rewrite(&http, &config.wsdl_url, server_base)?;
                let definition = mni_wsdl::load_definition(rewritten.path())?;
                (definition, Some(rewritten))
            }
            None => (mni_wsdl::fetch_definition(&http, &config.wsdl_url)?, None),
        };

        let catalog = OperationCatalog::discover(&definition);
        info!(
            "soap client initialized for {} ({} operations)",
            config.wsdl_url,
            catalog.len()
        );

        Ok(Self {
            config,
            soap: SoapClient::new(http),
            catalog,
            recorder: ExchangeRecorder::default(),
            _rewritten: rewritten,
        })
    }

    /// Queries process metadata and returns the remote's response as a
    /// schema-less value; whatever the deployment's schema returns is
    /// passed through structurally.
    pub fn query_process(&mut self, request: &ProcessQueryRequest) -> Result<Value, Error> {
        note_process_number(&request.process_number);
        info!("querying process {}", request.process_number);

        let handle = self.catalog.resolve(PROCESS_QUERY)?.clone();
        info!("using operation {}", handle.name);

        let payload = build_process_payload(&self.config, request);
        self.invoke(&handle, &payload)
    }

    /// Queries document content and hands the response to the extractor.
    /// Extraction failures come back inside the result value, not as an
    /// `Err`; only transport-level problems are errors here.
    pub fn query_documents(
        &mut self,
        request: &DocumentQueryRequest,
    ) -> Result<DocumentQueryResult, Error> {
        note_process_number(&request.process_number);
        info!(
            "querying documents {:?} of process {}",
            request.document_ids, request.process_number
        );

        let handle = self.catalog.resolve(DOCUMENT_QUERY)?.clone();
        info!("using operation {}", handle.name);

        let payload = build_document_payload(&self.config, request);
        let response = self.invoke(&handle, &payload)?;

        Ok(documents::extract(response))
    }

    /// Performs the same call as `query_process` but returns the literal
    /// request and response envelopes, pretty-printed, instead of a
    /// normalized value.
    pub fn query_process_raw_xml(
        &mut self,
        request: &ProcessQueryRequest,
    ) -> Result<RawXmlExchange, Error> {
        let handle = self.catalog.resolve(PROCESS_QUERY)?.clone();
        let payload = build_process_payload(&self.config, request);

        self.recorder.clear();
        let outcome = self
            .soap
            .invoke(&soap_call(&handle), &payload, &mut self.recorder);

        let request_xml = match self.recorder.last_sent() {
            Some(envelope) => pretty_print(envelope),
            None => {
                // Nothing ever left the client; there is no partial
                // exchange worth returning.
                return Err(match outcome {
                    Err(err) => Error::RemoteCall {
                        message: err.to_string(),
                    },
                    Ok(_) => Error::NothingSent,
                });
            }
        };

        match outcome {
            Ok(_) => Ok(RawXmlExchange {
                request_xml,
                response_xml: self.recorder.last_received().map(pretty_print),
                error: None,
            }),
            Err(err) => {
                error!("error capturing response XML: {err}");
                Ok(RawXmlExchange {
                    request_xml,
                    response_xml: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    fn invoke(&mut self, handle: &OperationHandle, payload: &Value) -> Result<Value, Error> {
        match self
            .soap
            .invoke(&soap_call(handle), payload, &mut self.recorder)
        {
            Ok(value) => Ok(value),
            Err(err) => {
                error!("remote call {} failed: {err}", handle.name);
                self.log_last_response();
                Err(Error::RemoteCall {
                    message: err.to_string(),
                })
            }
        }
    }

    // Best-effort capture of the last received envelope, for debugging
    // failures against deployments that answer with unexpected payloads.
    fn log_last_response(&self) {
        if let Some(received) = self.recorder.last_received() {
            let snippet: String = received.chars().take(500).collect();
            error!("last received envelope (first 500 chars): {snippet}");
        }
    }
}

fn soap_call(handle: &OperationHandle) -> SoapCall<'_> {
    SoapCall {
        endpoint: &handle.endpoint,
        operation: &handle.name,
        soap_action: handle.soap_action.as_deref(),
        namespace: handle.target_namespace.as_deref(),
    }
}

// The service intentionally does not reject malformed numbers: they pass
// through and the remote's fault is surfaced. Callers own validation.
fn note_process_number(number: &str) {
    if number.len() != 20 || !number.bytes().all(|b| b.is_ascii_digit()) {
        debug!("process number {number:?} is not a bare 20-digit number");
    }
}

fn auth_block(config: &ServiceConfig) -> Value {
    json!({
        "autenticacaoSimples": {
            "usuario": config.user,
            "senha": config.password,
        }
    })
}

pub(crate) fn build_process_payload(config: &ServiceConfig, request: &ProcessQueryRequest) -> Value {
    let mut fields = Map::new();
    fields.insert("consultante".to_owned(), auth_block(config));
    fields.insert(
        "numeroProcesso".to_owned(),
        Value::String(request.process_number.clone()),
    );
    fields.insert(
        "incluirCabecalho".to_owned(),
        Value::Bool(request.include_header),
    );
    fields.insert(
        "incluirPartes".to_owned(),
        Value::Bool(request.include_parties),
    );
    fields.insert(
        "incluirEnderecos".to_owned(),
        Value::Bool(request.include_addresses),
    );
    fields.insert(
        "incluirMovimentos".to_owned(),
        Value::Bool(request.include_movements),
    );
    fields.insert(
        "incluirDocumentos".to_owned(),
        Value::Bool(request.include_documents),
    );

    if let Some(date) = &request.initial_date {
        fields.insert("dataInicial".to_owned(), Value::String(date.clone()));
    }
    if let Some(date) = &request.final_date {
        fields.insert("dataFinal".to_owned(), Value::String(date.clone()));
    }
    if let Some(params) = &request.extra_params {
        fields.insert("parametros".to_owned(), params_value(params));
    }

    Value::Object(fields)
}

pub(crate) fn build_document_payload(
    config: &ServiceConfig,
    request: &DocumentQueryRequest,
) -> Value {
    let mut fields = Map::new();
    fields.insert("consultante".to_owned(), auth_block(config));
    fields.insert(
        "numeroProcesso".to_owned(),
        Value::String(request.process_number.clone()),
    );
    fields.insert(
        "idDocumento".to_owned(),
        Value::Array(
            request
                .document_ids
                .iter()
                .map(|id| Value::String(id.clone()))
                .collect(),
        ),
    );

    if let Some(params) = &request.extra_params {
        fields.insert("parametros".to_owned(), params_value(params));
    }

    Value::Object(fields)
}

fn params_value(params: &[Map<String, Value>]) -> Value {
    Value::Array(params.iter().cloned().map(Value::Object).collect())
}
