use quick_xml::{
    events::{BytesStart, BytesText, Event},
    Writer,
};
use serde_json::Value;
use std::io::{Cursor, Write};
use tracing::{debug, warn};

use super::{
    error::Error,
    xml::response_body_value,
};

pub const ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// The coordinates of one remote operation invocation.
#[derive(Debug, Clone, Copy)]
pub struct SoapCall<'a> {
    pub endpoint: &'a str,
    pub operation: &'a str,
    pub soap_action: Option<&'a str>,
    pub namespace: Option<&'a str>,
}

/// Records the last request/response envelope texts of a client, for
/// diagnostics. Accessors never fail; an exchange that never happened is
/// simply absent. Queried only on failure paths and by the raw-XML view.
#[derive(Debug, Default)]
pub struct ExchangeRecorder {
    last_sent: Option<String>,
    last_received: Option<String>,
}

impl ExchangeRecorder {
    pub fn record_sent(&mut self, envelope: &str) {
        self.last_sent = Some(envelope.to_owned());
    }

    pub fn record_received(&mut self, envelope: &str) {
        self.last_received = Some(envelope.to_owned());
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    pub fn last_received(&self) -> Option<&str> {
        self.last_received.as_deref()
    }

    pub fn clear(&mut self) {
        self.last_sent = None;
        self.last_received = None;
    }
}

pub struct SoapClient {
    http: reqwest::blocking::Client,
}

impl SoapClient {
    pub fn new(http: reqwest::blocking::Client) -> Self {
        Self { http }
    }

    /// Sends one request envelope and normalizes the response body. Both
    /// envelope texts are recorded before any parsing can fail.
    pub fn invoke(
        &self,
        call: &SoapCall<'_>,
        payload: &Value,
        recorder: &mut ExchangeRecorder,
    ) -> Result<Value, Error> {
        let envelope = build_envelope(call, payload)?;
        recorder.record_sent(&envelope);
        debug!(
            "invoking {} at {} ({} bytes)",
            call.operation,
            call.endpoint,
            envelope.len()
        );

        let mut request = self
            .http
            .post(call.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(envelope);

        if let Some(action) = call.soap_action {
            request = request.header("SOAPAction", format!("\"{action}\""));
        }

        let response = request.send()?;
        let status = response.status();
        let body: bytes::Bytes = response.bytes()?;
        let text = String::from_utf8_lossy(body.as_ref()).into_owned();
        recorder.record_received(&text);

        match response_body_value(&text) {
            Ok(value) => {
                if !status.is_success() {
                    warn!("HTTP {status} carried a parseable envelope, using it anyway");
                }
                Ok(value)
            }
            Err(fault @ Error::Fault { .. }) => Err(fault),
            Err(parse_error) => {
                if status.is_success() {
                    Err(parse_error)
                } else {
                    Err(Error::Status {
                        status,
                        snippet: snippet(&text),
                    })
                }
            }
        }
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Serializes a payload value into a request envelope. Object keys become
/// child elements in insertion order, arrays repeat the element name and
/// null becomes an empty element.
pub fn build_envelope(call: &SoapCall<'_>, payload: &Value) -> Result<String, Error> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let envelope = BytesStart::owned_name("soapenv:Envelope")
        .with_attributes([("xmlns:soapenv", ENVELOPE_NAMESPACE)]);
    let body = BytesStart::owned_name("soapenv:Body");

    writer.write_event(Event::Start(envelope.to_borrowed()))?;
    writer.write_event(Event::Start(body.to_borrowed()))?;

    let operation_name = match call.namespace {
        Some(_) => format!("ser:{}", call.operation),
        None => call.operation.to_owned(),
    };

    let mut operation = BytesStart::owned_name(operation_name.as_str());
    if let Some(namespace) = call.namespace {
        operation.push_attribute(("xmlns:ser", namespace));
    }

    writer.write_event(Event::Start(operation.to_borrowed()))?;
    write_payload(&mut writer, payload)?;
    writer.write_event(Event::End(operation.to_end()))?;

    writer.write_event(Event::End(body.to_end()))?;
    writer.write_event(Event::End(envelope.to_end()))?;

    Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
}

fn write_payload<W: Write>(writer: &mut Writer<W>, payload: &Value) -> Result<(), Error> {
    match payload {
        Value::Object(map) => {
            for (name, value) in map {
                write_element(writer, name, value)?;
            }
            Ok(())
        }
        other => write_text(writer, other),
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, name: &str, value: &Value) -> Result<(), Error> {
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
        }

        Value::Null => {
            writer.write_event(Event::Empty(BytesStart::owned_name(name)))?;
        }

        Value::Object(map) => {
            let start = BytesStart::owned_name(name);
            writer.write_event(Event::Start(start.to_borrowed()))?;
            for (child, child_value) in map {
                write_element(writer, child, child_value)?;
            }
            writer.write_event(Event::End(start.to_end()))?;
        }

        scalar => {
            let start = BytesStart::owned_name(name);
            writer.write_event(Event::Start(start.to_borrowed()))?;
            write_text(writer, scalar)?;
            writer.write_event(Event::End(start.to_end()))?;
        }
    }

    Ok(())
}

fn write_text<W: Write>(writer: &mut Writer<W>, value: &Value) -> Result<(), Error> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    };

    writer.write_event(Event::Text(BytesText::from_plain_str(&text)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> SoapCall<'static> {
        SoapCall {
            endpoint: "https://host.example/ws",
            operation: "consultarProcesso",
            soap_action: Some("consultarProcesso"),
            namespace: Some("urn:mni"),
        }
    }

    #[test]
    fn envelope_wraps_the_operation_element() {
        let envelope = build_envelope(&call(), &json!({})).unwrap();

        assert!(envelope.contains(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#
        ));
        assert!(envelope.contains(r#"<ser:consultarProcesso xmlns:ser="urn:mni">"#));
        assert!(envelope.contains("</soapenv:Body>"));
    }

    #[test]
    fn payload_fields_keep_insertion_order() {
        let payload = json!({
            "numeroProcesso": "00000012320248260100",
            "incluirCabecalho": true,
            "incluirPartes": false
        });

        let envelope = build_envelope(&call(), &payload).unwrap();
        let numero = envelope.find("<numeroProcesso>").unwrap();
        let cabecalho = envelope.find("<incluirCabecalho>").unwrap();
        let partes = envelope.find("<incluirPartes>").unwrap();

        assert!(numero < cabecalho && cabecalho < partes);
        assert!(envelope.contains("<incluirCabecalho>true</incluirCabecalho>"));
        assert!(envelope.contains("<incluirPartes>false</incluirPartes>"));
    }

    #[test]
    fn arrays_repeat_the_element_name() {
        let payload = json!({ "idDocumento": ["10", "11"] });
        let envelope = build_envelope(&call(), &payload).unwrap();

        assert!(envelope.contains("<idDocumento>10</idDocumento>"));
        assert!(envelope.contains("<idDocumento>11</idDocumento>"));
    }

    #[test]
    fn nested_objects_become_nested_elements() {
        let payload = json!({
            "consultante": {
                "autenticacaoSimples": { "usuario": "u", "senha": "s" }
            }
        });

        let envelope = build_envelope(&call(), &payload).unwrap();
        assert!(envelope.contains("<consultante>"));
        assert!(envelope.contains("<autenticacaoSimples>"));
        assert!(envelope.contains("<usuario>u</usuario>"));
        assert!(envelope.contains("<senha>s</senha>"));
    }

    #[test]
    fn null_fields_become_empty_elements() {
        let payload = json!({ "dataInicial": null });
        let envelope = build_envelope(&call(), &payload).unwrap();

        assert!(envelope.contains("<dataInicial/>"));
    }

    #[test]
    fn operation_without_namespace_is_unprefixed() {
        let call = SoapCall {
            namespace: None,
            ..call()
        };

        let envelope = build_envelope(&call, &json!({})).unwrap();
        assert!(envelope.contains("<consultarProcesso>"));
    }

    #[test]
    fn recorder_starts_empty_and_remembers_the_last_exchange() {
        let mut recorder = ExchangeRecorder::default();
        assert!(recorder.last_sent().is_none());
        assert!(recorder.last_received().is_none());

        recorder.record_sent("<a/>");
        recorder.record_sent("<b/>");
        recorder.record_received("<c/>");

        assert_eq!(recorder.last_sent(), Some("<b/>"));
        assert_eq!(recorder.last_received(), Some("<c/>"));

        recorder.clear();
        assert!(recorder.last_sent().is_none());
        assert!(recorder.last_received().is_none());
    }
}
