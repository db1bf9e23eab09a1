use quick_xml::{
    events::Event,
    Reader, Writer,
};
use serde_json::{Map, Value};
use std::io::Cursor;

use super::error::Error;

fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(index) => &name[index + 1..],
        None => name,
    }
}

struct PendingElement {
    name: String,
    attributes: Map<String, Value>,
    children: Vec<(String, Value)>,
    text: String,
}

/// Converts an XML document into a schema-less value: attributes and
/// children merge into one object, repeated sibling names become arrays,
/// text-only elements become strings and empty elements become null.
/// Namespace prefixes are stripped. Text alongside attributes or children
/// is kept under `"$value"`.
pub fn xml_to_value(text: &str) -> Result<(String, Value), Error> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    reader.expand_empty_elements(true);

    let mut stack: Vec<PendingElement> = Vec::new();
    let mut buffer = Vec::new();

    loop {
        match reader.read_event(&mut buffer)? {
            Event::Start(start) => {
                let name = local_name(reader.decode(start.name())?).to_owned();
                let mut attributes = Map::new();

                for attribute in start.attributes() {
                    let attribute = attribute?;
                    let key = reader.decode(attribute.key)?;

                    if key == "xmlns" || key.starts_with("xmlns:") {
                        continue;
                    }

                    let key = local_name(key).to_owned();
                    let value = reader.decode(attribute.value.as_ref())?.to_owned();
                    attributes.insert(key, Value::String(value));
                }

                stack.push(PendingElement {
                    name,
                    attributes,
                    children: Vec::new(),
                    text: String::new(),
                });
            }

            Event::Text(event) | Event::CData(event) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = event.unescaped()?;
                    top.text.push_str(reader.decode(unescaped.as_ref())?);
                }
            }

            Event::End(..) => {
                let element = match stack.pop() {
                    Some(element) => element,
                    None => return Err(Error::Envelope("unbalanced end tag".to_owned())),
                };

                let name = element.name.clone();
                let value = element_value(element);

                match stack.last_mut() {
                    Some(parent) => parent.children.push((name, value)),
                    None => return Ok((name, value)),
                }
            }

            Event::Eof => {
                return Err(Error::Envelope("unexpected end of document".to_owned()))
            }

            _ => (),
        }

        buffer.clear();
    }
}

fn element_value(element: PendingElement) -> Value {
    let PendingElement {
        attributes,
        children,
        text,
        ..
    } = element;

    if attributes.is_empty() && children.is_empty() {
        return if text.is_empty() {
            Value::Null
        } else {
            Value::String(text)
        };
    }

    let mut map = attributes;
    for (name, value) in children {
        merge_child(&mut map, name, value);
    }

    if !text.is_empty() {
        map.insert("$value".to_owned(), Value::String(text));
    }

    Value::Object(map)
}

fn merge_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

/// Unwraps a response envelope down to the operation response value. A
/// `Fault` in the body is surfaced as an error carrying the fault detail.
pub fn response_body_value(envelope: &str) -> Result<Value, Error> {
    let (root, value) = xml_to_value(envelope)?;

    if root != "Envelope" {
        return Err(Error::Envelope(format!("unexpected root element {root}")));
    }

    let body = match value.get("Body") {
        Some(body) => body,
        None => return Err(Error::Envelope("missing soap Body".to_owned())),
    };

    match body {
        Value::Null => Ok(Value::Null),
        Value::Object(map) => {
            if let Some(fault) = map.get("Fault") {
                return Err(fault_error(fault));
            }

            Ok(map.values().next().cloned().unwrap_or(Value::Null))
        }
        other => Ok(other.clone()),
    }
}

fn fault_error(fault: &Value) -> Error {
    let code = scalar_text(fault.get("faultcode"));
    let message = scalar_text(fault.get("faultstring"))
        .unwrap_or_else(|| "unspecified soap fault".to_owned());

    Error::Fault { code, message }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => match map.get("$value") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        },
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Re-indents an XML document for display. Malformed input is returned
/// unchanged rather than failing the diagnostics path.
pub fn pretty_print(xml: &str) -> String {
    fn indent(xml: &str) -> Result<String, Error> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        let mut buffer = Vec::new();

        loop {
            match reader.read_event(&mut buffer)? {
                Event::Eof => break,
                event => {
                    writer.write_event(event)?;
                }
            }

            buffer.clear();
        }

        Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
    }

    match indent(xml) {
        Ok(formatted) => formatted,
        Err(_) => xml.to_owned(),
    }
}
