use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use tracing::warn;

use super::{
    error,
    types::{Binding, BindingOperation, Definition, Port, Service},
};

fn split_namespaced_name(prefixed_name: &str) -> (Option<&str>, &str) {
    let mut split = prefixed_name.split(':');
    let first = split.next().unwrap_or(prefixed_name);
    let second = split.next();

    if let Some(second) = second {
        (Some(first), second)
    } else {
        (None, first)
    }
}

fn local_name(prefixed_name: &str) -> &str {
    split_namespaced_name(prefixed_name).1
}

fn find_attribute(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, error::Error> {
    for attribute in start.attributes() {
        let attribute = attribute?;
        if reader.decode(attribute.key)? == name {
            return Ok(Some(reader.decode(attribute.value.as_ref())?.to_owned()));
        }
    }

    Ok(None)
}

// Only the subset of the WSDL that operation discovery needs: services,
// ports with their soap:address, and bindings with their operations.
// Everything else (schemas, messages, portTypes) is skipped as Other.
#[derive(Debug)]
enum ParseState {
    Definitions,

    Service {
        name: String,
        ports: Vec<Port>,
    },
    Port {
        name: String,
        binding: String,
        location: Option<String>,
    },

    Binding {
        name: String,
        operations: Vec<BindingOperation>,
    },
    BindingOperation {
        name: String,
        soap_action: Option<String>,
    },

    Other,
}

pub fn parse_definition(text: &str) -> Result<Definition, error::Error> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    reader.expand_empty_elements(true);

    let mut definition = Definition::default();
    let mut stack: Vec<ParseState> = Vec::new();
    let mut buffer = Vec::new();

    loop {
        match reader.read_event(&mut buffer)? {
            Event::Start(start) => handle_start(&reader, &start, &mut stack, &mut definition)?,
            Event::End(..) => handle_end(&mut stack, &mut definition),
            Event::Eof => break,
            _ => (),
        }

        buffer.clear();
    }

    Ok(definition)
}

fn handle_start(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    stack: &mut Vec<ParseState>,
    definition: &mut Definition,
) -> Result<(), error::Error> {
    let element = local_name(reader.decode(start.name())?).to_owned();

    let state = match (stack.last_mut(), element.as_str()) {
        (None, "definitions") => {
            definition.target_namespace = find_attribute(reader, start, "targetNamespace")?;
            ParseState::Definitions
        }

        (Some(ParseState::Definitions), "service") => {
            match find_attribute(reader, start, "name")? {
                Some(name) => ParseState::Service {
                    name,
                    ports: Vec::new(),
                },
                None => {
                    warn!("service element without a name attribute, skipping");
                    ParseState::Other
                }
            }
        }

        (Some(ParseState::Definitions), "binding") => {
            match find_attribute(reader, start, "name")? {
                Some(name) => ParseState::Binding {
                    name,
                    operations: Vec::new(),
                },
                None => {
                    warn!("binding element without a name attribute, skipping");
                    ParseState::Other
                }
            }
        }

        (Some(ParseState::Service { .. }), "port") => {
            let name = find_attribute(reader, start, "name")?;
            let binding = find_attribute(reader, start, "binding")?;

            match (name, binding) {
                (Some(name), Some(binding)) => ParseState::Port {
                    name,
                    binding: local_name(&binding).to_owned(),
                    location: None,
                },
                _ => {
                    warn!("port element without name or binding, skipping");
                    ParseState::Other
                }
            }
        }

        (Some(ParseState::Port { location, .. }), "address") => {
            *location = find_attribute(reader, start, "location")?;
            ParseState::Other
        }

        (Some(ParseState::Binding { .. }), "operation") => {
            match find_attribute(reader, start, "name")? {
                Some(name) => ParseState::BindingOperation {
                    name,
                    soap_action: None,
                },
                None => {
                    warn!("binding operation without a name attribute, skipping");
                    ParseState::Other
                }
            }
        }

        (Some(ParseState::BindingOperation { soap_action, .. }), "operation") => {
            *soap_action = find_attribute(reader, start, "soapAction")?;
            ParseState::Other
        }

        _ => ParseState::Other,
    };

    stack.push(state);
    Ok(())
}

fn handle_end(stack: &mut Vec<ParseState>, definition: &mut Definition) {
    let finished = match stack.pop() {
        Some(state) => state,
        None => return,
    };

    match finished {
        ParseState::Service { name, ports } => definition.services.push(Service { name, ports }),

        ParseState::Port {
            name,
            binding,
            location,
        } => {
            if let Some(ParseState::Service { ports, .. }) = stack.last_mut() {
                ports.push(Port {
                    name,
                    binding,
                    location,
                });
            }
        }

        ParseState::Binding { name, operations } => {
            definition.bindings.push(Binding { name, operations })
        }

        ParseState::BindingOperation { name, soap_action } => {
            if let Some(ParseState::Binding { operations, .. }) = stack.last_mut() {
                operations.push(BindingOperation { name, soap_action });
            }
        }

        ParseState::Definitions | ParseState::Other => (),
    }
}
