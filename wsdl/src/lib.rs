use std::path::Path;

use tracing::debug;

mod parser;

pub mod catalog;
pub mod error;
pub mod rewrite;
pub mod types;

pub use catalog::{OperationCatalog, OperationHandle};
pub use error::Error;
pub use rewrite::RewrittenWsdl;

/// Downloads a WSDL and parses it into the discovery metadata.
pub fn fetch_definition(
    client: &reqwest::blocking::Client,
    url: &str,
) -> Result<types::Definition, Error> {
    debug!("fetching WSDL from {url}");
    let text = fetch_text(client, url)?;
    parser::parse_definition(&text)
}

/// Parses a WSDL previously persisted to disk (e.g. a rewritten one).
pub fn load_definition(path: &Path) -> Result<types::Definition, Error> {
    let text = std::fs::read_to_string(path)?;
    parser::parse_definition(&text)
}

pub fn parse_definition(text: &str) -> Result<types::Definition, Error> {
    parser::parse_definition(text)
}

pub(crate) fn fetch_text(client: &reqwest::blocking::Client, url: &str) -> Result<String, Error> {
    let response = client.get(url).send()?;
    let status = response.status();

    if !status.is_success() {
        return Err(Error::Fetch {
            url: url.to_owned(),
            status,
        });
    }

    Ok(response.text()?)
}
