use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("error building or parsing XML")]
    Xml(#[from] quick_xml::Error),

    #[error("error communicating with the remote service")]
    Transport(#[from] reqwest::Error),

    #[error("remote returned HTTP {status}: {snippet}")]
    Status {
        status: reqwest::StatusCode,
        snippet: String,
    },

    #[error("remote returned a SOAP fault: {message}")]
    Fault {
        code: Option<String>,
        message: String,
    },

    #[error("malformed response envelope: {0}")]
    Envelope(String),
}
