use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to parse URL")]
    UrlParse(#[from] url::ParseError),

    #[error("unable to fetch WSDL from {url}: HTTP {status}")]
    Fetch {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("error talking to the WSDL server")]
    Transport(#[from] reqwest::Error),

    #[error("error parsing WSDL XML")]
    Xml(#[from] quick_xml::Error),

    #[error("unable to persist rewritten WSDL")]
    Io(#[from] std::io::Error),

    #[error("no operation matching '{logical}' found in the WSDL")]
    OperationNotFound { logical: String },
}
