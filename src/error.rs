use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("incomplete SOAP configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Wsdl(#[from] mni_wsdl::Error),

    #[error("remote call failed: {message}")]
    RemoteCall { message: String },

    #[error("no request was ever sent to the remote service")]
    NothingSent,
}

impl From<mni_util::Error> for Error {
    fn from(error: mni_util::Error) -> Self {
        Error::RemoteCall {
            message: error.to_string(),
        }
    }
}
