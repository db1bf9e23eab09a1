pub mod error;
pub mod soap;
pub mod xml;

pub use error::Error;
pub use soap::{ExchangeRecorder, SoapCall, SoapClient};
