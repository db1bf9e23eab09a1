//! Client for the Brazilian judicial-process interoperability service
//! (MNI): WSDL rewriting, runtime operation discovery, process and
//! document queries over SOAP.

pub mod config;
pub mod documents;
pub mod error;
pub mod request;
pub mod service;

pub use config::ServiceConfig;
pub use documents::{DocumentEntry, DocumentQueryResult};
pub use error::Error;
pub use request::{DocumentQueryRequest, ProcessQueryRequest};
pub use service::{QueryService, RawXmlExchange};
