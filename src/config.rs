use std::env;

use super::error::Error;

/// Connection settings for one judicial-process service deployment.
/// Immutable once handed to a `QueryService`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub wsdl_url: String,
    pub user: String,
    pub password: String,
    pub verify_ssl: bool,
    pub server_base: Option<String>,
}

impl ServiceConfig {
    pub fn new(
        wsdl_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            wsdl_url: wsdl_url.into(),
            user: user.into(),
            password: password.into(),
            verify_ssl: true,
            server_base: None,
        }
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    pub fn with_server_base(mut self, server_base: impl Into<String>) -> Self {
        self.server_base = Some(server_base.into());
        self
    }

    /// Reads `SOAP_WSDL_URL`, `SOAP_USUARIO`, `SOAP_SENHA`,
    /// `SOAP_VERIFY_SSL` and `SOAP_SERVIDOR_BASE`.
    pub fn from_env() -> Result<Self, Error> {
        let config = Self {
            wsdl_url: env::var("SOAP_WSDL_URL").unwrap_or_default(),
            user: env::var("SOAP_USUARIO").unwrap_or_default(),
            password: env::var("SOAP_SENHA").unwrap_or_default(),
            verify_ssl: env::var("SOAP_VERIFY_SSL")
                .map(|value| truthy(&value))
                .unwrap_or(true),
            server_base: env::var("SOAP_SERVIDOR_BASE")
                .ok()
                .filter(|value| !value.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.wsdl_url.trim().is_empty() {
            return Err(Error::Configuration("wsdl url is not set".to_owned()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Configuration("user is not set".to_owned()));
        }
        if self.password.trim().is_empty() {
            return Err(Error::Configuration("password is not set".to_owned()));
        }

        Ok(())
    }
}

pub fn truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "n" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_fail_fast() {
        let config = ServiceConfig::new("https://host.example/ws?wsdl", "", "secret");
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = ServiceConfig::new("", "user", "secret");
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = ServiceConfig::new("https://host.example/ws?wsdl", "user", "");
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn complete_config_validates() {
        let config = ServiceConfig::new("https://host.example/ws?wsdl", "user", "secret")
            .with_verify_ssl(false)
            .with_server_base("https://host.example");

        assert!(config.validate().is_ok());
        assert!(!config.verify_ssl);
        assert_eq!(config.server_base.as_deref(), Some("https://host.example"));
    }

    #[test]
    fn falsy_set_matches_the_documented_values() {
        for value in ["false", "0", "no", "n", "off", "FALSE", " Off "] {
            assert!(!truthy(value), "{value} should be falsy");
        }

        for value in ["true", "1", "yes", "on", "anything"] {
            assert!(truthy(value), "{value} should be truthy");
        }
    }
}
