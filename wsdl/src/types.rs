#[derive(Debug, Clone)]
pub struct BindingOperation {
    pub name: String,
    pub soap_action: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub operations: Vec<BindingOperation>,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub binding: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub ports: Vec<Port>,
}

#[derive(Default, Debug, Clone)]
pub struct Definition {
    pub target_namespace: Option<String>,
    pub services: Vec<Service>,
    pub bindings: Vec<Binding>,
}
