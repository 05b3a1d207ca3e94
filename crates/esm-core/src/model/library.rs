use std::sync::Arc;

use indexmap::IndexMap;

use super::definition::Model;
use super::port::PortType;
use crate::error::{EsmError, EsmResult};

/// Named collection of port types and models
#[derive(Debug, Clone, Default)]
pub struct Library {
    pub port_types: IndexMap<String, PortType>,
    pub models: IndexMap<String, Arc<Model>>,
}

impl Library {
    pub fn new(
        port_types: impl IntoIterator<Item = PortType>,
        models: impl IntoIterator<Item = Model>,
    ) -> Self {
        Self {
            port_types: port_types
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            models: models
                .into_iter()
                .map(|m| (m.id.clone(), Arc::new(m)))
                .collect(),
        }
    }

    pub fn model(&self, id: &str) -> EsmResult<Arc<Model>> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| EsmError::MissingKey(format!("Model {}", id)))
    }

    pub fn port_type(&self, id: &str) -> EsmResult<&PortType> {
        self.port_types
            .get(id)
            .ok_or_else(|| EsmError::MissingKey(format!("Port type {}", id)))
    }
}
