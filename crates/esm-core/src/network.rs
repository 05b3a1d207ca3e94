//! Network of components connected through ports
//!
//! Components (model instances) are the vertices of an undirected petgraph
//! graph and every validated [`PortsConnection`] is an edge. Nodes are
//! components too; they are kept apart only so that they come first when
//! iterating.

use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::{Graph, Undirected};

use crate::error::{EsmError, EsmResult};
use crate::expression::PortFieldId;
use crate::model::{Model, ModelPort, PortType};

/// An instance of a model, identified by its id
#[derive(Debug, Clone)]
pub struct Component {
    pub model: Arc<Model>,
    pub id: String,
}

impl Component {
    pub fn new(model: Arc<Model>, id: &str) -> Self {
        Self {
            model,
            id: id.to_string(),
        }
    }

    pub fn port(&self, port_id: &str) -> EsmResult<&ModelPort> {
        self.model.ports.get(port_id).ok_or_else(|| {
            EsmError::Validation(format!(
                "Missing port: {} on component {}",
                port_id, self.id
            ))
        })
    }
}

pub fn create_component(model: Arc<Model>, id: &str) -> Component {
    Component::new(model, id)
}

/// A port of a given component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub component_id: String,
    pub port_id: String,
}

impl PortRef {
    pub fn new(component: &Component, port_id: &str) -> Self {
        Self {
            component_id: component.id.clone(),
            port_id: port_id.to_string(),
        }
    }
}

/// Connection between two ports of the same type.
///
/// Each field of the port type is defined by exactly one side, its master.
#[derive(Debug, Clone)]
pub struct PortsConnection {
    pub port1: PortRef,
    pub port2: PortRef,
    pub master_port: IndexMap<String, PortRef>,
    port_type: PortType,
}

impl PortsConnection {
    pub fn new(
        component1: &Component,
        port1: &str,
        component2: &Component,
        port2: &str,
    ) -> EsmResult<Self> {
        let (model_port1, model_port2) =
            match (component1.model.ports.get(port1), component2.model.ports.get(port2)) {
                (Some(p1), Some(p2)) => (p1, p2),
                _ => {
                    return Err(EsmError::Validation(format!(
                        "Missing port: {}.{} or {}.{}",
                        component1.id, port1, component2.id, port2
                    )))
                }
            };
        if model_port1.port_type != model_port2.port_type {
            return Err(EsmError::Validation(format!(
                "Incompatible portTypes {} != {}",
                model_port1.port_type.id, model_port2.port_type.id
            )));
        }

        let port1 = PortRef::new(component1, port1);
        let port2 = PortRef::new(component2, port2);
        let mut master_port = IndexMap::new();
        for field in &model_port1.port_type.fields {
            let def1 = component1
                .model
                .port_fields_definitions
                .contains_key(&PortFieldId::new(&model_port1.port_name, &field.name));
            let def2 = component2
                .model
                .port_fields_definitions
                .contains_key(&PortFieldId::new(&model_port2.port_name, &field.name));
            let master = match (def1, def2) {
                (false, false) => {
                    return Err(EsmError::Validation(format!(
                        "No definition for port field {} on {}.",
                        field.name, model_port1.port_name
                    )))
                }
                (true, true) => {
                    return Err(EsmError::Validation(format!(
                        "Port field {} on {} has 2 definitions.",
                        field.name, model_port1.port_name
                    )))
                }
                (true, false) => port1.clone(),
                (false, true) => port2.clone(),
            };
            master_port.insert(field.name.clone(), master);
        }

        Ok(Self {
            port1,
            port2,
            master_port,
            port_type: model_port1.port_type.clone(),
        })
    }

    pub fn port_type(&self) -> &PortType {
        &self.port_type
    }
}

/// Components and nodes linked by port connections
#[derive(Debug, Clone)]
pub struct Network {
    pub id: String,
    pub graph: Graph<Component, PortsConnection, Undirected>,
    nodes: IndexMap<String, NodeIndex>,
    components: IndexMap<String, NodeIndex>,
}

impl Network {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            graph: Graph::new_undirected(),
            nodes: IndexMap::new(),
            components: IndexMap::new(),
        }
    }

    fn insert(&mut self, component: Component, as_node: bool) -> NodeIndex {
        let existing = self
            .components
            .get(&component.id)
            .or_else(|| self.nodes.get(&component.id))
            .copied();
        if let Some(index) = existing {
            self.graph[index] = component;
            return index;
        }
        let id = component.id.clone();
        let index = self.graph.add_node(component);
        if as_node {
            self.nodes.insert(id, index);
        } else {
            self.components.insert(id, index);
        }
        index
    }

    /// Adds a component. An existing component with the same id is replaced.
    pub fn add_component(&mut self, component: Component) -> NodeIndex {
        self.insert(component, false)
    }

    pub fn add_node(&mut self, node: Component) -> NodeIndex {
        self.insert(node, true)
    }

    fn index_of(&self, component_id: &str) -> EsmResult<NodeIndex> {
        self.components
            .get(component_id)
            .or_else(|| self.nodes.get(component_id))
            .copied()
            .ok_or_else(|| EsmError::MissingKey(format!("Component {}", component_id)))
    }

    /// Component or node with this id
    pub fn get_component(&self, component_id: &str) -> EsmResult<&Component> {
        Ok(&self.graph[self.index_of(component_id)?])
    }

    pub fn get_node(&self, node_id: &str) -> EsmResult<&Component> {
        let index = self.nodes.get(node_id).ok_or_else(|| {
            EsmError::MissingKey(format!("Node {} does not exist in the network.", node_id))
        })?;
        Ok(&self.graph[*index])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Component> {
        self.nodes.values().map(|i| &self.graph[*i])
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values().map(|i| &self.graph[*i])
    }

    /// Nodes first, then the other components
    pub fn all_components(&self) -> impl Iterator<Item = &Component> {
        self.nodes().chain(self.components())
    }

    /// Connects two ports after checking their compatibility.
    pub fn connect(&mut self, port1: PortRef, port2: PortRef) -> EsmResult<EdgeIndex> {
        let index1 = self.index_of(&port1.component_id)?;
        let index2 = self.index_of(&port2.component_id)?;
        let connection = PortsConnection::new(
            &self.graph[index1],
            &port1.port_id,
            &self.graph[index2],
            &port2.port_id,
        )?;
        tracing::trace!(
            from = %port1.component_id,
            to = %port2.component_id,
            port_type = %connection.port_type().id,
            "connected ports"
        );
        Ok(self.graph.add_edge(index1, index2, connection))
    }

    pub fn connections(&self) -> impl Iterator<Item = &PortsConnection> {
        self.graph.edge_weights()
    }
}
