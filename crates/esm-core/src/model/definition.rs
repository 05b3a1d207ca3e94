use indexmap::IndexMap;

use super::constraint::Constraint;
use super::parameter::Parameter;
use super::port::{ModelPort, PortFieldDefinition};
use super::variable::Variable;
use crate::error::{EsmError, EsmResult};
use crate::expression::{
    is_constant, IndexingStructure, IndexingStructureProvider, LinearExpression, PortFieldId,
    CONSTANT,
};

/// Behaviour shared by every component referencing it: parameters,
/// variables, constraints, objective contributions and ports.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: String,
    pub parameters: IndexMap<String, Parameter>,
    pub variables: IndexMap<String, Variable>,
    pub constraints: IndexMap<String, Constraint>,
    pub binding_constraints: IndexMap<String, Constraint>,
    pub objective_operational_contribution: Option<LinearExpression>,
    pub objective_investment_contribution: Option<LinearExpression>,
    pub ports: IndexMap<String, ModelPort>,
    pub port_fields_definitions: IndexMap<PortFieldId, PortFieldDefinition>,
    pub inter_block_dyn: bool,
}

impl Model {
    /// Binding constraints first, then inner constraints
    pub fn all_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.binding_constraints
            .values()
            .chain(self.constraints.values())
    }

    pub fn parameter(&self, name: &str) -> EsmResult<&Parameter> {
        self.parameters.get(name).ok_or_else(|| {
            EsmError::MissingKey(format!("Parameter {} of model {}", name, self.id))
        })
    }

    pub fn variable(&self, name: &str) -> EsmResult<&Variable> {
        self.variables.get(name).ok_or_else(|| {
            EsmError::MissingKey(format!("Variable {} of model {}", name, self.id))
        })
    }
}

/// Resolves structures against the model's own declarations
struct ModelStructureProvider<'a> {
    model: &'a Model,
}

impl IndexingStructureProvider for ModelStructureProvider<'_> {
    fn get_parameter_structure(&self, name: &str) -> EsmResult<IndexingStructure> {
        Ok(self.model.parameter(name)?.structure)
    }

    fn get_variable_structure(&self, name: &str) -> EsmResult<IndexingStructure> {
        Ok(self.model.variable(name)?.structure)
    }

    fn get_component_parameter_structure(
        &self,
        _component_id: &str,
        _name: &str,
    ) -> EsmResult<IndexingStructure> {
        Err(EsmError::NotImplemented(
            "Cannot have parameters associated to components in models.".into(),
        ))
    }

    fn get_component_variable_structure(
        &self,
        _component_id: &str,
        _name: &str,
    ) -> EsmResult<IndexingStructure> {
        Err(EsmError::NotImplemented(
            "Cannot have variables associated to components in models.".into(),
        ))
    }
}

fn validate_objective_contribution(model: &Model, contribution: &LinearExpression) -> EsmResult<()> {
    let coefficients = contribution.terms.values().map(|t| &t.coefficient);
    for node in std::iter::once(&contribution.constant).chain(coefficients) {
        if !is_constant(node)? {
            return Err(EsmError::Validation(
                "Objective contribution must be a linear expression.".into(),
            ));
        }
    }
    let structure = contribution.compute_indexation(&ModelStructureProvider { model })?;
    if structure != CONSTANT {
        return Err(EsmError::Validation(
            "Objective contribution should be a real-valued expression.".into(),
        ));
    }
    Ok(())
}

/// Builds and validates a [`Model`].
///
/// ```
/// use esm_core::model::{float_parameter, float_variable, ModelBuilder};
/// use esm_core::{literal, param, var, CONSTANT};
///
/// let model = ModelBuilder::new("generator")
///     .parameter(float_parameter("cost").with_structure(CONSTANT))
///     .parameter(float_parameter("p_max").with_structure(CONSTANT))
///     .variable(
///         float_variable("generation")
///             .with_lower_bound(literal(0.0))
///             .with_upper_bound(param("p_max")),
///     )
///     .objective_operational_contribution(
///         (param("cost") * var("generation"))?.sum()?.expec()?,
///     )
///     .build()?;
/// assert_eq!(model.variables.len(), 1);
/// # Ok::<(), esm_core::EsmError>(())
/// ```
#[derive(Debug, Default)]
pub struct ModelBuilder {
    id: String,
    parameters: Vec<Parameter>,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    binding_constraints: Vec<Constraint>,
    objective_operational_contribution: Option<LinearExpression>,
    objective_investment_contribution: Option<LinearExpression>,
    ports: Vec<ModelPort>,
    port_fields_definitions: Vec<PortFieldDefinition>,
    inter_block_dyn: bool,
}

impl ModelBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn binding_constraint(mut self, constraint: Constraint) -> Self {
        self.binding_constraints.push(constraint);
        self
    }

    pub fn objective_operational_contribution(mut self, contribution: LinearExpression) -> Self {
        self.objective_operational_contribution = Some(contribution);
        self
    }

    pub fn objective_investment_contribution(mut self, contribution: LinearExpression) -> Self {
        self.objective_investment_contribution = Some(contribution);
        self
    }

    pub fn port(mut self, port: ModelPort) -> Self {
        self.ports.push(port);
        self
    }

    pub fn port_field_definition(mut self, definition: PortFieldDefinition) -> Self {
        self.port_fields_definitions.push(definition);
        self
    }

    pub fn inter_block_dyn(mut self, inter_block_dyn: bool) -> Self {
        self.inter_block_dyn = inter_block_dyn;
        self
    }

    pub fn build(self) -> EsmResult<Model> {
        let mut ports = IndexMap::new();
        for port in self.ports {
            if ports.contains_key(&port.port_name) {
                return Err(EsmError::Validation(format!(
                    "2 ports have the same name inside the model, it's not authorized : {}",
                    port.port_name
                )));
            }
            ports.insert(port.port_name.clone(), port);
        }

        for variable in &self.variables {
            variable.validate()?;
        }

        let model = Model {
            id: self.id,
            parameters: self
                .parameters
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
            variables: self
                .variables
                .into_iter()
                .map(|v| (v.name.clone(), v))
                .collect(),
            constraints: self
                .constraints
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
            binding_constraints: self
                .binding_constraints
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
            objective_operational_contribution: self.objective_operational_contribution,
            objective_investment_contribution: self.objective_investment_contribution,
            ports,
            port_fields_definitions: self
                .port_fields_definitions
                .into_iter()
                .map(|d| (d.port_field.clone(), d))
                .collect(),
            inter_block_dyn: self.inter_block_dyn,
        };

        for contribution in [
            &model.objective_operational_contribution,
            &model.objective_investment_contribution,
        ]
        .into_iter()
        .flatten()
        {
            validate_objective_contribution(&model, contribution)?;
        }

        for id in model.port_fields_definitions.keys() {
            let port = model.ports.get(&id.port_name).ok_or_else(|| {
                EsmError::Validation(format!(
                    "Invalid port in port field definition: {}",
                    id.port_name
                ))
            })?;
            if !port.port_type.has_field(&id.field_name) {
                return Err(EsmError::Validation(format!(
                    "Invalid port field in port field definition: {}",
                    id.field_name
                )));
            }
        }

        tracing::debug!(
            model = %model.id,
            parameters = model.parameters.len(),
            variables = model.variables.len(),
            constraints = model.constraints.len() + model.binding_constraints.len(),
            "built model"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{param, var, TIME_AND_SCENARIO_FREE};
    use crate::model::{float_parameter, float_variable, port_field_def, PortType};

    fn balance() -> PortType {
        PortType::new("balance", &["flow"])
    }

    #[test]
    fn test_duplicate_port_names_rejected() {
        let err = ModelBuilder::new("link")
            .port(ModelPort::new(&balance(), "port"))
            .port(ModelPort::new(&balance(), "port"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("2 ports have the same name"));
    }

    #[test]
    fn test_port_field_definition_checked() {
        let definition = port_field_def("missing", "flow", var("x")).expect("valid definition");
        let err = ModelBuilder::new("m")
            .variable(float_variable("x"))
            .port(ModelPort::new(&balance(), "port"))
            .port_field_definition(definition)
            .build()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid port in port field definition: missing"));

        let definition = port_field_def("port", "voltage", var("x")).expect("valid definition");
        let err = ModelBuilder::new("m")
            .variable(float_variable("x"))
            .port(ModelPort::new(&balance(), "port"))
            .port_field_definition(definition)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid port field"));
    }

    #[test]
    fn test_objective_must_be_real_valued() {
        let err = ModelBuilder::new("generator")
            .parameter(float_parameter("cost"))
            .variable(float_variable("generation"))
            .objective_operational_contribution(
                (param("cost") * var("generation")).expect("linear"),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            EsmError::Validation("Objective contribution should be a real-valued expression.".into())
        );

        let model = ModelBuilder::new("generator")
            .parameter(float_parameter("cost").with_structure(TIME_AND_SCENARIO_FREE))
            .variable(float_variable("generation"))
            .objective_operational_contribution(
                (param("cost") * var("generation"))
                    .and_then(|e| e.sum())
                    .and_then(|e| e.expec())
                    .expect("linear"),
            )
            .build()
            .expect("aggregated objective");
        assert!(model.objective_operational_contribution.is_some());
    }

    #[test]
    fn test_objective_with_unknown_variable() {
        let err = ModelBuilder::new("m")
            .objective_operational_contribution(var("ghost").sum().expect("sum"))
            .build()
            .unwrap_err();
        assert!(matches!(err, EsmError::MissingKey(_)));
    }

    #[test]
    fn test_all_constraints_order() {
        let model = ModelBuilder::new("m")
            .variable(float_variable("x"))
            .constraint(Constraint::new("inner", var("x").ge(0.0).expect("linear")))
            .binding_constraint(Constraint::new("binding", var("x").le(1.0).expect("linear")))
            .port(ModelPort::new(&balance(), "port"))
            .port_field_definition(port_field_def("port", "flow", var("x")).expect("valid"))
            .build()
            .expect("valid model");
        let names: Vec<&str> = model.all_constraints().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["binding", "inner"]);
    }
}
