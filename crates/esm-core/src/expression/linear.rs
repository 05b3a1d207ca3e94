//! Linear expressions over decision variables
//!
//! A [`LinearExpression`] is a sum of [`Term`]s (a symbolic coefficient times
//! one component variable, possibly under time/scenario operators), a constant
//! parameter tree, and not yet resolved port-field terms. This is the form in
//! which model constraints and objectives are written:
//!
//! ```
//! use esm_core::{param, var, EsmResult};
//!
//! fn balance() -> EsmResult<()> {
//!     let expr = ((param("cost") * var("generation"))? + param("fixed"))?;
//!     let weekly = expr.sum()?.expec()?;
//!     assert_eq!(weekly.terms.len(), 1);
//!     Ok(())
//! }
//! # balance().unwrap();
//! ```
//!
//! Arithmetic never aliases: every operation returns a new expression and
//! terms with a zero coefficient are dropped along the way.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use indexmap::IndexMap;

use super::context::ComponentAdder;
use super::indexing::{IndexingStructure, IndexingStructureProvider, CONSTANT};
use super::node::{
    ExpressionNode, InstancesTimeIndex, PortFieldAggregatorName, ScenarioOperatorName,
    TimeAggregatorName, TimeOperatorName,
};
use super::operators::{add, divide, multiply, negate};
use super::visitor::visit;
use super::{compute_indexation, print::print_expr};
use crate::error::{EsmError, EsmResult};

use std::sync::Arc;

/// Time operator attached to a term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeOperator {
    pub name: TimeOperatorName,
    pub time_ids: InstancesTimeIndex,
}

impl TimeOperator {
    pub fn shift(time_ids: InstancesTimeIndex) -> Self {
        Self {
            name: TimeOperatorName::Shift,
            time_ids,
        }
    }

    pub fn evaluation(time_ids: InstancesTimeIndex) -> Self {
        Self {
            name: TimeOperatorName::Evaluation,
            time_ids,
        }
    }

    pub fn rolling(&self) -> bool {
        self.name.rolling()
    }
}

/// Time aggregation attached to a term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSum {
    pub stay_roll: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioAggregator {
    Expectation,
}

/// One `coefficient * variable` term
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub coefficient: ExpressionNode,
    /// Empty until the expression is associated to a component
    pub component_id: String,
    pub variable_name: String,
    pub structure: IndexingStructure,
    pub time_operator: Option<TimeOperator>,
    pub time_aggregator: Option<TimeSum>,
    pub scenario_aggregator: Option<ScenarioAggregator>,
}

/// Everything identifying a term except its coefficient and structure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermKey {
    pub component_id: String,
    pub variable_name: String,
    pub time_operator: Option<TimeOperator>,
    pub time_aggregator: Option<TimeSum>,
    pub scenario_aggregator: Option<ScenarioAggregator>,
}

impl Term {
    pub fn new(
        coefficient: impl Into<ExpressionNode>,
        component_id: &str,
        variable_name: &str,
    ) -> Self {
        Self {
            coefficient: coefficient.into(),
            component_id: component_id.to_string(),
            variable_name: variable_name.to_string(),
            structure: IndexingStructure::default(),
            time_operator: None,
            time_aggregator: None,
            scenario_aggregator: None,
        }
    }

    pub fn with_structure(mut self, structure: IndexingStructure) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_time_operator(mut self, operator: TimeOperator) -> Self {
        self.time_operator = Some(operator);
        self
    }

    pub fn with_time_aggregator(mut self, aggregator: TimeSum) -> Self {
        self.time_aggregator = Some(aggregator);
        self
    }

    pub fn with_scenario_aggregator(mut self, aggregator: ScenarioAggregator) -> Self {
        self.scenario_aggregator = Some(aggregator);
        self
    }

    pub fn key(&self) -> TermKey {
        TermKey {
            component_id: self.component_id.clone(),
            variable_name: self.variable_name.clone(),
            time_operator: self.time_operator.clone(),
            time_aggregator: self.time_aggregator,
            scenario_aggregator: self.scenario_aggregator,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    fn variable_structure<P: IndexingStructureProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> EsmResult<IndexingStructure> {
        if self.component_id.is_empty() {
            provider.get_variable_structure(&self.variable_name)
        } else {
            provider.get_component_variable_structure(&self.component_id, &self.variable_name)
        }
    }

    /// Rows over which this term varies.
    ///
    /// A non-rolling aggregator or operator removes the time axis, a scenario
    /// aggregator removes the scenario axis; otherwise the variable and the
    /// coefficient decide.
    pub fn compute_indexation<P: IndexingStructureProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> EsmResult<IndexingStructure> {
        let time_fixed = self.time_aggregator.is_some_and(|a| !a.stay_roll)
            || self.time_operator.as_ref().is_some_and(|o| !o.rolling());
        let scenario_fixed = self.scenario_aggregator.is_some();
        if time_fixed && scenario_fixed {
            return Ok(CONSTANT);
        }
        let structure =
            self.variable_structure(provider)? | compute_indexation(&self.coefficient, provider)?;
        Ok(IndexingStructure::new(
            !time_fixed && structure.time,
            !scenario_fixed && structure.scenario,
        ))
    }

    fn sum(&self, operator: Option<TimeOperator>) -> EsmResult<Term> {
        if self.time_operator.is_some() || self.time_aggregator.is_some() {
            return Err(EsmError::Composition(format!(
                "Cannot apply a time operator on term {} which already has one",
                self
            )));
        }
        let mut term = self.clone();
        term.time_aggregator = Some(TimeSum {
            stay_roll: operator.is_some(),
        });
        term.time_operator = operator;
        Ok(term)
    }

    fn expec(&self) -> EsmResult<Term> {
        if self.scenario_aggregator.is_some() {
            return Err(EsmError::Composition(format!(
                "Term {} already has a scenario aggregator",
                self
            )));
        }
        Ok(self
            .clone()
            .with_scenario_aggregator(ScenarioAggregator::Expectation))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.coefficient.is_one() {
            write!(f, "{} ", print_expr(&self.coefficient))?;
        }
        if self.component_id.is_empty() {
            write!(f, "{}", self.variable_name)?;
        } else {
            write!(f, "{}.{}", self.component_id, self.variable_name)?;
        }
        if let Some(operator) = &self.time_operator {
            let name = match operator.name {
                TimeOperatorName::Shift => "shift",
                TimeOperatorName::Evaluation => "eval",
            };
            write!(f, ".{}({:?})", name, operator.time_ids)?;
        }
        if let Some(aggregator) = &self.time_aggregator {
            write!(f, ".sum(stay_roll={})", aggregator.stay_roll)?;
        }
        if self.scenario_aggregator.is_some() {
            write!(f, ".expec()")?;
        }
        Ok(())
    }
}

/// Port and field names as declared in a model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortFieldId {
    pub port_name: String,
    pub field_name: String,
}

impl PortFieldId {
    pub fn new(port_name: &str, field_name: &str) -> Self {
        Self {
            port_name: port_name.to_string(),
            field_name: field_name.to_string(),
        }
    }
}

impl fmt::Display for PortFieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.port_name, self.field_name)
    }
}

/// A port field of one component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortFieldKey {
    pub component_id: String,
    pub port_field_id: PortFieldId,
}

impl PortFieldKey {
    pub fn new(component_id: &str, port_field_id: PortFieldId) -> Self {
        Self {
            component_id: component_id.to_string(),
            port_field_id,
        }
    }
}

/// `coefficient * port.field`, optionally summed over all connections
#[derive(Debug, Clone, PartialEq)]
pub struct PortFieldTerm {
    pub coefficient: ExpressionNode,
    pub port_name: String,
    pub field_name: String,
    pub aggregator: Option<PortFieldAggregatorName>,
}

impl PortFieldTerm {
    pub fn id(&self) -> PortFieldId {
        PortFieldId::new(&self.port_name, &self.field_name)
    }

    fn sum_connections(&self) -> EsmResult<PortFieldTerm> {
        if self.aggregator.is_some() {
            return Err(EsmError::Composition(format!(
                "Port field {} already has a port aggregator",
                self.id()
            )));
        }
        let mut term = self.clone();
        term.aggregator = Some(PortFieldAggregatorName::PortSum);
        Ok(term)
    }
}

fn check_term_merge(lhs: &Term, rhs: &Term) -> EsmResult<()> {
    if lhs.component_id != rhs.component_id || lhs.variable_name != rhs.variable_name {
        return Err(EsmError::Arithmetic(
            "Cannot merge terms for different variables".into(),
        ));
    }
    if lhs.time_operator != rhs.time_operator
        || lhs.time_aggregator != rhs.time_aggregator
        || lhs.scenario_aggregator != rhs.scenario_aggregator
    {
        return Err(EsmError::Arithmetic(
            "Cannot merge terms with different operators".into(),
        ));
    }
    if lhs.structure != rhs.structure {
        return Err(EsmError::Arithmetic(
            "Cannot merge terms with different structures".into(),
        ));
    }
    Ok(())
}

fn check_port_term_merge(lhs: &PortFieldTerm, rhs: &PortFieldTerm) -> EsmResult<()> {
    if lhs.port_name != rhs.port_name || lhs.field_name != rhs.field_name {
        return Err(EsmError::Arithmetic(
            "Cannot merge terms for different ports".into(),
        ));
    }
    if lhs.aggregator != rhs.aggregator {
        return Err(EsmError::Arithmetic(
            "Cannot merge port terms with different aggregators".into(),
        ));
    }
    Ok(())
}

/// Affine expression over component variables and port fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    pub terms: IndexMap<TermKey, Term>,
    pub constant: ExpressionNode,
    pub port_field_terms: IndexMap<PortFieldId, PortFieldTerm>,
}

/// Constraint `lower_bound <= expression <= upper_bound` with constant bounds
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneConstraint {
    pub expression: LinearExpression,
    pub lower_bound: LinearExpression,
    pub upper_bound: LinearExpression,
}

impl StandaloneConstraint {
    pub fn new(
        expression: LinearExpression,
        lower_bound: LinearExpression,
        upper_bound: LinearExpression,
    ) -> EsmResult<Self> {
        for bound in [&lower_bound, &upper_bound] {
            if !bound.is_constant() {
                return Err(EsmError::Validation(format!(
                    "The bounds of a constraint should not contain variables, {} was given.",
                    bound
                )));
            }
        }
        Ok(Self {
            expression,
            lower_bound,
            upper_bound,
        })
    }
}

impl fmt::Display for StandaloneConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <= {} <= {}",
            self.lower_bound, self.expression, self.upper_bound
        )
    }
}

impl LinearExpression {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Expression made of a constant only
    pub fn constant(value: impl Into<ExpressionNode>) -> Self {
        Self {
            constant: value.into(),
            ..Self::default()
        }
    }

    /// Builds an expression from terms, merging those sharing a key.
    pub fn from_terms(
        terms: impl IntoIterator<Item = Term>,
        constant: impl Into<ExpressionNode>,
    ) -> EsmResult<Self> {
        let mut result = Self::constant(constant);
        for term in terms {
            result.add_term(term)?;
        }
        result.remove_zeros_from_terms();
        Ok(result)
    }

    pub fn from_port_field_terms(terms: impl IntoIterator<Item = PortFieldTerm>) -> EsmResult<Self> {
        let mut result = Self::zero();
        for term in terms {
            result.add_port_term(term)?;
        }
        result.remove_zeros_from_terms();
        Ok(result)
    }

    fn add_term(&mut self, term: Term) -> EsmResult<()> {
        match self.terms.get_mut(&term.key()) {
            Some(existing) => {
                check_term_merge(existing, &term)?;
                existing.coefficient = add(existing.coefficient.clone(), term.coefficient)?;
            }
            None => {
                self.terms.insert(term.key(), term);
            }
        }
        Ok(())
    }

    fn add_port_term(&mut self, term: PortFieldTerm) -> EsmResult<()> {
        match self.port_field_terms.get_mut(&term.id()) {
            Some(existing) => {
                check_port_term_merge(existing, &term)?;
                existing.coefficient = add(existing.coefficient.clone(), term.coefficient)?;
            }
            None => {
                self.port_field_terms.insert(term.id(), term);
            }
        }
        Ok(())
    }

    fn remove_zeros_from_terms(&mut self) {
        self.terms.retain(|_, term| !term.is_zero());
        self.port_field_terms
            .retain(|_, term| !term.coefficient.is_zero());
    }

    /// No variable term and a zero constant. Port field terms are not considered.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty() && self.constant.is_zero()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty() && self.port_field_terms.is_empty()
    }

    pub fn is_unbound(&self) -> bool {
        self.is_constant() && self.constant.is_unbound()
    }

    fn map_coefficients(&self, f: impl Fn(ExpressionNode) -> ExpressionNode) -> LinearExpression {
        let mut result = self.clone();
        for term in result.terms.values_mut() {
            term.coefficient = f(term.coefficient.clone());
        }
        for term in result.port_field_terms.values_mut() {
            term.coefficient = f(term.coefficient.clone());
        }
        result.constant = f(result.constant.clone());
        result.remove_zeros_from_terms();
        result
    }

    fn try_map_coefficients(
        &self,
        f: impl Fn(ExpressionNode) -> EsmResult<ExpressionNode>,
    ) -> EsmResult<LinearExpression> {
        let mut result = LinearExpression {
            terms: self
                .terms
                .iter()
                .map(|(key, term)| {
                    let mut term = term.clone();
                    term.coefficient = f(term.coefficient)?;
                    Ok((key.clone(), term))
                })
                .collect::<EsmResult<_>>()?,
            constant: f(self.constant.clone())?,
            port_field_terms: self
                .port_field_terms
                .iter()
                .map(|(key, term)| {
                    let mut term = term.clone();
                    term.coefficient = f(term.coefficient)?;
                    Ok((key.clone(), term))
                })
                .collect::<EsmResult<_>>()?,
        };
        result.remove_zeros_from_terms();
        Ok(result)
    }

    fn add_expression(mut self, rhs: LinearExpression) -> EsmResult<LinearExpression> {
        for (_, term) in rhs.terms {
            self.add_term(term)?;
        }
        for (_, term) in rhs.port_field_terms {
            self.add_port_term(term)?;
        }
        self.constant = add(self.constant, rhs.constant)?;
        self.remove_zeros_from_terms();
        Ok(self)
    }

    fn sub_expression(self, rhs: LinearExpression) -> EsmResult<LinearExpression> {
        self.add_expression(-rhs)
    }

    fn mul_expression(self, rhs: LinearExpression) -> EsmResult<LinearExpression> {
        if self.is_constant() {
            let factor = self.constant;
            if factor.is_zero() {
                return Ok(LinearExpression::zero());
            }
            if factor.is_one() {
                return Ok(rhs);
            }
            rhs.try_map_coefficients(|c| multiply(factor.clone(), c))
        } else if rhs.is_constant() {
            let factor = rhs.constant;
            if factor.is_zero() {
                return Ok(LinearExpression::zero());
            }
            if factor.is_one() {
                return Ok(self);
            }
            self.try_map_coefficients(|c| multiply(c, factor.clone()))
        } else {
            Err(EsmError::Arithmetic(
                "Cannot multiply two non constant expression".into(),
            ))
        }
    }

    fn div_expression(self, rhs: LinearExpression) -> EsmResult<LinearExpression> {
        if !rhs.is_constant() {
            return Err(EsmError::Arithmetic(
                "Cannot divide by a non constant expression".into(),
            ));
        }
        let divisor = rhs.constant;
        if divisor.is_zero() {
            return Err(EsmError::ZeroDivision(
                "Cannot divide expression by zero".into(),
            ));
        }
        if divisor.is_one() {
            return Ok(self);
        }
        self.try_map_coefficients(|c| divide(c, divisor.clone()))
    }

    fn compare(
        &self,
        rhs: impl Into<LinearExpression>,
        lower: f64,
        upper: f64,
    ) -> EsmResult<StandaloneConstraint> {
        let expression = self.clone().sub_expression(rhs.into())?;
        StandaloneConstraint::new(
            expression,
            LinearExpression::constant(lower),
            LinearExpression::constant(upper),
        )
    }

    /// `self - rhs <= 0`
    pub fn le(&self, rhs: impl Into<LinearExpression>) -> EsmResult<StandaloneConstraint> {
        self.compare(rhs, f64::NEG_INFINITY, 0.0)
    }

    /// `self - rhs >= 0`
    pub fn ge(&self, rhs: impl Into<LinearExpression>) -> EsmResult<StandaloneConstraint> {
        self.compare(rhs, 0.0, f64::INFINITY)
    }

    /// `self - rhs == 0`
    pub fn eq_(&self, rhs: impl Into<LinearExpression>) -> EsmResult<StandaloneConstraint> {
        self.compare(rhs, 0.0, 0.0)
    }

    /// Rows over which the expression varies: the union of its terms' indexing
    /// and of the constant's.
    pub fn compute_indexation<P: IndexingStructureProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> EsmResult<IndexingStructure> {
        let mut indexing = compute_indexation(&self.constant, provider)?;
        for term in self.terms.values() {
            if indexing.is_time_scenario_varying() {
                break;
            }
            indexing = indexing | term.compute_indexation(provider)?;
        }
        Ok(indexing)
    }

    /// Sums the expression over time.
    ///
    /// With `shift` (or `eval`) the sum runs over the given relative (or
    /// absolute) time ids and the result still rolls with the row; without
    /// either it runs over the whole block. The operator distributes over every
    /// term and over the constant:
    /// `(a * x + b).sum(shift=S)` is `sum over s in S of a[t+s] x[t+s] + b[t+s]`.
    pub fn time_sum(
        &self,
        shift: Option<InstancesTimeIndex>,
        eval: Option<InstancesTimeIndex>,
    ) -> EsmResult<LinearExpression> {
        let (operator, constant) = match (shift, eval) {
            (Some(_), Some(_)) => {
                return Err(EsmError::Construction(
                    "Only shift or eval arguments should specified, not both.".into(),
                ))
            }
            (Some(ids), None) => (
                Some(TimeOperator::shift(ids.clone())),
                ExpressionNode::TimeAggregator {
                    operand: Arc::new(ExpressionNode::TimeOperator {
                        operand: Arc::new(self.constant.clone()),
                        operator: TimeOperatorName::Shift,
                        instances_index: ids,
                    }),
                    aggregator: TimeAggregatorName::Sum,
                    stay_roll: true,
                },
            ),
            (None, Some(ids)) => (
                Some(TimeOperator::evaluation(ids.clone())),
                ExpressionNode::TimeAggregator {
                    operand: Arc::new(ExpressionNode::TimeOperator {
                        operand: Arc::new(self.constant.clone()),
                        operator: TimeOperatorName::Evaluation,
                        instances_index: ids,
                    }),
                    aggregator: TimeAggregatorName::Sum,
                    stay_roll: true,
                },
            ),
            (None, None) => (
                None,
                ExpressionNode::TimeAggregator {
                    operand: Arc::new(self.constant.clone()),
                    aggregator: TimeAggregatorName::Sum,
                    stay_roll: false,
                },
            ),
        };
        let terms = self
            .terms
            .values()
            .map(|term| term.sum(operator.clone()))
            .collect::<EsmResult<Vec<_>>>()?;
        let mut result = LinearExpression::from_terms(terms, constant)?;
        result.port_field_terms = self.port_field_terms.clone();
        Ok(result)
    }

    /// Sum over the whole block
    pub fn sum(&self) -> EsmResult<LinearExpression> {
        self.time_sum(None, None)
    }

    /// Rolling sum over time ids relative to the row
    pub fn sum_shift(&self, ids: impl Into<InstancesTimeIndex>) -> EsmResult<LinearExpression> {
        self.time_sum(Some(ids.into()), None)
    }

    /// Sum over absolute time ids
    pub fn sum_eval(&self, ids: impl Into<InstancesTimeIndex>) -> EsmResult<LinearExpression> {
        self.time_sum(None, Some(ids.into()))
    }

    /// Shorthand for `sum_shift` on a single time step, `x.shift(-1)` for `x[t-1]`.
    pub fn shift(&self, ids: impl Into<InstancesTimeIndex>) -> EsmResult<LinearExpression> {
        let ids = ids.into();
        if !ids.is_simple() {
            return Err(EsmError::Construction(
                "The shift operator can only be applied on expressions refering to a single time step. To apply a shifting sum on multiple time indices on an expression x, you should use x.sum(shift=...)".into(),
            ));
        }
        self.time_sum(Some(ids), None)
    }

    /// Shorthand for `sum_eval` on a single time step, `x.eval(1)` for `x[1]`.
    pub fn eval(&self, ids: impl Into<InstancesTimeIndex>) -> EsmResult<LinearExpression> {
        let ids = ids.into();
        if !ids.is_simple() {
            return Err(EsmError::Construction(
                "The eval operator can only be applied on expressions refering to a single time step. To apply a evaluation sum on multiple time indices on an expression x, you should use x.sum(eval=...)".into(),
            ));
        }
        self.time_sum(None, Some(ids))
    }

    /// Expectation over scenarios, distributed over terms and constant.
    pub fn expec(&self) -> EsmResult<LinearExpression> {
        let terms = self
            .terms
            .values()
            .map(Term::expec)
            .collect::<EsmResult<Vec<_>>>()?;
        let constant = ExpressionNode::ScenarioOperator {
            operand: Arc::new(self.constant.clone()),
            operator: ScenarioOperatorName::Expectation,
        };
        let mut result = LinearExpression::from_terms(terms, constant)?;
        result.port_field_terms = self.port_field_terms.clone();
        Ok(result)
    }

    /// Sums a port field over every connection of the port.
    pub fn sum_connections(&self) -> EsmResult<LinearExpression> {
        if !self.is_zero() {
            return Err(EsmError::Construction(
                "sum_connections only after an expression created with port_field".into(),
            ));
        }
        let terms = self
            .port_field_terms
            .values()
            .map(PortFieldTerm::sum_connections)
            .collect::<EsmResult<Vec<_>>>()?;
        LinearExpression::from_port_field_terms(terms)
    }

    /// Replaces port-field terms with the expressions registered for the
    /// ports of `component_id`.
    ///
    /// Without aggregator exactly one expression must feed the port field; a
    /// port sum adds all of them.
    pub fn resolve_port(
        &self,
        component_id: &str,
        ports_expressions: &HashMap<PortFieldKey, Vec<LinearExpression>>,
    ) -> EsmResult<LinearExpression> {
        let mut port_expression = LinearExpression::zero();
        for port_term in self.port_field_terms.values() {
            let key = PortFieldKey::new(component_id, port_term.id());
            let expressions = ports_expressions
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or_default();
            match port_term.aggregator {
                None if expressions.len() != 1 => {
                    return Err(EsmError::Resolution(format!(
                        "Invalid number of expressions for port : {}",
                        port_term.port_name
                    )));
                }
                None | Some(PortFieldAggregatorName::PortSum) => {}
            }
            for expression in expressions {
                let contribution =
                    LinearExpression::constant(port_term.coefficient.clone()) * expression.clone();
                port_expression = (port_expression + contribution?)?;
            }
        }
        let without_ports = LinearExpression {
            terms: self.terms.clone(),
            constant: self.constant.clone(),
            port_field_terms: IndexMap::new(),
        };
        without_ports + port_expression
    }

    /// Associates the expression to `component_id`.
    ///
    /// Terms without component get the id and their coefficients are qualified.
    /// Terms that already belong to a component come from port resolution and
    /// keep their owner; only bare parameters multiplying them are qualified.
    pub fn add_component_context(&self, component_id: &str) -> EsmResult<LinearExpression> {
        let mut result = LinearExpression::zero();
        for term in self.terms.values() {
            let mut adder = if term.component_id.is_empty() {
                ComponentAdder::strict(component_id)
            } else {
                ComponentAdder::lenient(component_id)
            };
            let mut qualified = term.clone();
            if qualified.component_id.is_empty() {
                qualified.component_id = component_id.to_string();
            }
            qualified.coefficient = visit(&term.coefficient, &mut adder)?;
            if let Some(operator) = &term.time_operator {
                qualified.time_operator = Some(TimeOperator {
                    name: operator.name,
                    time_ids: adder.instances_index(&operator.time_ids)?,
                });
            }
            result.add_term(qualified)?;
        }
        result.constant = visit(&self.constant, &mut ComponentAdder::lenient(component_id))?;
        result.port_field_terms = self.port_field_terms.clone();
        result.remove_zeros_from_terms();
        Ok(result)
    }
}

impl fmt::Display for LinearExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.terms.values().map(|t| t.to_string()).collect();
        parts.extend(self.port_field_terms.values().map(|t| {
            let mut s = format!("{} {}", print_expr(&t.coefficient), t.id());
            if t.aggregator.is_some() {
                s.push_str(".sum_connections()");
            }
            s
        }));
        if !self.constant.is_zero() || parts.is_empty() {
            parts.push(print_expr(&self.constant));
        }
        f.write_str(&parts.join(" + "))
    }
}

impl From<ExpressionNode> for LinearExpression {
    fn from(node: ExpressionNode) -> Self {
        LinearExpression::constant(node)
    }
}

impl From<f64> for LinearExpression {
    fn from(value: f64) -> Self {
        LinearExpression::constant(value)
    }
}

impl Neg for LinearExpression {
    type Output = LinearExpression;

    fn neg(self) -> LinearExpression {
        self.map_coefficients(negate)
    }
}

macro_rules! linear_binary_op {
    ($trait:ident, $method:ident, $impl_fn:ident) => {
        impl $trait<LinearExpression> for LinearExpression {
            type Output = EsmResult<LinearExpression>;

            fn $method(self, rhs: LinearExpression) -> Self::Output {
                self.$impl_fn(rhs)
            }
        }

        impl $trait<ExpressionNode> for LinearExpression {
            type Output = EsmResult<LinearExpression>;

            fn $method(self, rhs: ExpressionNode) -> Self::Output {
                self.$impl_fn(LinearExpression::constant(rhs))
            }
        }

        impl $trait<f64> for LinearExpression {
            type Output = EsmResult<LinearExpression>;

            fn $method(self, rhs: f64) -> Self::Output {
                self.$impl_fn(LinearExpression::constant(rhs))
            }
        }

        impl $trait<LinearExpression> for ExpressionNode {
            type Output = EsmResult<LinearExpression>;

            fn $method(self, rhs: LinearExpression) -> Self::Output {
                LinearExpression::constant(self).$impl_fn(rhs)
            }
        }

        impl $trait<LinearExpression> for f64 {
            type Output = EsmResult<LinearExpression>;

            fn $method(self, rhs: LinearExpression) -> Self::Output {
                LinearExpression::constant(self).$impl_fn(rhs)
            }
        }
    };
}

linear_binary_op!(Add, add, add_expression);
linear_binary_op!(Sub, sub, sub_expression);
linear_binary_op!(Mul, mul, mul_expression);
linear_binary_op!(Div, div, div_expression);

/// Variable of the model being written, associated to a component later
pub fn var(name: &str) -> LinearExpression {
    let term = Term::new(1.0, "", name);
    LinearExpression {
        terms: IndexMap::from([(term.key(), term)]),
        ..LinearExpression::default()
    }
}

/// Variable of a given component
pub fn comp_var(component_id: &str, name: &str) -> LinearExpression {
    let term = Term::new(1.0, component_id, name);
    LinearExpression {
        terms: IndexMap::from([(term.key(), term)]),
        ..LinearExpression::default()
    }
}

/// Field of a model port, substituted by [`LinearExpression::resolve_port`]
pub fn port_field(port_name: &str, field_name: &str) -> LinearExpression {
    let term = PortFieldTerm {
        coefficient: ExpressionNode::Literal(1.0),
        port_name: port_name.to_string(),
        field_name: field_name.to_string(),
        aggregator: None,
    };
    LinearExpression {
        port_field_terms: IndexMap::from([(term.id(), term)]),
        ..LinearExpression::default()
    }
}

pub fn sum_expressions(
    expressions: impl IntoIterator<Item = LinearExpression>,
) -> EsmResult<LinearExpression> {
    expressions
        .into_iter()
        .try_fold(LinearExpression::zero(), |acc, e| acc + e)
}

pub fn linear_expressions_equal(lhs: &LinearExpression, rhs: &LinearExpression) -> bool {
    lhs == rhs
}
