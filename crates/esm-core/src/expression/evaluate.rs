//! Per-row coefficient evaluation
//!
//! [`resolve_coefficient`] folds a parameter-only expression down to the single
//! number it takes at a given row. Evaluation tracks the set of
//! (timestep, scenario) pairs currently in scope: time operators move it, the
//! time sum widens it to the whole block and the expectation widens it to every
//! scenario. Aggregators collapse their operand back onto the row timestep or
//! scenario, so a well-formed coefficient ends with exactly one value keyed at
//! the row.

use indexmap::{IndexMap, IndexSet};

use super::indexing::RowIndex;
use super::node::{
    Comparator, ExpressionNode, InstancesTimeIndex, PortFieldAggregatorName,
    ScenarioOperatorName, TimeAggregatorName, TimeOperatorName,
};
use super::value_provider::{TimeScenarioIndex, ValueProvider};
use super::visitor::{visit, ExpressionVisitor};
use crate::error::{EsmError, EsmResult};

type Values = IndexMap<TimeScenarioIndex, f64>;

fn port_not_resolved() -> EsmError {
    EsmError::UnsupportedNode("Port fields must be resolved before evaluating parameters".into())
}

fn checked_division(numerator: f64, denominator: f64) -> EsmResult<f64> {
    if denominator == 0.0 {
        return Err(EsmError::ZeroDivision(
            "Division by zero while evaluating parameters".into(),
        ));
    }
    Ok(numerator / denominator)
}

/// Evaluates time operator arguments at a fixed (timestep, scenario).
///
/// Arguments may only reference parameters that are constant over time and
/// cannot contain time operators or aggregators themselves.
struct InstancesIndexVisitor<'a, P: ValueProvider + ?Sized> {
    context: &'a P,
    index: TimeScenarioIndex,
}

impl<P: ValueProvider + ?Sized> InstancesIndexVisitor<'_, P> {
    fn single(values: Vec<f64>, name: &str) -> EsmResult<f64> {
        values
            .first()
            .copied()
            .ok_or_else(|| EsmError::MissingKey(format!("No value for parameter {}", name)))
    }

    fn constant_over_time_required() -> EsmError {
        EsmError::RowResolution(
            "Parameter given in an instance index expression must be constant over time".into(),
        )
    }
}

impl<P: ValueProvider + ?Sized> ExpressionVisitor for InstancesIndexVisitor<'_, P> {
    type Output = EsmResult<f64>;

    fn literal(&mut self, value: f64) -> Self::Output {
        Ok(value)
    }

    fn parameter(&mut self, name: &str) -> Self::Output {
        if !self.context.parameter_is_constant_over_time(name)? {
            return Err(Self::constant_over_time_required());
        }
        let values = self.context.get_parameter_value(name, &[self.index])?;
        Self::single(values, name)
    }

    fn comp_parameter(&mut self, component_id: &str, name: &str) -> Self::Output {
        if !self
            .context
            .component_parameter_is_constant_over_time(component_id, name)?
        {
            return Err(Self::constant_over_time_required());
        }
        let values = self
            .context
            .get_component_parameter_value(component_id, name, &[self.index])?;
        Self::single(values, name)
    }

    fn negation(&mut self, operand: &ExpressionNode) -> Self::Output {
        Ok(-visit(operand, self)?)
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        Ok(visit(left, self)? + visit(right, self)?)
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        Ok(visit(left, self)? - visit(right, self)?)
    }

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        Ok(visit(left, self)? * visit(right, self)?)
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        let numerator = visit(left, self)?;
        checked_division(numerator, visit(right, self)?)
    }

    fn comparison(
        &mut self,
        _left: &ExpressionNode,
        _right: &ExpressionNode,
        _comparator: Comparator,
    ) -> Self::Output {
        Err(EsmError::UnsupportedNode(
            "Cannot evaluate comparison operator.".into(),
        ))
    }

    fn time_operator(
        &mut self,
        _operand: &ExpressionNode,
        _operator: TimeOperatorName,
        _instances_index: &InstancesTimeIndex,
    ) -> Self::Output {
        Err(EsmError::UnsupportedNode(
            "An instance index expression cannot contain time operator".into(),
        ))
    }

    fn time_aggregator(
        &mut self,
        _operand: &ExpressionNode,
        _aggregator: TimeAggregatorName,
        _stay_roll: bool,
    ) -> Self::Output {
        Err(EsmError::UnsupportedNode(
            "An instance index expression cannot contain time aggregator".into(),
        ))
    }

    fn scenario_operator(
        &mut self,
        _operand: &ExpressionNode,
        _operator: ScenarioOperatorName,
    ) -> Self::Output {
        Err(EsmError::UnsupportedNode(
            "An instance index expression cannot contain scenario operator".into(),
        ))
    }

    fn port_field(&mut self, _port_name: &str, _field_name: &str) -> Self::Output {
        Err(port_not_resolved())
    }

    fn port_field_aggregator(
        &mut self,
        _operand: &ExpressionNode,
        _aggregator: PortFieldAggregatorName,
    ) -> Self::Output {
        Err(port_not_resolved())
    }
}

fn float_to_int(value: f64) -> EsmResult<i64> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(EsmError::RowResolution(format!(
            "{} does not represent an integer time index.",
            value
        )))
    }
}

fn evaluate_time_id<P: ValueProvider + ?Sized>(
    expression: &ExpressionNode,
    provider: &P,
    index: TimeScenarioIndex,
) -> EsmResult<i64> {
    let value = visit(
        expression,
        &mut InstancesIndexVisitor {
            context: provider,
            index,
        },
    )?;
    float_to_int(value)
}

/// Integer time ids designated by `instances_index`, evaluated at `index`.
///
/// Ranges include their stop value.
pub fn get_time_ids_from_instances_index<P: ValueProvider + ?Sized>(
    instances_index: &InstancesTimeIndex,
    provider: &P,
    index: TimeScenarioIndex,
) -> EsmResult<Vec<i64>> {
    match instances_index {
        InstancesTimeIndex::List(expressions) => expressions
            .iter()
            .map(|e| evaluate_time_id(e, provider, index))
            .collect(),
        InstancesTimeIndex::Range(range) => {
            let start = evaluate_time_id(&range.start, provider, index)?;
            let stop = evaluate_time_id(&range.stop, provider, index)?;
            let step = match &range.step {
                Some(step) => evaluate_time_id(step, provider, index)?,
                None => 1,
            };
            if step == 0 {
                return Err(EsmError::Construction(
                    "Time range step must not be zero".into(),
                ));
            }
            let mut ids = Vec::new();
            let mut current = start;
            while (step > 0 && current <= stop) || (step < 0 && current >= stop) {
                ids.push(current);
                current += step;
            }
            Ok(ids)
        }
    }
}

struct ParameterEvaluationVisitor<'a, P: ValueProvider + ?Sized> {
    context: &'a P,
    row: TimeScenarioIndex,
    active: Vec<TimeScenarioIndex>,
}

impl<P: ValueProvider + ?Sized> ParameterEvaluationVisitor<'_, P> {
    fn active_scenarios(&self) -> IndexSet<usize> {
        self.active.iter().map(|i| i.scenario).collect()
    }

    fn active_times(&self) -> IndexSet<i64> {
        self.active.iter().map(|i| i.time).collect()
    }

    fn zip_values(&self, values: Vec<f64>) -> EsmResult<Values> {
        if values.len() != self.active.len() {
            return Err(EsmError::RowResolution(format!(
                "Value provider returned {} values for {} indices",
                values.len(),
                self.active.len()
            )));
        }
        Ok(self.active.iter().copied().zip(values).collect())
    }

    /// Element-wise combination over the union of keys.
    fn combine(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
        neutral: f64,
        op: fn(f64, f64) -> EsmResult<f64>,
    ) -> EsmResult<Values> {
        let left = visit(left, self)?;
        let right = visit(right, self)?;
        let keys: IndexSet<TimeScenarioIndex> = left.keys().chain(right.keys()).copied().collect();
        keys.into_iter()
            .map(|key| {
                let l = left.get(&key).copied().unwrap_or(neutral);
                let r = right.get(&key).copied().unwrap_or(neutral);
                Ok((key, op(l, r)?))
            })
            .collect()
    }

    /// Evaluates `operand` with `active` in scope, then restores the previous scope.
    fn visit_with(
        &mut self,
        operand: &ExpressionNode,
        active: Vec<TimeScenarioIndex>,
    ) -> EsmResult<Values> {
        let saved = std::mem::replace(&mut self.active, active);
        let result = visit(operand, self);
        self.active = saved;
        result
    }
}

impl<P: ValueProvider + ?Sized> ExpressionVisitor for ParameterEvaluationVisitor<'_, P> {
    type Output = EsmResult<Values>;

    fn literal(&mut self, value: f64) -> Self::Output {
        Ok(self.active.iter().map(|i| (*i, value)).collect())
    }

    fn parameter(&mut self, name: &str) -> Self::Output {
        let values = self.context.get_parameter_value(name, &self.active)?;
        self.zip_values(values)
    }

    fn comp_parameter(&mut self, component_id: &str, name: &str) -> Self::Output {
        let values = self
            .context
            .get_component_parameter_value(component_id, name, &self.active)?;
        self.zip_values(values)
    }

    fn negation(&mut self, operand: &ExpressionNode) -> Self::Output {
        let mut values = visit(operand, self)?;
        values.values_mut().for_each(|v| *v = -*v);
        Ok(values)
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right, 0.0, |a, b| Ok(a + b))
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right, 0.0, |a, b| Ok(a - b))
    }

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right, 1.0, |a, b| Ok(a * b))
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right, 1.0, checked_division)
    }

    fn comparison(
        &mut self,
        _left: &ExpressionNode,
        _right: &ExpressionNode,
        _comparator: Comparator,
    ) -> Self::Output {
        Err(EsmError::UnsupportedNode(
            "Cannot evaluate comparison operator.".into(),
        ))
    }

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: TimeOperatorName,
        instances_index: &InstancesTimeIndex,
    ) -> Self::Output {
        let mut targets = IndexSet::new();
        for scenario in self.active_scenarios() {
            let at = TimeScenarioIndex::new(self.row.time, scenario);
            for id in get_time_ids_from_instances_index(instances_index, self.context, at)? {
                let time = match operator {
                    TimeOperatorName::Shift => self.row.time + id,
                    TimeOperatorName::Evaluation => id,
                };
                targets.insert(TimeScenarioIndex::new(time, scenario));
            }
        }
        self.visit_with(operand, targets.into_iter().collect())
    }

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: TimeAggregatorName,
        _stay_roll: bool,
    ) -> Self::Output {
        let values = if matches!(operand, ExpressionNode::TimeOperator { .. }) {
            visit(operand, self)?
        } else {
            let block_length = self.context.block_length() as i64;
            let whole_block = self
                .active_scenarios()
                .into_iter()
                .flat_map(|s| (0..block_length).map(move |t| TimeScenarioIndex::new(t, s)))
                .collect();
            self.visit_with(operand, whole_block)?
        };
        let mut sums = Values::new();
        for (index, value) in values {
            *sums
                .entry(TimeScenarioIndex::new(self.row.time, index.scenario))
                .or_insert(0.0) += value;
        }
        Ok(sums)
    }

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: ScenarioOperatorName,
    ) -> Self::Output {
        if operator != ScenarioOperatorName::Expectation {
            return Err(EsmError::Degree(format!(
                "Scenario operator {:?} cannot be evaluated in a linear expression",
                operator
            )));
        }
        let scenario_count = self.context.scenarios();
        let every_scenario = self
            .active_times()
            .into_iter()
            .flat_map(|t| (0..scenario_count).map(move |s| TimeScenarioIndex::new(t, s)))
            .collect();
        let values = self.visit_with(operand, every_scenario)?;
        let weight = 1.0 / scenario_count as f64;
        let mut means = Values::new();
        for (index, value) in values {
            *means
                .entry(TimeScenarioIndex::new(index.time, self.row.scenario))
                .or_insert(0.0) += weight * value;
        }
        Ok(means)
    }

    fn port_field(&mut self, _port_name: &str, _field_name: &str) -> Self::Output {
        Err(port_not_resolved())
    }

    fn port_field_aggregator(
        &mut self,
        _operand: &ExpressionNode,
        _aggregator: PortFieldAggregatorName,
    ) -> Self::Output {
        Err(port_not_resolved())
    }
}

/// Value of a parameter-only expression at `row`.
pub fn resolve_coefficient<P: ValueProvider + ?Sized>(
    expression: &ExpressionNode,
    provider: &P,
    row: RowIndex,
) -> EsmResult<f64> {
    let row = TimeScenarioIndex::new(row.time as i64, row.scenario);
    let mut visitor = ParameterEvaluationVisitor {
        context: provider,
        row,
        active: vec![row],
    };
    let values = visit(expression, &mut visitor)?;
    if values.len() != 1 {
        return Err(EsmError::RowResolution(
            "Evaluation of expression cannot be reduced to a float value".into(),
        ));
    }
    match values.get(&row) {
        Some(value) => Ok(*value),
        None => Err(EsmError::RowResolution(
            "Expression has a time operator but not time aggregator, maybe you are missing a sum(), necessary even on one element".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::node::{comp_param, literal, param, ExpressionRange};
    use std::sync::Arc;

    /// `p` varies over 4 timesteps and 2 scenarios, `c.q` only over scenarios.
    struct TestValues {
        constant_over_time: bool,
    }

    const P_VALUES: [[f64; 2]; 4] = [[1.0, 4.0], [2.0, 5.0], [3.0, 6.0], [7.0, 8.0]];
    const Q_VALUES: [f64; 2] = [2.0, 1.0];

    impl TestValues {
        fn new() -> Self {
            Self {
                constant_over_time: true,
            }
        }
    }

    impl ValueProvider for TestValues {
        fn get_parameter_value(
            &self,
            name: &str,
            indices: &[TimeScenarioIndex],
        ) -> EsmResult<Vec<f64>> {
            indices
                .iter()
                .map(|i| {
                    P_VALUES
                        .get(i.time as usize)
                        .filter(|_| i.time >= 0)
                        .map(|row| row[i.scenario])
                        .ok_or_else(|| EsmError::MissingKey(format!("{} at {}", name, i)))
                })
                .collect()
        }

        fn get_component_parameter_value(
            &self,
            _component_id: &str,
            _name: &str,
            indices: &[TimeScenarioIndex],
        ) -> EsmResult<Vec<f64>> {
            Ok(indices.iter().map(|i| Q_VALUES[i.scenario]).collect())
        }

        fn parameter_is_constant_over_time(&self, _name: &str) -> EsmResult<bool> {
            Ok(self.constant_over_time)
        }

        fn component_parameter_is_constant_over_time(
            &self,
            _component_id: &str,
            _name: &str,
        ) -> EsmResult<bool> {
            Ok(self.constant_over_time)
        }

        fn block_length(&self) -> usize {
            4
        }

        fn scenarios(&self) -> usize {
            2
        }
    }

    fn assert_resolves(expr: ExpressionNode, row: RowIndex, expected: f64) {
        let value = resolve_coefficient(&expr, &TestValues::new(), row)
            .unwrap_or_else(|e| panic!("{} failed to resolve: {}", expr, e));
        assert!(
            (value - expected).abs() < 1e-9,
            "{} at {:?}: expected {}, got {}",
            expr,
            row,
            expected,
            value
        );
    }

    fn q() -> ExpressionNode {
        comp_param("c", "q")
    }

    #[test]
    fn test_elementary_operations() {
        let row = RowIndex::new(0, 0);
        assert_resolves(param("p"), row, 1.0);
        assert_resolves(q(), row, 2.0);
        assert_resolves(-q(), row, -2.0);
        assert_resolves((param("p") + q()).expect("add"), row, 3.0);
        assert_resolves((param("p") - q()).expect("sub"), row, -1.0);
        assert_resolves((param("p") * 2.0).expect("mul"), row, 2.0);
        assert_resolves((param("p") / 2.0).expect("div"), row, 0.5);
    }

    #[test]
    fn test_time_shift_and_sum() {
        assert_resolves(param("p").shift(2).sum(), RowIndex::new(0, 0), 3.0);
        assert_resolves(param("p").shift(-1).sum(), RowIndex::new(2, 1), 5.0);
        assert_resolves(literal(0.0).shift(-1).sum(), RowIndex::new(0, 0), 0.0);
        assert_resolves(param("p").eval(2).sum(), RowIndex::new(0, 0), 3.0);
        assert_resolves(param("p").eval(2).sum(), RowIndex::new(2, 0), 3.0);
        assert_resolves(param("p").shift(0..=3).sum(), RowIndex::new(0, 0), 13.0);
        assert_resolves(param("p").eval(1..=2).sum(), RowIndex::new(0, 0), 5.0);
        assert_resolves(
            param("p").eval(ExpressionRange::new(0, 3).with_step(2)).sum(),
            RowIndex::new(0, 0),
            4.0,
        );
        assert_resolves(param("p").shift(q()).sum(), RowIndex::new(1, 0), 7.0);
        assert_resolves(param("p").shift(q()).sum(), RowIndex::new(1, 1), 6.0);
        assert_resolves(param("p").sum(), RowIndex::new(0, 0), 13.0);
        assert_resolves(param("p").sum(), RowIndex::new(2, 1), 23.0);
        assert_resolves(q().sum(), RowIndex::new(0, 0), 8.0);
    }

    #[test]
    fn test_expectation() {
        assert_resolves(param("p").expec(), RowIndex::new(0, 0), 2.5);
        assert_resolves(param("p").expec(), RowIndex::new(1, 1), 3.5);
        assert_resolves(q().expec(), RowIndex::new(1, 1), 1.5);
    }

    #[test]
    fn test_sum_and_expectation_commute() {
        assert_resolves(param("p").expec().sum(), RowIndex::new(0, 0), 18.0);
        assert_resolves(param("p").sum().expec(), RowIndex::new(0, 0), 18.0);
        assert_resolves(
            param("p").shift(q()).sum().expec(),
            RowIndex::new(1, 0),
            6.5,
        );
        assert_resolves(
            param("p").expec().shift(q()).sum(),
            RowIndex::new(1, 0),
            7.5,
        );
        assert_resolves(
            param("p").shift(q()).expec().sum(),
            RowIndex::new(1, 0),
            6.5,
        );
    }

    #[test]
    fn test_constant_resolves_identically_on_every_row() {
        let tripled = (q() * 3.0).expect("mul");
        let expr = ((tripled + 1.0).expect("add") / 2.0).expect("div");
        let provider = TestValues::new();
        let first = resolve_coefficient(&expr, &provider, RowIndex::new(0, 0)).expect("resolves");
        for time in 0..4 {
            let value =
                resolve_coefficient(&expr, &provider, RowIndex::new(time, 0)).expect("resolves");
            assert_eq!(value, first);
        }
    }

    #[test]
    fn test_missing_sum_is_reported() {
        for expr in [
            param("p").shift(2),
            param("p").eval(2),
            param("p").shift(q()),
        ] {
            let err = resolve_coefficient(&expr, &TestValues::new(), RowIndex::new(0, 0))
                .unwrap_err();
            assert!(
                err.to_string().contains("maybe you are missing a sum()"),
                "unexpected error {}",
                err
            );
        }
    }

    #[test]
    fn test_multiple_time_steps_without_sum_rejected() {
        for expr in [param("p").shift(vec![1, 2]), param("p").eval(vec![1, 2])] {
            let err = resolve_coefficient(&expr, &TestValues::new(), RowIndex::new(0, 0))
                .unwrap_err();
            assert!(err.to_string().contains("cannot be reduced to a float value"));
        }
    }

    #[test]
    fn test_time_varying_instance_index_rejected() {
        let provider = TestValues {
            constant_over_time: false,
        };
        for expr in [param("p").eval(q()), param("p").shift(param("q"))] {
            let err = resolve_coefficient(&expr, &provider, RowIndex::new(0, 0)).unwrap_err();
            assert!(err
                .to_string()
                .contains("must be constant over time"));
        }
    }

    #[test]
    fn test_non_integer_time_index_rejected() {
        let expr = param("p").shift(literal(0.5)).sum();
        assert!(resolve_coefficient(&expr, &TestValues::new(), RowIndex::new(0, 0)).is_err());
    }

    #[test]
    fn test_unsupported_nodes() {
        let port = ExpressionNode::PortField {
            port_name: "port".into(),
            field_name: "field".into(),
        };
        let err = resolve_coefficient(&port, &TestValues::new(), RowIndex::default()).unwrap_err();
        assert!(err.to_string().contains("Port fields must be resolved"));

        let aggregated = ExpressionNode::PortFieldAggregator {
            operand: Arc::new(port),
            aggregator: PortFieldAggregatorName::PortSum,
        };
        assert!(resolve_coefficient(&aggregated, &TestValues::new(), RowIndex::default()).is_err());

        let comparison = literal(0.0).eq_(param("p"));
        let err =
            resolve_coefficient(&comparison, &TestValues::new(), RowIndex::default()).unwrap_err();
        assert!(err.to_string().contains("Cannot evaluate comparison operator."));

        let variance = param("p").variance();
        assert!(matches!(
            resolve_coefficient(&variance, &TestValues::new(), RowIndex::default()),
            Err(EsmError::Degree(_))
        ));
    }

    #[test]
    fn test_division_by_zero_reported() {
        let expr = (param("p") / literal(0.0)).expect("division node");
        assert!(matches!(
            resolve_coefficient(&expr, &TestValues::new(), RowIndex::default()),
            Err(EsmError::ZeroDivision(_))
        ));
    }
}
