//! Deterministic topological ordering and template flattening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::adjacency::Adjacency;
use crate::core::{Operator, Scope, Status};
use crate::errors::{ValidationError, ValidationErrorKind};

/// Orders operators so that every operator follows its dependencies.
///
/// Repeatedly picks a ready operator (all dependencies already ordered);
/// ties are broken by creation time, then by input position, so the output
/// is identical across runs. Dependencies on ids outside `operators` are
/// ignored.
///
/// # Errors
///
/// Returns a [`ValidationErrorKind::CyclicDependency`] error if the
/// operators contain a cycle.
pub fn topological_order(operators: &[Operator]) -> Result<Vec<Uuid>, ValidationError> {
    let adjacency = Adjacency::build(operators, None);
    let n = adjacency.len();

    let mut remaining: Vec<usize> = (0..n).map(|i| adjacency.dependencies_of(i).len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for &dep in adjacency.dependencies_of(i) {
            dependents[dep].push(i);
        }
    }

    let key = |i: usize| -> (DateTime<Utc>, usize) { (operators[i].created_at, i) };
    let mut ready: BTreeSet<(DateTime<Utc>, usize)> =
        (0..n).filter(|&i| remaining[i] == 0).map(key).collect();

    let mut order = Vec::with_capacity(n);
    while let Some((_, next)) = ready.pop_first() {
        order.push(adjacency.id(next));
        for &child in &dependents[next] {
            remaining[child] -= 1;
            if remaining[child] == 0 {
                ready.insert(key(child));
            }
        }
    }

    if order.len() != n {
        let cycle = adjacency.find_cycle().unwrap_or_default();
        let operator_id = cycle.first().copied().unwrap_or_else(Uuid::nil);
        return Err(ValidationError::new(
            ValidationErrorKind::CyclicDependency,
            operator_id,
            cycle,
        ));
    }

    Ok(order)
}

/// One operator of a flattened template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTask {
    /// The task to instantiate.
    pub task_id: Uuid,
    /// Indices (into the template) of the tasks this one depends on.
    pub dependencies: Vec<usize>,
    /// Parameter values to copy.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Canvas x coordinate.
    pub canvas_x: Option<f64>,
    /// Canvas y coordinate.
    pub canvas_y: Option<f64>,
}

/// Flattens a scope's operators into a topologically ordered template.
///
/// Operator ids are replaced by positions so the template can be
/// instantiated with fresh ids elsewhere.
///
/// # Errors
///
/// Returns an error if the operators contain a cycle.
pub fn flatten_template(operators: &[Operator]) -> Result<Vec<TemplateTask>, ValidationError> {
    let order = topological_order(operators)?;
    let position = |id: &Uuid| order.iter().position(|o| o == id);

    Ok(order
        .iter()
        .filter_map(|id| operators.iter().find(|op| op.id == *id))
        .map(|op| TemplateTask {
            task_id: op.task_id,
            dependencies: op.dependencies.iter().filter_map(position).collect(),
            parameters: op.parameters.clone(),
            canvas_x: op.canvas_x,
            canvas_y: op.canvas_y,
        })
        .collect())
}

/// Creates operators under `scope` from a flattened template.
///
/// `next_id` supplies the id of each new operator, in template order.
/// Creation times increase with template order so the new operators
/// order the same way the template does.
#[must_use]
pub fn instantiate_template(
    template: &[TemplateTask],
    scope: Scope,
    mut next_id: impl FnMut() -> Uuid,
) -> Vec<Operator> {
    let ids: Vec<Uuid> = template.iter().map(|_| next_id()).collect();
    let base = Utc::now();

    template
        .iter()
        .zip(&ids)
        .enumerate()
        .map(|(i, (task, id))| {
            let created_at = base + chrono::Duration::microseconds(i64::try_from(i).unwrap_or(i64::MAX));
            let mut op = Operator::new(*id, scope, task.task_id)
                .with_dependencies(task.dependencies.iter().filter_map(|d| ids.get(*d).copied()))
                .with_created_at(created_at);
            op.parameters = task.parameters.clone();
            op.canvas_x = task.canvas_x;
            op.canvas_y = task.canvas_y;
            op.status = Status::Unset;
            op
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn op(id: Uuid, created: i64, deps: &[Uuid]) -> Operator {
        Operator::new(id, Scope::Experiment(Uuid::nil()), Uuid::new_v4())
            .with_dependencies(deps.iter().copied())
            .with_created_at(at(created))
    }

    #[test]
    fn test_chain_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ops = vec![op(c, 2, &[a, b]), op(b, 1, &[a]), op(a, 0, &[])];

        assert_eq!(topological_order(&ops).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_ties_broken_by_creation_time() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // Three independent roots: creation time decides, not input order.
        let ops = vec![op(c, 30, &[]), op(a, 10, &[]), op(b, 20, &[])];

        assert_eq!(topological_order(&ops).unwrap(), vec![a, b, c]);
        let mut reversed = ops.clone();
        reversed.reverse();
        assert_eq!(topological_order(&reversed).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let ops = vec![op(a, 0, &[b]), op(b, 1, &[a])];

        let err = topological_order(&ops).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::CyclicDependency);
    }

    #[test]
    fn test_flatten_and_instantiate() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ops = vec![
            op(b, 1, &[a]).with_parameter("k", serde_json::json!(3)),
            op(a, 0, &[]),
            op(c, 2, &[a, b]),
        ];

        let template = flatten_template(&ops).unwrap();
        assert_eq!(template.len(), 3);
        assert_eq!(template[0].dependencies, Vec::<usize>::new());
        assert_eq!(template[1].dependencies, vec![0]);
        assert_eq!(template[2].dependencies, vec![0, 1]);
        assert_eq!(template[1].parameters.get("k"), Some(&serde_json::json!(3)));

        let scope = Scope::Experiment(Uuid::new_v4());
        let created = instantiate_template(&template, scope, Uuid::new_v4);
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|o| o.scope == scope));
        assert_eq!(created[2].dependencies, vec![created[0].id, created[1].id]);
        assert_eq!(
            topological_order(&created).unwrap(),
            created.iter().map(|o| o.id).collect::<Vec<_>>()
        );
    }
}
