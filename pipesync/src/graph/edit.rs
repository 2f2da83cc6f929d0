//! Structural edits over a scope's operators.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::core::Operator;
use crate::errors::GraphError;

/// Drops `removed` from every sibling's dependency list.
///
/// Returns only the siblings that changed, ready for a bulk upsert. The
/// removed operator itself is not included.
#[must_use]
pub fn detach_dependency(siblings: &[Operator], removed: Uuid) -> Vec<Operator> {
    let now = Utc::now();
    siblings
        .iter()
        .filter(|op| op.id != removed && op.dependencies.contains(&removed))
        .map(|op| {
            let mut patched = op.clone();
            patched.dependencies.retain(|d| *d != removed);
            patched.updated_at = now;
            patched
        })
        .collect()
}

/// Keeps the operators that can run in a deployment and strips the dropped
/// ones from the remaining dependency lists.
#[must_use]
pub fn select_deployable<F>(operators: &[Operator], is_deployable: F) -> Vec<Operator>
where
    F: Fn(&Operator) -> bool,
{
    let (keep, drop): (Vec<&Operator>, Vec<&Operator>) =
        operators.iter().partition(|op| is_deployable(op));
    let dropped: HashSet<Uuid> = drop.iter().map(|op| op.id).collect();

    keep.into_iter()
        .map(|op| {
            let mut op = op.clone();
            op.dependencies.retain(|d| !dropped.contains(d));
            op
        })
        .collect()
}

/// Returns the inference chain of a deployment, root first.
///
/// A deployment graph must have exactly one root and every operator may feed
/// at most one downstream operator.
///
/// # Errors
///
/// Returns a [`GraphError`] when the graph is not a single chain.
pub fn deployment_chain(operators: &[Operator]) -> Result<Vec<Uuid>, GraphError> {
    let roots: Vec<Uuid> = operators.iter().filter(|op| op.is_root()).map(|op| op.id).collect();
    let root = match roots.as_slice() {
        [] => return Err(GraphError::NoRoot),
        [root] => *root,
        _ => return Err(GraphError::MultipleRoots(roots)),
    };

    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for op in operators {
        for dep in &op.dependencies {
            children.entry(*dep).or_default().push(op.id);
        }
    }

    let mut chain = vec![root];
    let mut current = root;
    loop {
        match children.get(&current).map(Vec::as_slice) {
            None | Some([]) => break,
            Some([next]) => {
                if chain.contains(next) {
                    return Err(GraphError::NoRoot);
                }
                chain.push(*next);
                current = *next;
            }
            Some(_) => return Err(GraphError::Branching(current)),
        }
    }

    if chain.len() != operators.len() {
        let reached: HashSet<Uuid> = chain.iter().copied().collect();
        let unreachable = operators
            .iter()
            .map(|op| op.id)
            .filter(|id| !reached.contains(id))
            .collect();
        return Err(GraphError::Unreachable(unreachable));
    }

    Ok(chain)
}
