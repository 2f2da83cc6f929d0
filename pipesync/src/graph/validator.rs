//! Validation of proposed dependency edits.
//!
//! Validation is side-effect-free so callers can check speculative edits
//! before committing them.

use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::adjacency::Adjacency;
use crate::core::{Operator, Scope};
use crate::errors::{ValidationError, ValidationErrorKind};

/// Validates `proposed` as the new dependency list of `candidate_id`.
///
/// `siblings` are the operators currently stored under `scope`; the candidate
/// may or may not be among them. Operators of other scopes are ignored, so
/// dependencies on them are reported as unknown.
///
/// Checks run in order: duplicates, self-reference, unknown ids, cycles.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first failed check.
pub fn validate_dependencies(
    scope: Scope,
    candidate_id: Uuid,
    proposed: &[Uuid],
    siblings: &[Operator],
) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(proposed.len());
    for dep in proposed {
        if !seen.insert(*dep) {
            return Err(ValidationError::new(
                ValidationErrorKind::DuplicateDependency,
                candidate_id,
                vec![*dep],
            ));
        }
    }

    if seen.contains(&candidate_id) {
        return Err(ValidationError::new(
            ValidationErrorKind::SelfDependency,
            candidate_id,
            vec![candidate_id],
        ));
    }

    let in_scope: Vec<Operator> = siblings.iter().filter(|op| op.scope == scope).cloned().collect();
    let known: HashSet<Uuid> = in_scope.iter().map(|op| op.id).collect();
    let unknown: Vec<Uuid> = proposed.iter().filter(|d| !known.contains(d)).copied().collect();
    if !unknown.is_empty() {
        return Err(ValidationError::new(
            ValidationErrorKind::UnknownDependency,
            candidate_id,
            unknown,
        ));
    }

    let adjacency = Adjacency::build(&in_scope, Some((candidate_id, proposed)));
    if let Some(cycle) = adjacency.find_cycle() {
        debug!(%scope, operator_id = %candidate_id, ?cycle, "Rejected cyclic dependencies");
        return Err(ValidationError::new(
            ValidationErrorKind::CyclicDependency,
            candidate_id,
            cycle,
        ));
    }

    Ok(())
}

/// Validates every operator of a scope against its siblings.
///
/// Used to check the result of a speculative edit such as a deletion.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_scope(scope: Scope, operators: &[Operator]) -> Result<(), ValidationError> {
    for op in operators.iter().filter(|op| op.scope == scope) {
        validate_dependencies(scope, op.id, &op.dependencies, operators)?;
    }
    Ok(())
}
