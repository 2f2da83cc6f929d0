//! Index-addressed adjacency over one scope's operators.

use std::collections::HashMap;
use uuid::Uuid;

use crate::core::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Dependency edges of a scope, addressed by node index.
///
/// Edges point from an operator to the operators it depends on. Edges to ids
/// outside the node set are dropped.
#[derive(Debug, Clone)]
pub(crate) struct Adjacency {
    ids: Vec<Uuid>,
    index: HashMap<Uuid, usize>,
    edges: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Builds the adjacency of `operators`, replacing the edges of
    /// `candidate` (adding it as a node if absent) when an override is given.
    pub(crate) fn build(operators: &[Operator], candidate: Option<(Uuid, &[Uuid])>) -> Self {
        let mut ids: Vec<Uuid> = operators.iter().map(|op| op.id).collect();
        if let Some((candidate_id, _)) = candidate {
            if !ids.contains(&candidate_id) {
                ids.push(candidate_id);
            }
        }

        let index: HashMap<Uuid, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut edges = vec![Vec::new(); ids.len()];

        for op in operators {
            if matches!(candidate, Some((candidate_id, _)) if candidate_id == op.id) {
                continue;
            }
            if let Some(&from) = index.get(&op.id) {
                edges[from] = op.dependencies.iter().filter_map(|d| index.get(d).copied()).collect();
            }
        }
        if let Some((candidate_id, deps)) = candidate {
            if let Some(&from) = index.get(&candidate_id) {
                edges[from] = deps.iter().filter_map(|d| index.get(d).copied()).collect();
            }
        }

        Self { ids, index, edges }
    }

    /// Number of nodes.
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    /// The id of node `i`.
    pub(crate) fn id(&self, i: usize) -> Uuid {
        self.ids[i]
    }

    /// The index of `id`, if it is a node.
    pub(crate) fn index_of(&self, id: &Uuid) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Outgoing edges (dependencies) of node `i`.
    pub(crate) fn dependencies_of(&self, i: usize) -> &[usize] {
        &self.edges[i]
    }

    /// Finds a cycle with an iterative white/gray/black depth-first search.
    ///
    /// Returns the cycle as a closed path (first id repeated at the end).
    pub(crate) fn find_cycle(&self) -> Option<Vec<Uuid>> {
        let mut color = vec![Color::White; self.ids.len()];
        // (node, index of the next edge to follow)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..self.ids.len() {
            if color[start] != Color::White {
                continue;
            }
            color[start] = Color::Gray;
            stack.push((start, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                if let Some(&dep) = self.edges[node].get(next) {
                    frame.1 += 1;
                    match color[dep] {
                        Color::White => {
                            color[dep] = Color::Gray;
                            stack.push((dep, 0));
                        }
                        Color::Gray => {
                            let from = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                            let mut cycle: Vec<Uuid> =
                                stack[from..].iter().map(|(n, _)| self.ids[*n]).collect();
                            cycle.push(self.ids[dep]);
                            return Some(cycle);
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }

        None
    }
}
