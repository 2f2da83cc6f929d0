//! Assertions for store state.

use crate::core::{Operator, OrderedItem, Status};

/// Asserts that positions are exactly `0..len` in slice order.
pub fn assert_dense_positions(items: &[OrderedItem]) {
    let positions: Vec<usize> = items.iter().map(|item| item.position).collect();
    let expected: Vec<usize> = (0..items.len()).collect();
    assert_eq!(positions, expected, "Expected dense positions, got {positions:?}");
}

/// Asserts that exactly one item is active, and that it is `expected`.
pub fn assert_active(items: &[OrderedItem], expected: uuid::Uuid) {
    let active: Vec<_> = items.iter().filter(|item| item.is_active).map(|item| item.id).collect();
    assert_eq!(active, vec![expected], "Expected {expected} to be the only active item");
}

/// Asserts an operator's status and message.
pub fn assert_operator_status(operator: &Operator, status: Status, message: Option<&str>) {
    assert_eq!(
        (&operator.status, operator.status_message.as_deref()),
        (&status, message),
        "Unexpected status for operator {}",
        operator.id
    );
}
