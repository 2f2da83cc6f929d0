//! Dense ordering of sibling lists (experiments, deployments, comparisons).

mod list;
mod service;

pub use list::PositionList;
pub use service::PositionService;
