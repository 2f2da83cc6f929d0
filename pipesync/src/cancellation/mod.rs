//! Cooperative cancellation shared by the watch loops.

mod token;

pub use token::CancellationToken;
