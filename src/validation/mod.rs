//! Address and circuit validation.
//!
//! Severity-graded checks for a candidate address (range, duplication,
//! lock, capacity, current) and for a circuit as a whole.

pub mod types;
pub mod circuit;
pub mod engine;

pub use types::{Severity, ValidationResult};
pub use circuit::{Circuit, CircuitContext, CircuitKind};
pub use engine::{validate_address_assignment, validate_circuit};
