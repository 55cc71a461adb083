//! Exact linear programming used to assign flow counts to graph paths

pub mod equations;
pub mod simplex;

pub use equations::EquationSystem;
pub use simplex::{Simplex, SimplexError};
