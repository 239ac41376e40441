//! Post-processing of model output: exercise extraction, tutorial links and
//! risk/effectiveness scoring.

pub mod catalog;
pub mod risk;

pub use catalog::ExerciseCatalog;
pub use risk::Assessment;
