pub mod generation;
pub mod providers;

pub use generation::{GenerationError, GenerationService};
