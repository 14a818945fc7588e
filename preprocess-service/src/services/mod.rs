pub mod normalizer;

pub use normalizer::preprocess;
