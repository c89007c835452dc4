//! quizgrade-core: quiz lifecycle, grading pipeline, and score rollups.
//!
//! This crate defines the data model, the store and model-client seams, and
//! every scoring algorithm: question selection, deterministic grading of
//! objective answers, the model-assisted subjective pipeline, per-session
//! aggregation, and module/course rollups over the score log.

pub mod aggregation;
pub mod bank;
pub mod engine;
pub mod error;
pub mod model;
pub mod objective;
pub mod parser;
pub mod results;
pub mod rollup;
pub mod selection;
pub mod store;
pub mod subjective;
pub mod traits;
