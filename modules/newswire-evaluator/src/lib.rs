pub mod evaluator;
pub mod prompt;
pub mod validate;

pub use evaluator::{export_prompt, ChatBackend, EvalParams, EvalStats, Evaluator};
