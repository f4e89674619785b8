pub mod extrapolate;
pub mod service;

pub use extrapolate::extrapolate_observation_contexts;
pub use service::{PHILOSOPHY_KEY, SELF_MODEL_KEY, SelfModelService};
