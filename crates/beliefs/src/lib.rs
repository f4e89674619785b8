pub mod ppc;
pub mod service;

pub use ppc::{BeliefSystemMetrics, DEFAULT_CONFIDENCE_SCORE, DEFAULT_EMOTION_INTENSITY};
pub use service::{BELIEF_SYSTEM_KEY, BeliefService};
