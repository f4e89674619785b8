pub mod belief;
pub mod dialectic;
pub mod error;
pub mod ids;
pub mod ppc;
pub mod selfmodel;

pub use belief::{Belief, BeliefSystem, BeliefType, CausalBelief, EpistemicContext};
pub use dialectic::{
    Agent, AgentType, Dialectic, DialecticEvent, DialecticType, DialecticalInteraction,
    InteractionData, InteractionEvent, InteractionStatus, LearningObjective, Question, UserAnswer,
    now_millis,
};
pub use error::{Error, Result};
pub use ppc::{
    BeliefContext, ConfidenceRating, EpistemicEmotion, ObservationContext,
    PredictiveProcessingContext, ObservationState,
};
pub use selfmodel::{Developer, Philosophy, SelfModel};
