pub mod epistemology;
pub mod service;

pub use epistemology::{
    DialecticResponse, DialecticalEpistemology, EpistemicResponse, Epistemology,
    PerspectiveTakingEpistemology,
};
pub use service::{DialecticService, UpdateDialecticInput};
