//! Offer/answer ordering and early-candidate buffering.
pub mod candidate_buffer;
pub mod negotiator;

pub use candidate_buffer::CandidateBuffer;
pub use negotiator::{CandidateOutcome, SessionDescriptionNegotiator};
