//! Fusion, routing and answer composition on top of the vector indices.

pub mod answer;
pub mod context;
pub mod fusion;
pub mod router;

pub use answer::{Answer, AnswerComposer, DEFAULT_QUESTION};
pub use context::{EvidenceContext, RetrievedItem, NO_CONTEXT};
pub use fusion::{RrfFusion, DEFAULT_K_RRF};
pub use router::{collect_evidence, Identification, QueryRouter, RouterSettings};
