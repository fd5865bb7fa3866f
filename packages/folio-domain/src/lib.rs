pub mod model;
pub mod text;

pub use model::{Chunk, FusedResult, RetrievalOutcome, ScoredCandidate, SourceKind};
