// Topic-gap and similarity engine.
//
// Pure, synchronous computation over in-memory data: no I/O, no shared
// mutable state. Callers load vector files and store rows, hand them over as
// plain structures, and get ranked results back.
//
//   normalize -> aggregate -> { gap ranking, similarity ranking }
//
// with the key reconciler bridging differently-labeled sources.

pub mod aggregate;
pub mod error;
pub mod gap;
pub mod normalize;
pub mod reconcile;
pub mod region;
pub mod similarity;
pub mod topics;
pub mod vector_set;

pub use error::{EngineError, Result};
pub use gap::{top_gap_topics, GapRanker, GapRecord, GapSource, GapTable};
pub use normalize::{normalize, normalize_json, RawVectorInput};
pub use reconcile::{EditDistance, KeyReconciler, LabelMatcher, TokenOverlap};
pub use region::{calculate_gap, RegionAggregate, TopicScores};
pub use similarity::{
    cosine_similarity, rank_policies, rank_similar, rank_similar_regions, PolicyDocument,
    SimilarityResult,
};
pub use topics::{aliases_for, CanonicalTopic};
pub use vector_set::{TopicVector, VectorSet};
