// ==========================================
// Rake Formation DSS - Service Layer
// ==========================================
// Long-running orchestration around the engines: the periodic
// recommendation evaluation cycle.
// ==========================================

pub mod evaluation;

pub use evaluation::{
    EvaluationHandle, EvaluationReport, EvaluationService, NoOpSink, RecommendationSink, StoreSink,
};
