// Data models matching the frontend TypeScript types

pub mod area;
pub mod diagnostic;
pub mod interview;
pub mod session;
pub mod state_machine;

pub use area::{Area, AreaMetadata};
pub use diagnostic::{
    AreaScore, ConfidenceTier, Diagnostic, DiagnosticDraft, LeadValue, ModelAreaScore, Pattern,
    Priority, Recommendation, RoadmapPhase, RootCause, ScoreSource,
};
pub use interview::{
    Answer, ExtractionRule, Extractor, FieldValue, FollowUpQuestion, HealthRule, InputType,
    InterviewBlock, Persona, Question, SignalKind,
};
pub use session::{
    BlockCompleteness, BlockTransition, CompletionMetrics, ExpertiseResult, ExtractionGap,
    InterviewSession, ResultSource, RiskSelection, SessionContext, SessionStats, SessionStatus,
    ROLE_FIELD,
};
