// Interview core: catalog, area graph, extraction, weak signals, scoring, routing

pub mod area_graph;
pub mod catalog;
pub mod engine;
pub mod extraction;
pub mod question_bank;
pub mod router;
pub mod scoring;
pub mod signals;

pub use area_graph::AreaGraph;
pub use engine::{
    CompleteOptions, InterviewEngine, NextQuestionResponse, QuestionView, RoutingMetadata,
    SessionCreated, SubmitAnswerResponse,
};
pub use question_bank::QuestionBank;
pub use router::{BlockRouter, RouteDecision, RouteOutcome};
pub use scoring::{assess_lead_value, measure_health, CompletenessReport, Scorer};
pub use signals::{CompositeDetector, Signal, SignalContext, SignalDetector, SignalReport};
