//! Client side of the decision-engine service.
//!
//! [`RulesApi`] is the seam between the workbench and the remote service.
//! [`HttpRulesApi`] talks HTTP/JSON; [`InMemoryRulesApi`] keeps everything in
//! process and is used for offline runs and tests.

mod error;
mod http;
mod memory;
mod record;
mod traits;

pub use error::{ApiError, MULTIPLE_RESULTS_MESSAGE};
pub use http::{HttpConfig, HttpRulesApi};
pub use memory::{ApiCall, Evaluator, InMemoryRulesApi, Operation};
pub use record::{
    validate_decision_runs, validate_result, DecisionRun, EvaluateRequest, EvaluateResponse,
    GenerateRuleMapRequest, RawDecisionRun, RuleDocument, RuleMapRequest, RunDecisionsRequest,
    SimulationResult,
};
pub use traits::RulesApi;
