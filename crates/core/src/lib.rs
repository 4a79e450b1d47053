//! brms-core: data model and pure algorithms of the rules workbench.
//!
//! Covers the declared schema of a rule ([`RuleMap`]), the editable
//! [`SimulationContext`], persisted [`Scenario`]s, structural result diffs,
//! field inference from JDM decision graphs, misconnected-field detection
//! and CSV conversion for batch tests.
//!
//! Nothing in this crate performs I/O. The HTTP collaborators live in
//! `brms-api`; session orchestration lives in `brms-workbench`.

pub mod batch_csv;
pub mod context;
pub mod diff;
pub mod error;
pub mod graph;
pub mod misconnect;
pub mod rulemap;
pub mod scenario;
pub mod value;

pub use context::{build_context, reseed_expected, SimulationContext, RESERVED_KEYS};
pub use diff::{values_equal, FieldDiff, ResultDiff};
pub use error::CoreError;
pub use graph::DecisionGraph;
pub use misconnect::{find_misconnections, MisconnectedField, MisconnectionKind};
pub use rulemap::{RuleField, RuleMap};
pub use scenario::{Scenario, Variable};
pub use value::ValueKind;
