//! brms-workbench: the scenario workbench for one decision rule.
//!
//! [`ScenariosManager`] owns a session: the rule map, the saved scenarios
//! ([`ScenarioViewer`]), the editable simulation context
//! ([`ScenarioGenerator`]), bulk results ([`ResultsTable`]) and staged batch
//! changes ([`ScenarioChangeSet`]). Every remote call goes through
//! [`brms_api::RulesApi`].

pub mod batch;
pub mod csv_harness;
pub mod error;
pub mod generator;
pub mod manager;
pub mod results;
pub mod search;
pub mod upsert;
pub mod viewer;
pub mod warnings;

pub use batch::{save_all, BatchFailure, BatchReport, ChangeAction, ScenarioChangeSet};
pub use csv_harness::{import_csv, run_csv_tests, CsvTestReport};
pub use error::WorkbenchError;
pub use generator::{GeneratorState, SaveOutcome, ScenarioGenerator};
pub use manager::{ScenariosManager, Tab};
pub use results::{run_all, ResultEditor, ResultRow, ResultsTable, SortOrder};
pub use search::{FieldSearch, SEARCH_DEBOUNCE};
pub use upsert::{plan_upsert, upsert_scenario, UpsertAction};
pub use viewer::{EditSeed, RenameOutcome, ScenarioViewer, PAGE_SIZE};
pub use warnings::{detect_misconnections, WarningMonitor};
