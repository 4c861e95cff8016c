//! # Batch Module
//!
//! Modulo che separa le responsabilità della pipeline in sottomoduli:
//! - `task`: unità di lavoro ed esito per file
//! - `partition`: suddivisione statica del listing in K partizioni
//! - `action`: trait comune a upload e resize
//! - `runner`: orchestratore per directory (listing → partizioni → catene)
//! - `profiles`: esecuzione di uno o tutti i profili configurati

pub mod action;
pub mod partition;
pub mod profiles;
pub mod runner;
pub mod task;

pub use action::ActionExecutor;
pub use partition::partition;
pub use profiles::{Action, ProfileSelector};
pub use runner::{BatchOptions, BatchRunner};
pub use task::{FileTask, TaskOutcome};
