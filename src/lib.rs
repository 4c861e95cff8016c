//! # s3img Library
//!
//! Modulo principale della libreria: resize di set di immagini per profilo
//! e upload dei set su un bucket compatibile S3.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi principali tramite re-exports per il main.rs
//!
//! ## Architettura dei moduli:
//! - `config`: configurazione JSON, profili e definizioni di dimensione
//! - `error`: tipi di errore della pipeline
//! - `file_manager`: listing delle directory e utility sui nomi file
//! - `template`: sostituzione dei placeholder `%name%` e costruzione argv
//! - `platform`: esecuzione dei tool esterni
//! - `object_store`: client S3 (HTTP firmato e in memoria)
//! - `existence`: verifica se il risultato di un task esiste già
//! - `batch`: partizionamento, catene di esecuzione e profili
//! - `upload` / `resize`: le due azioni per file
//! - `progress`: progress bar e report finale
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use s3img::batch::profiles::run_profiles;
//! use s3img::platform::SystemCommandRunner;
//! use s3img::{Action, Config, ProfileSelector};
//! use std::sync::Arc;
//!
//! # async fn demo() -> s3img::Result<()> {
//! let config = Config::from_file("sets.json".as_ref()).await?;
//! let action = Action::Resize { runner: Arc::new(SystemCommandRunner) };
//! let reports = run_profiles(&config, &ProfileSelector::All, &action, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod existence;
pub mod file_manager;
pub mod object_store;
pub mod platform;
pub mod progress;
pub mod resize;
pub mod template;
pub mod upload;
pub mod utils;

pub use batch::{Action, BatchOptions, BatchRunner, ProfileSelector};
pub use config::Config;
pub use error::{BatchError, Result};
pub use progress::BatchReport;
