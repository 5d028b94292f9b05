pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod lister;
pub mod model;
pub mod p4;
pub mod platform;
pub mod process;
pub mod progress;
pub mod reconcile;
pub mod staging;

pub use config::AppConfig;
pub use engine::{Harmonizer, RunSummary};
pub use error::{Error, PathError, PathErrorKind};
pub use model::{FileEntry, Inventory, Side};
pub use progress::{ProgressReporter, SilentReporter};
