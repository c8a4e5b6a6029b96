// Source extraction and panel output

pub mod error;
pub mod extract;
pub mod fips;
pub mod sources;
pub mod table;
pub mod writer;

pub use error::LoadError;
pub use fips::FipsDirectory;
pub use sources::{load_sources, InputFingerprint, LoadedSources, SourceFailure, SourceSummary};
pub use writer::{write_panel_csv, write_report, RunReport};
