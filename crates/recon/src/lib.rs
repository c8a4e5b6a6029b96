//! `kaitz-recon` - Multi-source economic panel reconciliation engine.
//!
//! Pure engine crate: receives decoded, key-normalized source records, returns
//! the joined panel and its coverage report. No CLI or IO dependencies.

pub mod config;
pub mod coverage;
pub mod derived;
pub mod engine;
pub mod error;
pub mod join;
pub mod keys;
pub mod labor;
pub mod model;
pub mod percentile;
pub mod policy;
pub mod sector;
pub mod shares;
pub mod sources;

pub use config::PanelConfig;
pub use coverage::CoverageReport;
pub use engine::{run, PanelResult};
pub use error::PanelError;
pub use keys::{GeoKey, Grain, IndustryCode, Taxonomy, TimeKey};
pub use model::{Frame, MeasureRecord, Panel, SourceTable, Value};
pub use sources::{PanelInputs, WageInput};
