//! IV curve handling for module QC
//!
//! - [`file`]: two-column IV text files and names derived from them
//! - [`curve`]: curves, labels and axis ranges
//! - [`colors`]: tab20 map and the study palette
//! - [`plot`]: PNG rendering with plotters
//! - [`study`]: IV curves of one module across measurement conditions

pub mod colors;
pub mod curve;
pub mod error;
pub mod file;
pub mod plot;
pub mod study;

pub use curve::{CurveIssue, CurveOrigin, IvCurve};
pub use error::{IvError, IvResult};
pub use plot::{IvPlot, Marker, Series, YScale};
