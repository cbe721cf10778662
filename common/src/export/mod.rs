//! Export core modules shared across CLI and report writers.

pub mod bom_core;
pub mod report_core;

#[cfg(feature = "excel")]
pub mod excel_core;
