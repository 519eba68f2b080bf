//! CLI command implementations

pub mod preflight;
pub mod run;
pub mod status;
