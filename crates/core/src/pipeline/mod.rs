//! Stage wiring: the four record-to-record stages, the runner that moves
//! records between them, and the builder that assembles both from settings.

pub mod capture_stage;
pub mod detection_stage;
pub mod infrastructure;
pub mod intermediate_results;
pub mod normalization_stage;
pub mod pipeline_builder;
pub mod pipeline_logger;
pub mod pipeline_runner;
pub mod recognition_stage;
pub mod stage_error;

#[cfg(test)]
pub(crate) mod test_support;
