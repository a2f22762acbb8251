pub mod algorithm;
pub mod classifier_model;
pub mod prediction;
