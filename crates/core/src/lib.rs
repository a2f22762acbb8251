pub mod benchmark;
pub mod capture;
pub mod detection;
pub mod normalization;
pub mod pipeline;
pub mod recognition;
pub mod record;
pub mod shared;
