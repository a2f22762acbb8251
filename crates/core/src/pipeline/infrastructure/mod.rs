pub mod threaded_pipeline_runner;
