pub mod clock;
pub mod constants;
pub mod frame;
pub mod image_convert;
pub mod image_writer;
pub mod region;
pub mod settings;
