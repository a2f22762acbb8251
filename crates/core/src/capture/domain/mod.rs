pub mod camera;
pub mod pacer;
