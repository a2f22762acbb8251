pub mod cascade;
pub mod cascade_detector;
pub mod integral_image;
pub mod opencv_cascade;
