pub mod face_detector;
pub mod neighbour_merger;
pub mod partition;
