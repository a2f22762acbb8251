pub mod face_normalizer;
