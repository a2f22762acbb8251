pub mod classifier_cache;
pub mod classifier_trainer;
pub mod eigen_faces;
pub mod fisher_faces;
pub mod lbph;
pub mod linalg;
pub mod subspace;
pub mod training_corpus;
