//! Record lineage model: frames, faces derived from them, and the
//! append-only event attributes each stage stamps on the way through.

pub mod attributes;
pub mod face_record;
pub mod frame_record;
pub mod record_id;
