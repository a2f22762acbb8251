use std::sync::Arc;

use crate::record::attributes::{AttributeError, Attributes, CAPTURE};
use crate::record::frame_record::FrameRecord;
use crate::record::record_id::RecordId;
use crate::shared::region::Region;

/// A detected face and its lineage.
///
/// `parent_id` names the record the face was cut from and `bbox` is in that
/// parent's pixel space. Transforms replace the payload but keep id, parent
/// and bbox verbatim, appending exactly one attribute each.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRecord {
    id: RecordId,
    parent_id: RecordId,
    bbox: Region,
    payload: Arc<[u8]>,
    attributes: Attributes,
}

impl FaceRecord {
    /// Child of a captured frame.
    ///
    /// Inherits the frame's `capture` timestamp, then records `event` at
    /// `timestamp`.
    pub fn from_frame(
        frame: &FrameRecord,
        bbox: Region,
        payload: Vec<u8>,
        event: &str,
        timestamp: u64,
    ) -> Result<Self, AttributeError> {
        let mut attributes = Attributes::new();
        attributes.insert(CAPTURE, frame.created_at())?;
        attributes.insert(event, timestamp)?;
        Ok(Self {
            id: RecordId::new(),
            parent_id: frame.id(),
            bbox,
            payload: payload.into(),
            attributes,
        })
    }

    /// Child of this face, e.g. a sub-region found inside it.
    ///
    /// `bbox` must be expressed in this face's own pixel space. All
    /// attributes recorded so far are carried over before `event` is added.
    pub fn derive(
        &self,
        bbox: Region,
        payload: Vec<u8>,
        event: &str,
        timestamp: u64,
    ) -> Result<Self, AttributeError> {
        let mut attributes = self.attributes.clone();
        attributes.insert(event, timestamp)?;
        Ok(Self {
            id: RecordId::new(),
            parent_id: self.id,
            bbox,
            payload: payload.into(),
            attributes,
        })
    }

    /// Same record with a new payload, e.g. after normalization.
    pub fn with_payload(
        mut self,
        payload: Vec<u8>,
        event: &str,
        timestamp: u64,
    ) -> Result<Self, AttributeError> {
        self.attributes.insert(event, timestamp)?;
        self.payload = payload.into();
        Ok(self)
    }

    /// Same record and payload with one more event.
    pub fn with_event(mut self, event: &str, timestamp: u64) -> Result<Self, AttributeError> {
        self.attributes.insert(event, timestamp)?;
        Ok(self)
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn parent_id(&self) -> RecordId {
        self.parent_id
    }

    pub fn bbox(&self) -> Region {
        self.bbox
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::attributes::{DETECT, NORMALIZE, RECOGNISE};

    fn frame() -> FrameRecord {
        FrameRecord::new(vec![0xAA], 1000)
    }

    #[test]
    fn test_from_frame_links_parent_and_inherits_capture() {
        let frame = frame();
        let face = FaceRecord::from_frame(&frame, Region::new(1, 2, 3, 4), vec![1], DETECT, 1450)
            .unwrap();
        assert_eq!(face.parent_id(), frame.id());
        assert_ne!(face.id(), frame.id());
        assert_eq!(face.bbox(), Region::new(1, 2, 3, 4));
        assert_eq!(face.attributes().get(CAPTURE), Some(1000));
        assert_eq!(face.attributes().get(DETECT), Some(1450));
    }

    #[test]
    fn test_with_payload_preserves_lineage() {
        let frame = frame();
        let face = FaceRecord::from_frame(&frame, Region::new(0, 0, 5, 5), vec![1], DETECT, 1)
            .unwrap();
        let (id, parent, bbox) = (face.id(), face.parent_id(), face.bbox());

        let normalized = face.with_payload(vec![9, 9], NORMALIZE, 2).unwrap();
        assert_eq!(normalized.id(), id);
        assert_eq!(normalized.parent_id(), parent);
        assert_eq!(normalized.bbox(), bbox);
        assert_eq!(normalized.payload(), &[9, 9]);
        assert_eq!(normalized.attributes().len(), 3);
    }

    #[test]
    fn test_each_stage_adds_one_key() {
        let face = FaceRecord::from_frame(&frame(), Region::new(0, 0, 5, 5), vec![], DETECT, 1)
            .unwrap();
        let before = face.attributes().len();
        let after = face.with_event(RECOGNISE, 3).unwrap();
        assert_eq!(after.attributes().len(), before + 1);
    }

    #[test]
    fn test_repeated_stage_is_rejected() {
        let face = FaceRecord::from_frame(&frame(), Region::new(0, 0, 5, 5), vec![], DETECT, 1)
            .unwrap();
        assert!(face.with_event(DETECT, 2).is_err());
    }

    #[test]
    fn test_lineage_chain_through_derived_face() {
        let frame = frame();
        let face = FaceRecord::from_frame(&frame, Region::new(10, 10, 40, 40), vec![], DETECT, 1)
            .unwrap();
        let eye = face
            .derive(Region::new(5, 8, 10, 6), vec![], "eye", 2)
            .unwrap();
        assert_eq!(eye.parent_id(), face.id());
        assert_eq!(face.parent_id(), frame.id());
        assert_eq!(eye.bbox(), Region::new(5, 8, 10, 6));
        assert_eq!(eye.attributes().get(CAPTURE), Some(1000));
    }
}
