use thiserror::Error;

pub const CAPTURE: &str = "capture";
pub const DETECT: &str = "detect";
pub const NORMALIZE: &str = "normalize";
pub const RECOGNISE: &str = "recognise";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute `{0}` is already set")]
    Duplicate(String),
}

/// Append-only, insertion-ordered map of event name to unix-ms timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, u64)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Existing events are never overwritten.
    pub fn insert(&mut self, event: &str, timestamp: u64) -> Result<(), AttributeError> {
        if self.get(event).is_some() {
            return Err(AttributeError::Duplicate(event.to_string()));
        }
        self.entries.push((event.to_string(), timestamp));
        Ok(())
    }

    pub fn get(&self, event: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(name, _)| name == event)
            .map(|&(_, ts)| ts)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, ts)| (name.as_str(), *ts))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let mut attrs = Attributes::new();
        attrs.insert(CAPTURE, 1000).unwrap();
        attrs.insert(DETECT, 1450).unwrap();
        attrs.insert(RECOGNISE, 2100).unwrap();
        let names: Vec<&str> = attrs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![CAPTURE, DETECT, RECOGNISE]);
    }

    #[test]
    fn test_duplicate_insert_rejected_and_value_kept() {
        let mut attrs = Attributes::new();
        attrs.insert(DETECT, 1).unwrap();
        assert_eq!(
            attrs.insert(DETECT, 2),
            Err(AttributeError::Duplicate(DETECT.to_string()))
        );
        assert_eq!(attrs.get(DETECT), Some(1));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_missing_event_is_none() {
        assert_eq!(Attributes::new().get(CAPTURE), None);
        assert!(Attributes::new().is_empty());
    }
}
