/// A decoded image: contiguous 8-bit samples in row-major order.
///
/// Records carry encoded bytes; a `Frame` only exists while a stage is
/// working on pixels. One channel means luma, three means RGB.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Single-channel frame filled with one intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(
            vec![value; (width as usize) * (height as usize)],
            width,
            height,
            1,
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2 RGB
        let frame = Frame::new(data.clone(), 2, 2, 3);
        assert_eq!((frame.width(), frame.height(), frame.channels()), (2, 2, 3));
        assert_eq!(frame.data(), &data[..]);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_filled_is_single_channel() {
        let frame = Frame::filled(4, 3, 7);
        assert_eq!(frame.channels(), 1);
        assert_eq!(frame.data().len(), 12);
        assert!(frame.data().iter().all(|&v| v == 7));
    }

    #[test]
    fn test_zero_sized_frame_is_empty() {
        assert!(Frame::filled(0, 5, 0).is_empty());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3);
    }
}
