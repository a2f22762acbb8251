use image::GrayImage;

/// Summed-area tables over pixel values and squared pixel values.
///
/// Both tables have one extra leading row and column of zeros, so any
/// rectangle sum is four lookups.
pub struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq_sum = vec![0.0; stride * (h + 1)];
        let raw = gray.as_raw();

        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = raw[y * w + x] as f64;
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sq_sum[i] = sq_sum[i - stride] + row_sq;
            }
        }

        Self {
            width: w,
            height: h,
            sum,
            sq_sum,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of pixels in `[x, x+w) x [y, y+h)`. The rectangle must be in bounds.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        Self::lookup(&self.sum, self.width + 1, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        Self::lookup(&self.sq_sum, self.width + 1, x, y, w, h)
    }

    fn lookup(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let a = table[y * stride + x];
        let b = table[y * stride + x + w];
        let c = table[(y + h) * stride + x];
        let d = table[(y + h) * stride + x + w];
        d - b - c + a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| image::Luma([(x + y * w) as u8]))
    }

    #[test]
    fn test_full_sum_matches_naive() {
        let img = ramp(5, 4);
        let ii = IntegralImage::new(&img);
        let naive: f64 = img.as_raw().iter().map(|&v| v as f64).sum();
        assert_relative_eq!(ii.rect_sum(0, 0, 5, 4), naive);
    }

    #[test]
    fn test_inner_rect_sum() {
        let img = ramp(5, 4);
        let ii = IntegralImage::new(&img);
        // rows 1..3, cols 2..4: (7 + 8) + (12 + 13)
        assert_relative_eq!(ii.rect_sum(2, 1, 2, 2), 40.0);
        assert_relative_eq!(ii.rect_sq_sum(2, 1, 2, 2), 49.0 + 64.0 + 144.0 + 169.0);
    }

    #[test]
    fn test_single_pixel() {
        let img = ramp(3, 3);
        let ii = IntegralImage::new(&img);
        assert_relative_eq!(ii.rect_sum(2, 2, 1, 1), 8.0);
        assert_eq!((ii.width(), ii.height()), (3, 3));
    }

    #[test]
    fn test_empty_rect_is_zero() {
        let ii = IntegralImage::new(&ramp(3, 3));
        assert_relative_eq!(ii.rect_sum(1, 1, 0, 2), 0.0);
    }
}
