use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::imageops::FilterType;

use crate::capture::domain::camera::{Camera, CameraError};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::image_convert;

/// Exclusive-use flag shared by every handle to one device.
#[derive(Clone, Debug, Default)]
pub struct DeviceLock(Arc<AtomicBool>);

impl DeviceLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Replays the images of a directory as camera frames, cycling forever.
///
/// Files are taken in name order and resized to the configured frame size.
/// Frames are always RGB, like a device camera's.
pub struct DirectoryCamera {
    files: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
    lock: DeviceLock,
    started: bool,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl DirectoryCamera {
    pub fn open(dir: &Path, width: u32, height: u32) -> Result<Self, CameraError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| CameraError::Unavailable(format!("{}: {e}", dir.display())))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(CameraError::Unavailable(format!(
                "no images in {}",
                dir.display()
            )));
        }
        log::info!("Directory camera replaying {} images from {}", files.len(), dir.display());
        Ok(Self {
            files,
            next: 0,
            width,
            height,
            lock: DeviceLock::new(),
            started: false,
        })
    }

    /// Shares `lock` with other users of the same device.
    pub fn with_lock(mut self, lock: DeviceLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn lock(&self) -> DeviceLock {
        self.lock.clone()
    }
}

impl Camera for DirectoryCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.started {
            return Ok(());
        }
        if !self.lock.try_acquire() {
            return Err(CameraError::Busy("device is held by another user".into()));
        }
        self.started = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        if !self.started {
            return Err(CameraError::NotStarted);
        }
        let path = &self.files[self.next % self.files.len()];
        self.next = (self.next + 1) % self.files.len();

        let img = image::open(path)
            .map_err(|e| CameraError::Grab(format!("{}: {e}", path.display())))?;
        let img = if img.width() != self.width || img.height() != self.height {
            img.resize_exact(self.width, self.height, FilterType::Triangle)
        } else {
            img
        };
        let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
        Ok(image_convert::from_dynamic(rgb))
    }

    fn stop(&mut self) {
        if self.started {
            self.lock.release();
            self.started = false;
        }
    }
}

impl Drop for DirectoryCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rgb(dir: &Path, name: &str, w: u32, h: u32, rgb: [u8; 3]) {
        image::RgbImage::from_pixel(w, h, image::Rgb(rgb))
            .save(dir.join(name))
            .unwrap();
    }

    fn camera_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_rgb(dir.path(), "b.png", 8, 6, [0, 200, 0]);
        write_rgb(dir.path(), "a.png", 16, 12, [200, 0, 0]);
        std::fs::write(dir.path().join("readme.txt"), b"skip").unwrap();
        dir
    }

    #[test]
    fn test_cycles_in_name_order_and_resizes() {
        let dir = camera_dir();
        let mut cam = DirectoryCamera::open(dir.path(), 8, 6).unwrap();
        cam.start().unwrap();
        let first = cam.grab().unwrap();
        let second = cam.grab().unwrap();
        let third = cam.grab().unwrap();
        cam.stop();

        assert_eq!((first.width(), first.height(), first.channels()), (8, 6, 3));
        assert_eq!(&first.data()[..3], &[200, 0, 0]);
        assert_eq!(&second.data()[..3], &[0, 200, 0]);
        assert_eq!(third, first);
    }

    #[test]
    fn test_grab_requires_start() {
        let dir = camera_dir();
        let mut cam = DirectoryCamera::open(dir.path(), 8, 6).unwrap();
        assert!(matches!(cam.grab(), Err(CameraError::NotStarted)));
    }

    #[test]
    fn test_shared_lock_reports_busy() {
        let dir = camera_dir();
        let mut a = DirectoryCamera::open(dir.path(), 8, 6).unwrap();
        let mut b = DirectoryCamera::open(dir.path(), 8, 6)
            .unwrap()
            .with_lock(a.lock());
        a.start().unwrap();
        assert!(matches!(b.start(), Err(CameraError::Busy(_))));
        a.stop();
        assert!(b.start().is_ok());
        b.stop();
        assert!(!a.lock().is_held());
    }

    #[test]
    fn test_empty_dir_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DirectoryCamera::open(dir.path(), 8, 6),
            Err(CameraError::Unavailable(_))
        ));
    }
}
