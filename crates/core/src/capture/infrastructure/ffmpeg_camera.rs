use crate::capture::domain::camera::{Camera, CameraError};
use crate::shared::frame::Frame;

/// POSIX `EBUSY`, reported by v4l2 when another process holds the device.
const EBUSY: i32 = 16;

/// Live capture device opened through libavdevice (`v4l2`, `avfoundation`,
/// `dshow`, ...).
///
/// The input is opened in `start` and closed in `stop`, so the device is
/// only held for the duration of one grab.
pub struct FfmpegCamera {
    input_format: String,
    device: String,
    width: u32,
    height: u32,
    input: Option<ffmpeg_next::format::context::Input>,
}

// Safety: FfmpegCamera is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn new(input_format: &str, device: &str, width: u32, height: u32) -> Self {
        Self {
            input_format: input_format.to_string(),
            device: device.to_string(),
            width,
            height,
            input: None,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, CameraError> {
        ffmpeg_next::init().map_err(|e| CameraError::Unavailable(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == self.input_format)
            .ok_or_else(|| {
                CameraError::Unavailable(format!("no input device format `{}`", self.input_format))
            })?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", self.width, self.height));

        let ctx = ffmpeg_next::format::open_with(
            &self.device,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )
        .map_err(|e| match e {
            ffmpeg_next::Error::Other { errno } if errno == EBUSY => {
                CameraError::Busy(format!("{}: {e}", self.device))
            }
            _ => CameraError::Unavailable(format!("{}: {e}", self.device)),
        })?;
        if !ctx.is_input() {
            return Err(CameraError::Unavailable(format!("{} is not an input", self.device)));
        }
        Ok(ctx.input())
    }
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

impl Camera for FfmpegCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.input.is_none() {
            self.input = Some(self.open_input()?);
        }
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        let grab_err = |e: ffmpeg_next::Error| CameraError::Grab(e.to_string());
        let ictx = self.input.as_mut().ok_or(CameraError::NotStarted)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraError::Grab("device has no video stream".into()))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(grab_err)?;
        let mut decoder = codec_ctx.decoder().video().map_err(grab_err)?;

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(grab_err)?;

        for (stream, packet) in ictx.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet).map_err(grab_err)?;
            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
                scaler.run(&decoded, &mut rgb).map_err(grab_err)?;
                let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
                return Ok(Frame::new(pixels, self.width, self.height, 3));
            }
        }
        Err(CameraError::Grab("device stream ended".into()))
    }

    fn stop(&mut self) {
        self.input = None;
    }
}
