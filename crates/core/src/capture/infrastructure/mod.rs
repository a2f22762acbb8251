pub mod channel_pacer;
pub mod directory_camera;
#[cfg(feature = "device-capture")]
pub mod ffmpeg_camera;
