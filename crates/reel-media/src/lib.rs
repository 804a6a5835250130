//! FFmpeg-based transcoding to adaptive-bitrate HLS.

mod error;
mod ffmpeg;
mod playlist;
mod variant;

pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegConfig, FfmpegTranscoder, Transcoder};
pub use playlist::write_master_playlist;
pub use variant::{default_abr_variants, AbrOutput, AbrVariant, VariantOutput};
