//! FFmpeg transcoder implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::playlist::write_master_playlist;
use crate::variant::{AbrOutput, AbrVariant, VariantOutput};

/// Transcoding contract.
///
/// Production binds to [`FfmpegTranscoder`]; tests bind to fakes that
/// fabricate manifests and segments on disk.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `source_path` into one HLS rendition per variant under
    /// `output_dir`, then synthesize the master playlist.
    ///
    /// Variants are processed sequentially in source order. The output
    /// directory must already exist. Cancelling the token terminates the
    /// encoder and surfaces [`MediaError::Cancelled`].
    async fn transcode_to_abr(
        &self,
        cancel: &CancellationToken,
        source_path: &Path,
        output_dir: &Path,
        variants: &[AbrVariant],
    ) -> MediaResult<AbrOutput>;
}

/// Configuration for the FFmpeg transcoder.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Path to the ffmpeg binary; "ffmpeg" assumes it is in PATH
    pub ffmpeg_path: String,
    /// Video codec
    pub video_codec: String,
    /// Encoding speed/quality preset
    pub video_preset: String,
    /// Audio codec
    pub audio_codec: String,
    /// Target duration of each HLS segment in seconds
    pub segment_duration: u32,
    /// HLS playlist type; "vod" adds the EXT-X-ENDLIST tag
    pub playlist_type: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            video_preset: "fast".to_string(),
            audio_codec: "aac".to_string(),
            segment_duration: 6,
            playlist_type: "vod".to_string(),
        }
    }
}

/// FFmpeg CLI transcoder. Runs one encoder subprocess per variant.
pub struct FfmpegTranscoder {
    config: FfmpegConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Build the encoder arguments for a single variant.
    ///
    /// `scale=-2:h` keeps the width divisible by 2, which the codec
    /// requires; `hls_list_size=0` keeps every segment in the playlist.
    fn build_variant_args(
        &self,
        input: &Path,
        variant: &AbrVariant,
        manifest: &Path,
        segment_pattern: &Path,
    ) -> Vec<String> {
        vec![
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vf".into(),
            format!("scale=-2:{}", variant.height),
            "-c:v".into(),
            self.config.video_codec.clone(),
            "-preset".into(),
            self.config.video_preset.clone(),
            "-b:v".into(),
            variant.bitrate_bps.to_string(),
            "-c:a".into(),
            self.config.audio_codec.clone(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.config.segment_duration.to_string(),
            "-hls_list_size".into(),
            "0".into(),
            "-hls_playlist_type".into(),
            self.config.playlist_type.clone(),
            "-hls_segment_filename".into(),
            segment_pattern.to_string_lossy().into_owned(),
            "-y".into(),
            manifest.to_string_lossy().into_owned(),
        ]
    }

    async fn validate_input(source_path: &Path) -> MediaResult<()> {
        match tokio::fs::metadata(source_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(MediaError::invalid_input(format!(
                "input path is not a regular file: {}",
                source_path.display()
            ))),
            Err(_) => Err(MediaError::invalid_input(format!(
                "input file does not exist: {}",
                source_path.display()
            ))),
        }
    }

    async fn validate_output_dir(output_dir: &Path) -> MediaResult<()> {
        match tokio::fs::metadata(output_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(MediaError::invalid_output_dir(format!(
                "output path is not a directory: {}",
                output_dir.display()
            ))),
            Err(_) => Err(MediaError::invalid_output_dir(format!(
                "output directory does not exist: {}",
                output_dir.display()
            ))),
        }
    }

    /// Run the encoder once, killing it if the token is cancelled.
    async fn run_encoder(&self, cancel: &CancellationToken, args: &[String]) -> MediaResult<()> {
        which::which(&self.config.ffmpeg_path).map_err(|_| MediaError::FfmpegNotFound)?;

        debug!("running {} {}", self.config.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::FfmpegFailed {
                code: status.code(),
            })
        }
    }

    /// Enumerate the `.ts` segments produced in a variant directory,
    /// in playlist order.
    async fn collect_segments(variant_dir: &Path) -> MediaResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(variant_dir).await?;
        let mut segments = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "ts") {
                segments.push(path);
            }
        }

        segments.sort();
        Ok(segments)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode_to_abr(
        &self,
        cancel: &CancellationToken,
        source_path: &Path,
        output_dir: &Path,
        variants: &[AbrVariant],
    ) -> MediaResult<AbrOutput> {
        Self::validate_input(source_path).await?;
        Self::validate_output_dir(output_dir).await?;
        if variants.is_empty() {
            return Err(MediaError::NoVariants);
        }

        let mut outputs = Vec::with_capacity(variants.len());

        for variant in variants {
            let variant_dir = output_dir.join(&variant.name);
            tokio::fs::create_dir_all(&variant_dir).await?;

            let manifest = variant_dir.join("playlist.m3u8");
            let segment_pattern = variant_dir.join("segment_%03d.ts");
            let args = self.build_variant_args(source_path, variant, &manifest, &segment_pattern);

            info!(
                variant = %variant.name,
                height = variant.height,
                bitrate = variant.bitrate_bps,
                "transcoding variant"
            );
            self.run_encoder(cancel, &args).await?;

            let segments = Self::collect_segments(&variant_dir).await?;
            if segments.is_empty() {
                return Err(MediaError::NoSegments(variant.name.clone()));
            }

            outputs.push(VariantOutput {
                variant: variant.clone(),
                manifest_path: manifest,
                segment_paths: segments,
            });
        }

        let master_path = output_dir.join("master.m3u8");
        write_master_playlist(&master_path, variants).await?;

        Ok(AbrOutput {
            master_manifest_path: master_path,
            variants: outputs,
        })
    }
}
