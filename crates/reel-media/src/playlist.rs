//! Master playlist synthesis.

use std::path::Path;

use crate::error::MediaResult;
use crate::variant::AbrVariant;

/// Render the master playlist body for the given variants, preserving
/// their order.
///
/// The `RESOLUTION=` attribute assumes 16:9 sources; players treat it as
/// a hint only.
pub fn render_master_playlist(variants: &[AbrVariant]) -> String {
    let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n\n");

    for variant in variants {
        body.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}/playlist.m3u8\n",
            variant.bitrate_bps,
            variant.width_hint(),
            variant.height,
            variant.name,
        ));
    }

    body
}

/// Write the master playlist to `path`.
pub async fn write_master_playlist(path: &Path, variants: &[AbrVariant]) -> MediaResult<()> {
    tokio::fs::write(path, render_master_playlist(variants)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::default_abr_variants;

    #[test]
    fn test_master_playlist_format() {
        let body = render_master_playlist(&default_abr_variants());
        assert_eq!(
            body,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             \n\
             #EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080\n\
             1080p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\n\
             720p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
             360p/playlist.m3u8\n"
        );
    }

    #[test]
    fn test_master_playlist_preserves_order() {
        let variants = vec![
            AbrVariant::new("360p", 360, 800_000),
            AbrVariant::new("1080p", 1080, 5_000_000),
        ];
        let body = render_master_playlist(&variants);
        let first = body.find("360p/playlist.m3u8").unwrap();
        let second = body.find("1080p/playlist.m3u8").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_write_master_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.m3u8");

        write_master_playlist(&path, &default_abr_variants())
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.starts_with("#EXTM3U\n"));
        assert!(written.contains("720p/playlist.m3u8"));
    }
}
