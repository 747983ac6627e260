use crate::core::error::TranscriptionError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Half-open window `[start_ms, end_ms)` of the source recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkSpan {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Splits `duration_ms` into windows of at most `max_chunk_ms`, each starting `overlap_ms` before
/// the previous one ended. A remaining tail shorter than twice the overlap gets no window of its own.
pub fn split_chunks(
    duration_ms: u64,
    max_chunk_ms: u64,
    overlap_ms: u64,
) -> Result<Vec<ChunkSpan>, TranscriptionError> {
    if max_chunk_ms == 0 {
        return Err(TranscriptionError::Validation(
            "chunk length must be positive".to_string(),
        ));
    }
    if overlap_ms >= max_chunk_ms {
        return Err(TranscriptionError::Validation(format!(
            "overlap ({} ms) must be shorter than the chunk length ({} ms)",
            overlap_ms, max_chunk_ms
        )));
    }

    if duration_ms <= max_chunk_ms {
        return Ok(vec![ChunkSpan {
            start_ms: 0,
            end_ms: duration_ms,
        }]);
    }

    let mut chunks = Vec::new();
    let mut start_ms = 0;
    while start_ms < duration_ms {
        let end_ms = (start_ms + max_chunk_ms).min(duration_ms);
        chunks.push(ChunkSpan { start_ms, end_ms });
        start_ms = end_ms - overlap_ms;

        if duration_ms - start_ms < overlap_ms * 2 {
            break;
        }
    }
    Ok(chunks)
}

/// Reads the length of a recording and cuts windows out of it.
#[async_trait]
pub trait AudioSegmenter: Send + Sync {
    async fn read_duration_ms(&self, path: &Path) -> Result<u64>;

    /// Writes `span` of `input` to `output` as an MP3.
    async fn extract_segment(&self, input: &Path, span: ChunkSpan, output: &Path) -> Result<()>;
}

/// Handle on the external ffmpeg/ffprobe binaries.
#[derive(Debug, Clone)]
pub struct AudioToolkit {
    ffmpeg: String,
    ffprobe: String,
}

impl AudioToolkit {
    /// Returns a toolkit only when both binaries answer `-version`.
    pub async fn detect() -> Option<Self> {
        Self::detect_with("ffmpeg", "ffprobe").await
    }

    pub async fn detect_with(ffmpeg: &str, ffprobe: &str) -> Option<Self> {
        for bin in [ffmpeg, ffprobe] {
            let status = Command::new(bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => {}
                _ => {
                    info!("{} not available; long audio cannot be split", bin);
                    return None;
                }
            }
        }
        Some(Self {
            ffmpeg: ffmpeg.to_string(),
            ffprobe: ffprobe.to_string(),
        })
    }
}

#[async_trait]
impl AudioSegmenter for AudioToolkit {
    async fn read_duration_ms(&self, path: &Path) -> Result<u64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .context("Failed to spawn ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        parse_duration_ms(&String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_segment(&self, input: &Path, span: ChunkSpan, output: &Path) -> Result<()> {
        debug!(
            "Extracting {}..{} ms of {}",
            span.start_ms,
            span.end_ms,
            input.display()
        );
        let status = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-y", "-ss"])
            .arg(format_seconds(span.start_ms))
            .arg("-t")
            .arg(format_seconds(span.duration_ms()))
            .arg("-i")
            .arg(input)
            .args(["-vn", "-f", "mp3", "-b:a", "128k"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("Failed to spawn ffmpeg")?;

        if !status.success() {
            return Err(anyhow!("ffmpeg segment extraction failed for {}", input.display()));
        }
        Ok(())
    }
}

fn parse_duration_ms(raw: &str) -> Result<u64> {
    let seconds: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Unexpected ffprobe duration: {:?}", raw.trim()))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(anyhow!("Unexpected ffprobe duration: {}", seconds));
    }
    Ok((seconds * 1000.0).round() as u64)
}

fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(chunks: &[ChunkSpan]) -> Vec<(u64, u64)> {
        chunks.iter().map(|c| (c.start_ms, c.end_ms)).collect()
    }

    #[test]
    fn test_twenty_one_minutes_makes_three_chunks() {
        let chunks = split_chunks(1_260_000, 600_000, 5_000).unwrap();
        assert_eq!(
            spans(&chunks),
            vec![(0, 600_000), (595_000, 1_195_000), (1_190_000, 1_260_000)]
        );
    }

    #[test]
    fn test_short_audio_is_one_chunk() {
        for duration in [0, 1, 599_999, 600_000] {
            let chunks = split_chunks(duration, 600_000, 5_000).unwrap();
            assert_eq!(spans(&chunks), vec![(0, duration)]);
        }
    }

    #[test]
    fn test_tiny_tail_is_not_its_own_chunk() {
        // After the second window the remaining tail is under 2 x overlap.
        let chunks = split_chunks(1_195_000 + 4_000, 600_000, 5_000).unwrap();
        assert_eq!(spans(&chunks), vec![(0, 600_000), (595_000, 1_195_000)]);
    }

    #[test]
    fn test_zero_overlap_tiles_exactly() {
        let chunks = split_chunks(1_500_000, 600_000, 0).unwrap();
        assert_eq!(
            spans(&chunks),
            vec![(0, 600_000), (600_000, 1_200_000), (1_200_000, 1_500_000)]
        );
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(matches!(
            split_chunks(1_000_000, 5_000, 5_000),
            Err(TranscriptionError::Validation(_))
        ));
        assert!(matches!(
            split_chunks(1_000_000, 0, 0),
            Err(TranscriptionError::Validation(_))
        ));
    }

    #[test]
    fn test_windows_respect_limits() {
        let chunks = split_chunks(3_600_000, 600_000, 5_000).unwrap();
        assert!(chunks.iter().all(|c| c.duration_ms() <= 600_000));
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_ms, pair[0].end_ms - 5_000);
        }
        assert_eq!(chunks.last().unwrap().end_ms, 3_600_000);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_ms("1260.000000\n").unwrap(), 1_260_000);
        assert_eq!(parse_duration_ms(" 0.5 ").unwrap(), 500);
        assert!(parse_duration_ms("N/A").is_err());
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(595_000), "595.000");
        assert_eq!(format_seconds(1_234), "1.234");
    }

    #[tokio::test]
    async fn test_missing_binaries_yield_no_toolkit() {
        let toolkit = AudioToolkit::detect_with(
            "definitely-not-ffmpeg-binary",
            "definitely-not-ffprobe-binary",
        )
        .await;
        assert!(toolkit.is_none());
    }
}
