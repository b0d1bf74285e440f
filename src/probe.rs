//! # Media Probe Module
//!
//! Wrapper sincrono attorno a `ffprobe` per interrogare un singolo file.
//!
//! ## Responsabilità:
//! - Esegue `ffprobe -print_format json -show_format -show_streams`
//! - Estrae codec, risoluzione, durata e frame rate del primo stream video
//! - Ogni campo assente è "sconosciuto" (`None`), mai un errore
//!
//! ## Errori:
//! - Binario mancante: `MissingDependency` (fatale)
//! - Exit code non zero: tutti i campi sconosciuti
//!
//! ## Esempio:
//! ```rust,ignore
//! let prober = FfprobeProber::new("ffprobe");
//! let info = prober.probe(&video_path).await?;
//! if let Some(fps) = info.fps { /* ... */ }
//! ```

use crate::error::IngestError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Properties reported by the prober; `None` means unknown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
    pub fps: Option<f64>,
}

impl ProbeInfo {
    /// Longest edge in pixels, when both dimensions are known
    pub fn long_edge(&self) -> Option<u32> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(w.max(h)),
            _ => None,
        }
    }

    /// Build from `ffprobe -print_format json` output
    pub fn from_ffprobe_json(info: &Value) -> Self {
        let empty_vec = vec![];
        let streams = info["streams"].as_array().unwrap_or(&empty_vec);
        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"] == "video")
            .unwrap_or(&Value::Null);

        let codec = video_stream["codec_name"]
            .as_str()
            .map(|c| c.to_lowercase())
            .filter(|c| !c.is_empty());
        let width = video_stream["width"].as_u64().map(|w| w as u32).filter(|w| *w > 0);
        let height = video_stream["height"].as_u64().map(|h| h as u32).filter(|h| *h > 0);

        let duration = parse_number(&info["format"]["duration"])
            .or_else(|| parse_number(&video_stream["duration"]))
            .filter(|d| *d > 0.0);

        let fps = video_stream["avg_frame_rate"]
            .as_str()
            .and_then(parse_frame_rate)
            .or_else(|| video_stream["r_frame_rate"].as_str().and_then(parse_frame_rate));

        Self {
            codec,
            width,
            height,
            duration,
            fps,
        }
    }
}

/// ffprobe reports numbers as strings
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Parse "30000/1001" or "25" into frames per second
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Answers codec/resolution/duration/frame-rate queries for one file
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, IngestError>;
}

/// `ffprobe` backed prober
pub struct FfprobeProber {
    program: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, IngestError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(crate::args![
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            path
        ])
        .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::MissingDependency(format!(
                    "{} is required for media probing",
                    self.program.display()
                )));
            }
            Ok(Err(e)) => return Err(IngestError::Probe(format!("{}: {}", path.display(), e))),
            Err(_) => {
                debug!("ffprobe timed out on {}", path.display());
                return Ok(ProbeInfo::default());
            }
        };

        if !output.status.success() {
            debug!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(ProbeInfo::default());
        }

        let info: Value = match serde_json::from_slice(&output.stdout) {
            Ok(info) => info,
            Err(e) => {
                debug!("Unparsable ffprobe output for {}: {}", path.display(), e);
                return Ok(ProbeInfo::default());
            }
        };

        Ok(ProbeInfo::from_ffprobe_json(&info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ffprobe_json() {
        let info = json!({
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                {
                    "codec_type": "video",
                    "codec_name": "ProRes",
                    "width": 3840,
                    "height": 2160,
                    "avg_frame_rate": "24000/1001",
                    "r_frame_rate": "24000/1001"
                }
            ],
            "format": { "duration": "12.480000" }
        });

        let probe = ProbeInfo::from_ffprobe_json(&info);
        assert_eq!(probe.codec.as_deref(), Some("prores"));
        assert_eq!(probe.long_edge(), Some(3840));
        assert_eq!(probe.duration, Some(12.48));
        assert!((probe.fps.unwrap() - 23.976).abs() < 0.001);
    }

    #[test]
    fn test_missing_fields_are_unknown() {
        let probe = ProbeInfo::from_ffprobe_json(&json!({ "streams": [] }));
        assert_eq!(probe, ProbeInfo::default());
        assert_eq!(probe.long_edge(), None);
    }

    #[test]
    fn test_fps_falls_back_to_r_frame_rate() {
        let info = json!({
            "streams": [{ "codec_type": "video", "avg_frame_rate": "0/0", "r_frame_rate": "25/1" }]
        });
        assert_eq!(ProbeInfo::from_ffprobe_json(&info).fps, Some(25.0));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("50"), Some(50.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_fatal() {
        let prober = FfprobeProber::new("/nonexistent/bin/ffprobe-missing");
        let err = prober.probe(Path::new("clip.mov")).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
