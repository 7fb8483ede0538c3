//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Video stream information needed to decode frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Nominal frame rate from the container (`r_frame_rate`)
    pub nominal_fps: f64,
    /// Average frame rate over the stream (`avg_frame_rate`)
    pub average_fps: f64,
    /// Frame count, from `nb_frames` or estimated from duration
    pub frame_count: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let (width, height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::InvalidVideo("Missing frame dimensions".to_string())),
    };

    let duration = video_stream
        .duration
        .as_ref()
        .or(probe.format.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let nominal_fps = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let average_fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(nominal_fps);

    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or_else(|| (duration * average_fps).round() as u64);

    Ok(VideoInfo {
        duration,
        width,
        height,
        nominal_fps,
        average_fps,
        frame_count,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Zero rates are rejected.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("0/1").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "format": {"duration": "10.0"},
            "streams": [{
                "codec_type": "video",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "25/1",
                "nb_frames": "250"
            }]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.frame_count, 250);
        assert!((info.nominal_fps - 30.0).abs() < 1e-9);
        assert!((info.average_fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_estimates_frame_count() {
        let json = br#"{
            "format": {"duration": "4.0"},
            "streams": [{"codec_type": "video", "width": 64, "height": 48, "avg_frame_rate": "15/1"}]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_count, 60);
    }

    #[test]
    fn test_parse_probe_rejects_audio_only() {
        let json = br#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(parse_probe_output(json), Err(MediaError::InvalidVideo(_))));
    }
}
