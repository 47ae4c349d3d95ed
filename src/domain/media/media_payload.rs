//! Media payload value object

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::error::JobError;

/// Declared kind of an uploaded recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Format assumed when the client declares only the kind
    pub const fn default_format(&self) -> MediaFormat {
        match self {
            Self::Audio => MediaFormat::Mp3,
            Self::Video => MediaFormat::Mp4,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(JobError::InvalidInput(format!(
                "unsupported media kind \"{}\", expected audio or video",
                other
            ))),
        }
    }
}

/// Supported media MIME types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Wav,
    Ogg,
    Flac,
    WebmAudio,
    M4a,
    Mp4,
    Mov,
    WebmVideo,
}

impl MediaFormat {
    /// Get the MIME type string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::WebmAudio => "audio/webm",
            Self::M4a => "audio/mp4",
            Self::Mp4 => "video/mp4",
            Self::Mov => "video/quicktime",
            Self::WebmVideo => "video/webm",
        }
    }

    pub const fn kind(&self) -> MediaKind {
        match self {
            Self::Mp4 | Self::Mov | Self::WebmVideo => MediaKind::Video,
            _ => MediaKind::Audio,
        }
    }

    /// Resolve a Content-Type header value, ignoring parameters such as `; codecs=...`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next()?.trim().to_lowercase();
        let format = match essence.as_str() {
            "audio/mpeg" | "audio/mp3" => Self::Mp3,
            "audio/wav" | "audio/x-wav" | "audio/wave" => Self::Wav,
            "audio/ogg" => Self::Ogg,
            "audio/flac" | "audio/x-flac" => Self::Flac,
            "audio/webm" => Self::WebmAudio,
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Self::M4a,
            "video/mp4" => Self::Mp4,
            "video/quicktime" => Self::Mov,
            "video/webm" => Self::WebmVideo,
            _ => return None,
        };
        Some(format)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value object representing uploaded media ready for transcription.
/// Bytes are reference-counted so handing them to the blob store does not copy.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    data: Bytes,
    format: MediaFormat,
}

impl MediaPayload {
    pub fn new(data: impl Into<Bytes>, format: MediaFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn kind(&self) -> MediaKind {
        self.format.kind()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Encode the media as base64 for inline upload
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Audio".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
    }

    #[test]
    fn kind_rejects_unknown() {
        let err = "image".parse::<MediaKind>().unwrap_err();
        assert!(matches!(err, JobError::InvalidInput(_)));
    }

    #[test]
    fn from_mime_strips_parameters() {
        assert_eq!(
            MediaFormat::from_mime("audio/webm; codecs=opus"),
            Some(MediaFormat::WebmAudio)
        );
        assert_eq!(MediaFormat::from_mime("VIDEO/MP4"), Some(MediaFormat::Mp4));
        assert_eq!(MediaFormat::from_mime("application/json"), None);
    }

    #[test]
    fn format_kind() {
        assert_eq!(MediaFormat::Mov.kind(), MediaKind::Video);
        assert_eq!(MediaFormat::Flac.kind(), MediaKind::Audio);
        assert_eq!(MediaKind::Video.default_format(), MediaFormat::Mp4);
    }

    #[test]
    fn human_readable_size() {
        let payload = MediaPayload::new(vec![0u8; 2 * 1024 * 1024], MediaFormat::Mp3);
        assert_eq!(payload.human_readable_size(), "2.0 MB");
        let payload = MediaPayload::new(vec![0u8; 500], MediaFormat::Mp3);
        assert_eq!(payload.human_readable_size(), "500 B");
    }

    #[test]
    fn base64_encoding() {
        let payload = MediaPayload::new(b"hello".to_vec(), MediaFormat::Wav);
        assert_eq!(payload.to_base64(), "aGVsbG8=");
    }
}
