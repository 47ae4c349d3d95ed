//! Transcript value object

use serde::{Deserialize, Serialize};

/// One utterance of the recording, with its position in seconds when known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            end: None,
        }
    }

    pub fn timed(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Ordered transcript produced by a transcriber
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    /// Single untimed segment
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![TranscriptSegment::new(text)])
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// True when no segment carries any non-whitespace text
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }

    /// Render as `text [start-end]` lines, the form handed to extractors.
    /// Segments without timing are rendered as bare text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in self.segments.iter().filter(|s| !s.text.trim().is_empty()) {
            out.push_str(segment.text.trim());
            if let (Some(start), Some(end)) = (segment.start, segment.end) {
                out.push_str(&format!(" [{}-{}]", start, end));
            }
            out.push('\n');
        }
        out
    }
}

/// Parse a timestamp given as seconds ("12.5") or clock time ("1:02", "01:02:03").
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_end_matches('s');
    if raw.is_empty() {
        return None;
    }
    if !raw.contains(':') {
        return raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0);
    }

    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut total = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_timed_segments() {
        let transcript = Transcript::new(vec![
            TranscriptSegment::timed("Add 5 ml of buffer", 0.0, 4.5),
            TranscriptSegment::timed("Vortex for ten seconds", 4.5, 9.0),
        ]);
        assert_eq!(
            transcript.render(),
            "Add 5 ml of buffer [0-4.5]\nVortex for ten seconds [4.5-9]\n"
        );
    }

    #[test]
    fn render_untimed_and_skips_blank() {
        let transcript = Transcript::new(vec![
            TranscriptSegment::new("  Centrifuge the sample "),
            TranscriptSegment::new("   "),
        ]);
        assert_eq!(transcript.render(), "Centrifuge the sample\n");
    }

    #[test]
    fn blank_detection() {
        assert!(Transcript::default().is_blank());
        assert!(Transcript::from_text("  ").is_blank());
        assert!(!Transcript::from_text("pipette").is_blank());
    }

    #[test]
    fn parse_timestamp_forms() {
        assert_eq!(parse_timestamp("12.5"), Some(12.5));
        assert_eq!(parse_timestamp("30s"), Some(30.0));
        assert_eq!(parse_timestamp("1:02"), Some(62.0));
        assert_eq!(parse_timestamp("01:02:03"), Some(3723.0));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("-3"), None);
        assert_eq!(parse_timestamp("soon"), None);
    }
}
