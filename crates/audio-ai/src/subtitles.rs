//! Subtitle generation in SRT, VTT, and ASS formats.
//!
//! SRT layout is what downstream players expect byte for byte: a sequence
//! number, a `start --> end` line, the text, and a blank line.

use slidecast_common::config::{SubtitleStyle, VideoSettings};
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::caption::CaptionEntry;

/// Generate SRT subtitle content from caption entries.
pub fn generate_srt(entries: &[CaptionEntry]) -> String {
    let mut output = String::new();

    for (i, entry) in entries.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(entry.start),
            format_srt_time(entry.end),
        ));
        output.push_str(&entry.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from caption entries.
pub fn generate_vtt(entries: &[CaptionEntry]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for entry in entries {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(entry.start),
            format_vtt_time(entry.end),
        ));
        output.push_str(&entry.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate a styled ASS script for burning captions into the video.
///
/// Alignment is bottom-center; the vertical margin puts the middle of the
/// text line at `style.center_y`.
pub fn generate_ass(entries: &[CaptionEntry], style: &SubtitleStyle, video: &VideoSettings) -> String {
    let margin_v = video
        .height
        .saturating_sub(style.center_y)
        .saturating_sub(style.font_size / 2);

    let mut output = format!(
        "[Script Info]\n\
         Title: Slidecast Subtitles\n\
         ScriptType: v4.00+\n\
         PlayResX: {width}\n\
         PlayResY: {height}\n\
         WrapStyle: 0\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Default,{font},{size},{primary},&H000000FF,{outline},&H00000000,-1,0,0,0,100,100,0,0,1,{outline_width},0,2,10,10,{margin_v},1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        width = video.width,
        height = video.height,
        font = style.font_name,
        size = style.font_size,
        primary = ass_color(&style.color),
        outline = ass_color(&style.outline_color),
        outline_width = style.outline_width,
    );

    for entry in entries {
        output.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_ass_time(entry.start),
            format_ass_time(entry.end),
            entry.text.replace('\n', "\\N"),
        ));
    }

    output
}

/// ASS colour (`&HAABBGGRR`) for a colour name or `#RRGGBB`.
pub fn ass_color(color: &str) -> String {
    let rgb = match color.to_ascii_lowercase().as_str() {
        "yellow" => Some((0xFF, 0xFF, 0x00)),
        "white" => Some((0xFF, 0xFF, 0xFF)),
        "black" => Some((0x00, 0x00, 0x00)),
        "red" => Some((0xFF, 0x00, 0x00)),
        hex if hex.len() == 7 && hex.starts_with('#') => {
            let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
            match (channel(1..3), channel(3..5), channel(5..7)) {
                (Some(r), Some(g), Some(b)) => Some((r, g, b)),
                _ => None,
            }
        }
        _ => None,
    };
    let (r, g, b) = rgb.unwrap_or((0xFF, 0xFF, 0xFF));
    format!("&H00{b:02X}{g:02X}{r:02X}")
}

fn rounded_millis(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub fn format_srt_time(secs: f64) -> String {
    let total_ms = rounded_millis(secs);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
pub fn format_vtt_time(secs: f64) -> String {
    format_srt_time(secs).replacen(',', ".", 1)
}

/// Format seconds as ASS timestamp: H:MM:SS.cc
pub fn format_ass_time(secs: f64) -> String {
    let total_cs = (secs.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6_000;
    let seconds = (total_cs % 6_000) / 100;
    let centis = total_cs % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm`, a `.` separator is accepted).
pub fn parse_srt_time(s: &str) -> Option<f64> {
    let (hms, millis) = s.trim().split_once([',', '.'])?;
    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let millis: u64 = millis.parse().ok()?;
    Some((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

/// Parse SRT content back into caption entries.
pub fn parse_srt(content: &str) -> SlidecastResult<Vec<CaptionEntry>> {
    let normalized = content.replace("\r\n", "\n").replace('\u{feff}', "");
    let mut entries = Vec::new();

    for (block_no, block) in normalized.split("\n\n").enumerate() {
        let mut lines = block.lines().skip_while(|l| l.trim().is_empty());
        let Some(first) = lines.next() else {
            continue;
        };
        let timing = if first.contains("-->") {
            first
        } else {
            lines.next().unwrap_or_default()
        };
        let (start, end) = timing
            .split_once("-->")
            .and_then(|(a, b)| Some((parse_srt_time(a)?, parse_srt_time(b)?)))
            .ok_or_else(|| {
                SlidecastError::config(format!("SRT block {} has no valid timing line", block_no + 1))
            })?;
        let text = lines.collect::<Vec<_>>().join("\n");
        entries.push(CaptionEntry::new(text.trim(), start, end));
    }

    Ok(entries)
}

/// Save subtitles to a file; the format follows the extension
/// (`.vtt`, `.ass`, anything else is SRT).
pub fn save_subtitles(
    entries: &[CaptionEntry],
    path: &std::path::Path,
    style: &SubtitleStyle,
    video: &VideoSettings,
) -> SlidecastResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(entries),
        Some("ass") => generate_ass(entries, style, video),
        _ => generate_srt(entries),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "Subtitles saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<CaptionEntry> {
        vec![
            CaptionEntry::new("今天天氣很好", 0.0, 3.0),
            CaptionEntry::new("This is a test", 3.0, 5.0),
        ]
    }

    #[test]
    fn test_srt_layout_is_exact() {
        let srt = generate_srt(&entries()[..1]);
        assert_eq!(srt, "1\n00:00:00,000 --> 00:00:03,000\n今天天氣很好\n\n");
    }

    #[test]
    fn test_srt_numbering() {
        let srt = generate_srt(&entries());
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test\n\n"));
    }

    #[test]
    fn test_vtt_generation() {
        let vtt = generate_vtt(&[CaptionEntry::new("One minute in", 61.5, 63.0)]);
        assert!(vtt.starts_with("WEBVTT\n"));
        assert!(vtt.contains("00:01:01.500 --> 00:01:03.000"));
    }

    #[test]
    fn test_time_formatting_rounds() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3661.5), "01:01:01,500");
        assert_eq!(format_srt_time(2.9999), "00:00:03,000");
        assert_eq!(format_srt_time(0.0014), "00:00:00,001");
        assert_eq!(format_vtt_time(3661.5), "01:01:01.500");
        assert_eq!(format_ass_time(3661.5), "1:01:01.50");
    }

    #[test]
    fn test_ass_style_and_events() {
        let ass = generate_ass(
            &[CaptionEntry::new("第一行\n第二行", 1.0, 2.25)],
            &SubtitleStyle::default(),
            &VideoSettings::default(),
        );
        assert!(ass.contains("PlayResX: 1920"));
        // 1080 - 1000 - 96 / 2 = 32
        assert!(ass.contains(",&H0000FFFF,&H000000FF,&H00000000,&H00000000,-1,0,0,0,100,100,0,0,1,6,0,2,10,10,32,1"));
        assert!(ass.contains("Dialogue: 0,0:00:01.00,0:00:02.25,Default,,0,0,0,,第一行\\N第二行"));
    }

    #[test]
    fn test_ass_color_hex() {
        assert_eq!(ass_color("#112233"), "&H00332211");
        assert_eq!(ass_color("Yellow"), "&H0000FFFF");
        assert_eq!(ass_color("chartreuse"), "&H00FFFFFF");
    }

    #[test]
    fn test_parse_srt_reads_generated_output() {
        let parsed = parse_srt(&generate_srt(&entries())).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].text, "This is a test");
        assert!((parsed[1].start - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_srt_multiline_and_crlf() {
        let content = "1\r\n00:00:01,000 --> 00:00:02,500\r\nline one\r\nline two\r\n\r\n";
        let parsed = parse_srt(content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "line one\nline two");
        assert!((parsed[0].end - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_srt_rejects_missing_timing() {
        assert!(parse_srt("1\nno timing here\n\n").is_err());
    }
}
