//! External oracles at their boundary.
//!
//! Speech recognition and line segmentation are opaque services. The core
//! only sees these two capability traits; recorded responses and a local
//! rule-based segmenter stand in for the live services in tests and offline
//! runs.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_processing_core::normalizer::SkipSet;
use slidecast_project_model::caption::CandidateLine;
use slidecast_project_model::transcript::{AsrToken, NormalizedScript};

/// Speech recognizer.
pub trait TranscriptionOracle: Send + Sync {
    /// Transcribe an audio clip into time-ordered tokens.
    fn transcribe(&self, audio: &Path) -> SlidecastResult<Vec<AsrToken>>;

    fn name(&self) -> &str;
}

/// Caption line segmenter.
pub trait SegmentationOracle: Send + Sync {
    /// Break the script into display lines without altering its wording.
    fn segment(&self, script: &NormalizedScript) -> SlidecastResult<Vec<CandidateLine>>;

    fn name(&self) -> &str;
}

/// Instruction sent with the script to a remote segmentation service.
pub fn segmentation_instruction(max_line_chars: usize) -> String {
    format!(
        "Split the text below into subtitle lines.\n\
         - Keep every character, in order; do not add, remove, or change any wording.\n\
         - Every paragraph break is a line break.\n\
         - Count only letters, digits, and CJK characters; ignore punctuation and spaces.\n\
         - A paragraph of at most {max_line_chars} such characters stays on one line.\n\
         - Longer paragraphs are split, preferably right after a comma or enumeration comma.\n\
         - Output one line per row, with no numbering or timestamps."
    )
}

/// Full request for a remote segmentation service: the instruction followed
/// by the script text.
pub fn segmentation_request(script: &NormalizedScript, max_line_chars: usize) -> String {
    format!(
        "{}\n\n{}",
        segmentation_instruction(max_line_chars),
        script.text().trim()
    )
}

/// ASR output replayed from a JSON file.
///
/// Accepts a bare token array (`[{"text","start","end","confidence"}]`) or
/// Whisper-style word timestamps, either top-level (`{"words": [...]}`) or
/// nested in segments (`{"segments": [{"words": [...]}]}`).
#[derive(Debug, Clone)]
pub struct RecordedTranscript {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Tokens(Vec<AsrToken>),
    Words { words: Vec<WhisperWord> },
    Segments { segments: Vec<WhisperSegment> },
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default = "full_probability")]
    probability: f64,
}

fn full_probability() -> f64 {
    1.0
}

impl From<WhisperWord> for AsrToken {
    fn from(w: WhisperWord) -> Self {
        AsrToken::new(w.word, w.start, w.end, w.probability)
    }
}

impl RecordedTranscript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse a recorded response body.
    pub fn parse(json: &str) -> SlidecastResult<Vec<AsrToken>> {
        let file: TranscriptFile = serde_json::from_str(json)
            .map_err(|e| SlidecastError::oracle(format!("unrecognized transcript format: {e}")))?;
        let tokens = match file {
            TranscriptFile::Tokens(tokens) => tokens,
            TranscriptFile::Words { words } => words.into_iter().map(AsrToken::from).collect(),
            TranscriptFile::Segments { segments } => segments
                .into_iter()
                .flat_map(|s| s.words)
                .map(AsrToken::from)
                .collect(),
        };
        Ok(tokens)
    }
}

impl TranscriptionOracle for RecordedTranscript {
    fn transcribe(&self, _audio: &Path) -> SlidecastResult<Vec<AsrToken>> {
        if !self.path.exists() {
            return Err(SlidecastError::input_missing(&self.path));
        }
        let json = std::fs::read_to_string(&self.path)?;
        let tokens = Self::parse(&json)?;
        tracing::info!(
            path = %self.path.display(),
            tokens = tokens.len(),
            "Replayed recorded transcript"
        );
        Ok(tokens)
    }

    fn name(&self) -> &str {
        "recorded"
    }
}

/// Segmentation output replayed from a text response.
#[derive(Debug, Clone)]
pub enum RecordedSegmentation {
    File(PathBuf),
    Text(String),
}

impl RecordedSegmentation {
    /// Turn a raw response into lines: code fences and blank lines are
    /// dropped, every other line is trimmed.
    pub fn parse(response: &str) -> Vec<CandidateLine> {
        response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("```"))
            .map(CandidateLine::from)
            .collect()
    }
}

impl SegmentationOracle for RecordedSegmentation {
    fn segment(&self, _script: &NormalizedScript) -> SlidecastResult<Vec<CandidateLine>> {
        let response = match self {
            RecordedSegmentation::File(path) => {
                if !path.exists() {
                    return Err(SlidecastError::input_missing(path));
                }
                std::fs::read_to_string(path)?
            }
            RecordedSegmentation::Text(text) => text.clone(),
        };
        let lines = Self::parse(&response);
        if lines.is_empty() {
            return Err(SlidecastError::oracle("segmentation response has no lines"));
        }
        Ok(lines)
    }

    fn name(&self) -> &str {
        "recorded"
    }
}

/// Deterministic local segmenter following the same rules as the remote
/// instruction.
#[derive(Debug, Clone)]
pub struct ParagraphSegmenter {
    max_line_chars: usize,
    skip: SkipSet,
}

/// Marks after which a long paragraph may be broken.
const BREAK_MARKS: &[char] = &['，', '、', ',', '：', '；', '。', '？', '！'];

impl ParagraphSegmenter {
    pub fn new(max_line_chars: usize, skip: SkipSet) -> Self {
        Self {
            max_line_chars: max_line_chars.max(1),
            skip,
        }
    }

    /// Split raw text into lines.
    pub fn split(&self, text: &str) -> Vec<CandidateLine> {
        let mut lines = Vec::new();
        for paragraph in text.lines() {
            let mut rest: Vec<char> = paragraph.trim().chars().collect();
            while !rest.is_empty() {
                let cut = self.cut_point(&rest);
                let line: String = rest[..cut].iter().collect();
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(CandidateLine::from(line));
                }
                rest.drain(..cut);
                while rest.first().is_some_and(|c| c.is_whitespace()) {
                    rest.remove(0);
                }
            }
        }
        lines
    }

    /// Characters of `chars` that go on the next line.
    fn cut_point(&self, chars: &[char]) -> usize {
        let mut semantic = 0;
        let mut last_mark = None;
        let mut hard = chars.len();

        for (i, &c) in chars.iter().enumerate() {
            if !self.skip.contains(c) {
                semantic += 1;
                if semantic > self.max_line_chars {
                    hard = i;
                    break;
                }
            }
            if BREAK_MARKS.contains(&c) && semantic > 0 {
                last_mark = Some(i + 1);
            }
        }

        if semantic <= self.max_line_chars {
            return chars.len();
        }
        last_mark.unwrap_or(hard)
    }
}

impl Default for ParagraphSegmenter {
    fn default() -> Self {
        Self::new(18, SkipSet::new())
    }
}

impl SegmentationOracle for ParagraphSegmenter {
    fn segment(&self, script: &NormalizedScript) -> SlidecastResult<Vec<CandidateLine>> {
        Ok(self.split(&script.text()))
    }

    fn name(&self) -> &str {
        "paragraph"
    }
}
