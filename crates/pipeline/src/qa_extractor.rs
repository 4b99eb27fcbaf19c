//! Q/A Extractor (C6): splits diarized segments into sentences, detects
//! Korean-aware interrogatives, and matches each question to a nearby
//! answer within a configurable sentence/time window.
//!
//! Rust's `regex` crate has no lookbehind, so the original's
//! `re.split(r"(?<=[.?!])\s+", text)` sentence splitter is reimplemented by
//! hand in [`split_sentences`] instead of being ported literally.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::diarization::Segment;

#[derive(Debug, Clone)]
pub struct Sentence {
    pub text: String,
    pub speaker: Option<i32>,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct QAPair {
    pub q_text: String,
    pub q_speaker: Option<i32>,
    pub q_time: f64,
    pub a_text: String,
    pub a_speaker: Option<i32>,
    pub a_time: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct QaConfig {
    pub time_window_sec: f64,
    pub sentence_window: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self { time_window_sec: 15.0, sentence_window: 3 }
    }
}

/// Longest suffixes first so the anchored alternation doesn't match a
/// shorter ending (e.g. `나` inside `나요`) before the longer one.
static QUESTION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\?|(?:습니까요|습니까|아니야|나요|지요|요|까|니|냐|나|죠)\??)$").unwrap()
});

fn is_question(text: &str) -> bool {
    QUESTION_SUFFIX.is_match(text.trim())
}

/// Splits on whitespace that follows a sentence-terminal `.`, `?`, or `!`,
/// mirroring `re.split(r"(?<=[.?!])\s+", text)` without lookbehind.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '?' | '!') && chars.peek().is_some_and(|c| c.is_whitespace()) {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

fn segment_to_sentences(segment: &Segment) -> Vec<Sentence> {
    let parts = split_sentences(&segment.text);
    if parts.is_empty() {
        return Vec::new();
    }
    let duration = (segment.end - segment.start).max(0.0);
    let per = duration / parts.len() as f64;
    let mut cursor = segment.start;
    parts
        .into_iter()
        .map(|text| {
            let start = cursor;
            cursor += per;
            Sentence { text, speaker: segment.speaker, start, end: cursor }
        })
        .collect()
}

fn round_key(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

/// Incremental across a session: every call reprocesses the full
/// accumulated segment list into sentences (sentence boundaries can shift
/// as later segments of the same utterance arrive), but emission is
/// dedup-guarded against `(q_text, a_text, a_time)`.
pub struct QaExtractor {
    config: QaConfig,
    segments: Vec<Segment>,
    emitted: HashSet<(String, String, i64)>,
}

impl QaExtractor {
    pub fn new(config: QaConfig) -> Self {
        Self { config, segments: Vec::new(), emitted: HashSet::new() }
    }

    pub fn append_segments(&mut self, new_segments: &[Segment]) -> Vec<QAPair> {
        self.segments.extend_from_slice(new_segments);
        let sentences: Vec<Sentence> = self.segments.iter().flat_map(segment_to_sentences).collect();
        self.extract(&sentences)
    }

    fn extract(&mut self, sentences: &[Sentence]) -> Vec<QAPair> {
        let mut pairs = Vec::new();
        for (idx, question) in sentences.iter().enumerate() {
            if !is_question(&question.text) {
                continue;
            }
            let Some(answer) = self.find_answer(idx, question, sentences) else { continue };

            let key = (question.text.clone(), answer.text.clone(), round_key(answer.start));
            if !self.emitted.insert(key) {
                continue;
            }

            pairs.push(QAPair {
                q_text: question.text.clone(),
                q_speaker: question.speaker,
                q_time: question.end,
                a_text: answer.text.clone(),
                a_speaker: answer.speaker,
                a_time: answer.start,
                confidence: confidence(question, answer, self.config.time_window_sec),
            });
        }
        pairs
    }

    fn find_answer<'a>(&self, idx: usize, question: &Sentence, sentences: &'a [Sentence]) -> Option<&'a Sentence> {
        let max_time = question.end + self.config.time_window_sec;
        let limit = (idx + self.config.sentence_window).min(sentences.len().saturating_sub(1));

        let mut fallback: Option<&Sentence> = None;
        for candidate in sentences.iter().take(limit + 1).skip(idx + 1) {
            if candidate.start > max_time {
                break;
            }
            if candidate.text.trim().is_empty() {
                continue;
            }
            if candidate.speaker != question.speaker {
                return Some(candidate);
            }
            if fallback.is_none() {
                fallback = Some(candidate);
            }
        }
        fallback
    }
}

fn confidence(question: &Sentence, answer: &Sentence, window: f64) -> f64 {
    let mut score: f64 = 0.5;
    if answer.speaker.is_some() && answer.speaker != question.speaker {
        score += 0.25;
    }
    let delta = (answer.start - question.end).max(0.0);
    if window > 0.0 && delta < window {
        score += 0.2 * (1.0 - delta / window);
    }
    if answer.text.trim_end().ends_with('.') {
        score += 0.05;
    }
    score.min(0.99)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(speaker: Option<i32>, text: &str, start: f64, end: f64) -> Segment {
        Segment { speaker, text: text.to_string(), start, end }
    }

    #[test]
    fn detects_korean_question_suffixes() {
        assert!(is_question("방향이 어디에요?"));
        assert!(is_question("식사하셨나요"));
        assert!(is_question("가능합니까"));
        assert!(!is_question("남향입니다."));
    }

    #[test]
    fn splits_on_terminal_punctuation_followed_by_space() {
        let parts = split_sentences("안녕하세요. 오늘 날씨가 좋네요.");
        assert_eq!(parts, vec!["안녕하세요.", "오늘 날씨가 좋네요."]);
    }

    #[test]
    fn question_answer_pair_matches_spec_scenario() {
        let mut extractor = QaExtractor::new(QaConfig::default());
        let segments = vec![
            seg(Some(1), "방향이 어디에요?", 0.0, 2.0),
            seg(Some(2), "남향입니다.", 2.5, 3.8),
        ];
        let pairs = extractor.append_segments(&segments);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.q_text, "방향이 어디에요?");
        assert_eq!(pair.a_text, "남향입니다.");
        assert_eq!(pair.q_time, 2.0);
        assert_eq!(pair.a_time, 2.5);
        assert!((pair.confidence - 0.99).abs() < 0.01);
    }

    #[test]
    fn answer_outside_time_window_is_not_matched() {
        let mut extractor = QaExtractor::new(QaConfig::default());
        let segments = vec![seg(Some(1), "방향이 어디에요?", 0.0, 2.0), seg(Some(2), "남향입니다.", 20.0, 21.0)];
        let pairs = extractor.append_segments(&segments);
        assert!(pairs.is_empty());
    }

    #[test]
    fn reprocessing_does_not_duplicate_already_emitted_pairs() {
        let mut extractor = QaExtractor::new(QaConfig::default());
        let segments = vec![seg(Some(1), "방향이 어디에요?", 0.0, 2.0), seg(Some(2), "남향입니다.", 2.5, 3.8)];
        let first = extractor.append_segments(&segments);
        assert_eq!(first.len(), 1);
        let second = extractor.append_segments(&[]);
        assert!(second.is_empty());
    }
}
