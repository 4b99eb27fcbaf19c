//! Diarization Processor (C5): groups word-level timings into
//! speaker-tagged segments, incrementally diffing against the transcript
//! last emitted in this session, with dedup against previously emitted
//! segments.

use std::collections::HashSet;

use sha1::{Digest, Sha1};
use stt_gateway_core::transcript::WordTimestamp;

/// A speaker-tagged span of transcribed text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub speaker: Option<i32>,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

type SeenKey = (Option<i32>, i64, i64, String);

fn dedup_key(segment: &Segment) -> SeenKey {
    (segment.speaker, round2(segment.start), round2(segment.end), segment.text.clone())
}

fn round2(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// `segment_key = SHA1("{speaker}|{start:.3f}|{end:.3f}|{text}")` (§3
/// TranscriptSegment). Enforced as a uniqueness key on the persisted
/// transcript list at append time, independent of the coarser
/// `(speaker, round(start,2), round(end,2), text)` dedup this processor
/// already applies to the emitted stream.
pub fn segment_key(segment: &Segment) -> String {
    let speaker = segment.speaker.map(|s| s.to_string()).unwrap_or_else(|| "null".to_string());
    let input = format!("{}|{:.3}|{:.3}|{}", speaker, segment.start, segment.end, segment.text);
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct DiarizationProcessor {
    last_word_end: f64,
    last_transcript: String,
    seen_keys: HashSet<SeenKey>,
}

impl Default for DiarizationProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DiarizationProcessor {
    pub fn new() -> Self {
        Self { last_word_end: 0.0, last_transcript: String::new(), seen_keys: HashSet::new() }
    }

    /// Processes one `Final` recognizer event, returning only the segments
    /// that are novel against this session's seen-segment set.
    pub fn process_final(&mut self, transcript: &str, words: &[WordTimestamp]) -> Vec<Segment> {
        let segments = if words.is_empty() {
            self.fallback_segments(transcript)
        } else {
            self.word_grouped_segments(transcript, words)
        };

        self.last_transcript = transcript.to_string();

        let mut novel = Vec::new();
        for segment in segments {
            let key = dedup_key(&segment);
            if self.seen_keys.insert(key) {
                novel.push(segment);
            }
        }
        novel
    }

    fn fallback_segments(&mut self, transcript: &str) -> Vec<Segment> {
        let diff = new_suffix(&self.last_transcript, transcript);
        if diff.trim().is_empty() {
            return Vec::new();
        }
        vec![Segment { speaker: None, text: diff, start: 0.0, end: 0.0 }]
    }

    fn word_grouped_segments(&mut self, transcript: &str, words: &[WordTimestamp]) -> Vec<Segment> {
        let fresh: Vec<&WordTimestamp> =
            words.iter().filter(|w| w.end > self.last_word_end + 0.001).collect();
        if fresh.is_empty() {
            return Vec::new();
        }

        let groups = group_by_speaker_boundary(&fresh);
        let new_text = new_suffix(&self.last_transcript, transcript);
        let aligned = align_groups_to_text(&new_text, &groups);

        let max_end = fresh.iter().map(|w| w.end).fold(self.last_word_end, f64::max);
        self.last_word_end = max_end;

        groups
            .iter()
            .zip(aligned)
            .map(|(group, text)| Segment {
                speaker: group.first().and_then(|w| w.speaker_tag),
                text,
                start: group.first().map(|w| w.start).unwrap_or(0.0),
                end: group.last().map(|w| w.end).unwrap_or(0.0),
            })
            .collect()
    }
}

/// Groups a word run into speaker-contiguous segments, starting a new
/// segment whenever `speaker_tag` changes.
fn group_by_speaker_boundary<'a>(words: &[&'a WordTimestamp]) -> Vec<Vec<&'a WordTimestamp>> {
    let mut groups: Vec<Vec<&WordTimestamp>> = Vec::new();
    for &word in words {
        match groups.last_mut() {
            Some(last) if last.last().map(|w| w.speaker_tag) == Some(word.speaker_tag) => {
                last.push(word);
            }
            _ => groups.push(vec![word]),
        }
    }
    groups
}

/// Computes the suffix of `curr` after the longest common character prefix
/// with `prev`. Returns all of `curr` when there is no common prefix.
pub fn new_suffix(prev: &str, curr: &str) -> String {
    let prev_chars: Vec<char> = prev.chars().collect();
    let curr_chars: Vec<char> = curr.chars().collect();
    let common = prev_chars.iter().zip(curr_chars.iter()).take_while(|(a, b)| a == b).count();
    curr_chars[common..].iter().collect()
}

/// Text-alignment heuristic (§4.5 step 3, §9 "Text alignment heuristic").
/// Pure function over the new-suffix text and the speaker-grouped word
/// runs: greedily slices `new_text` into one span per group, sized by that
/// group's raw word-joined length, preserving intra-word punctuation and
/// trailing separators. Falls back to the raw word join for any group the
/// new-suffix text runs out before reaching.
fn align_groups_to_text(new_text: &str, groups: &[Vec<&WordTimestamp>]) -> Vec<String> {
    let chars: Vec<char> = new_text.chars().collect();
    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(groups.len());

    for group in groups {
        let raw = join_words(group);
        let raw_len = raw.chars().count();

        if cursor >= chars.len() {
            out.push(raw);
            continue;
        }

        let end = (cursor + raw_len).min(chars.len());
        let mut span: String = chars[cursor..end].iter().collect();
        cursor = end;
        // absorb one trailing separator so the next group doesn't start mid-word
        while cursor < chars.len() && chars[cursor].is_whitespace() {
            cursor += 1;
        }
        if span.trim().is_empty() {
            span = raw;
        }
        out.push(span);
    }

    out
}

fn join_words(group: &[&WordTimestamp]) -> String {
    group.iter().map(|w| w.word.as_str()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(word: &str, start: f64, end: f64, speaker_tag: Option<i32>) -> WordTimestamp {
        WordTimestamp { word: word.to_string(), start, end, speaker_tag }
    }

    #[test]
    fn single_speaker_single_segment() {
        let mut p = DiarizationProcessor::new();
        let words = vec![word("안녕하세요.", 0.2, 1.1, None)];
        let segments = p.process_final("안녕하세요.", &words);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0.2);
        assert_eq!(segments[0].end, 1.1);
    }

    #[test]
    fn speaker_change_starts_new_segment() {
        let mut p = DiarizationProcessor::new();
        let words = vec![
            word("방향이", 0.0, 0.5, Some(1)),
            word("어디에요?", 0.5, 1.0, Some(1)),
            word("남향입니다.", 2.5, 3.0, Some(2)),
        ];
        let segments = p.process_final("방향이 어디에요? 남향입니다.", &words);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker, Some(1));
        assert_eq!(segments[1].speaker, Some(2));
    }

    #[test]
    fn reprocessing_same_final_emits_no_duplicate() {
        let mut p = DiarizationProcessor::new();
        let words = vec![word("안녕하세요.", 0.2, 1.1, None)];
        let first = p.process_final("안녕하세요.", &words);
        assert_eq!(first.len(), 1);
        let second = p.process_final("안녕하세요.", &words);
        assert!(second.is_empty());
    }

    #[test]
    fn words_already_consumed_are_filtered() {
        let mut p = DiarizationProcessor::new();
        let first_words = vec![word("안녕", 0.0, 0.5, None)];
        p.process_final("안녕", &first_words);

        let second_words = vec![word("안녕", 0.0, 0.5, None), word("하세요.", 0.5, 1.1, None)];
        let segments = p.process_final("안녕하세요.", &second_words);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0.5);
    }

    #[test]
    fn empty_word_list_falls_back_to_diff_segment() {
        let mut p = DiarizationProcessor::new();
        let segments = p.process_final("안녕", &[]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker, None);
        assert_eq!(segments[0].text, "안녕");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 0.0);
    }

    #[test]
    fn new_suffix_with_no_common_prefix_returns_whole_string() {
        assert_eq!(new_suffix("abc", "xyz"), "xyz");
    }

    #[test]
    fn segment_key_is_stable_and_sensitive_to_every_field() {
        let base = Segment { speaker: Some(1), text: "안녕하세요.".to_string(), start: 0.2, end: 1.1 };
        assert_eq!(segment_key(&base), segment_key(&base.clone()));

        let different_text = Segment { text: "다릅니다.".to_string(), ..base.clone() };
        assert_ne!(segment_key(&base), segment_key(&different_text));

        let different_speaker = Segment { speaker: Some(2), ..base.clone() };
        assert_ne!(segment_key(&base), segment_key(&different_speaker));

        let different_start = Segment { start: 0.3, ..base.clone() };
        assert_ne!(segment_key(&base), segment_key(&different_start));
    }

    #[test]
    fn new_suffix_strips_common_prefix() {
        assert_eq!(new_suffix("안녕", "안녕하세요."), "하세요.");
    }
}
