//! Text segmentation for pipelined synthesis.
//!
//! Splits text into short, punctuation-aligned chunks. Short chunks reach the
//! backend faster, so the first one can start playing while the rest are
//! still being synthesized.

use serde::{Deserialize, Serialize};

/// Characters that end a piece. The full-width comma `，` is not one.
const DELIMITERS: &[char] = &[
    '。', '！', '？', '；', '：', ',', '.', '!', '?', ';', ':',
];

/// Length bounds for [`segment`], measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Soft upper bound. A piece longer than this is force-broken.
    pub max_chars: usize,

    /// Pieces shorter than this merge forward into their successor.
    pub min_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: 80,
            min_chars: 25,
        }
    }
}

/// Split `text` into ordered chunks.
///
/// Deterministic and infallible. Returns an empty vector only for blank
/// input; callers reject that case before segmenting.
#[must_use]
pub fn segment(text: &str, config: &SegmenterConfig) -> Vec<String> {
    let max = config.max_chars.max(1);
    let pieces = split_pieces(text, max);

    let mut chunks = Vec::with_capacity(pieces.len());
    let mut pending = String::new();
    let mut pending_len = 0;

    for piece in pieces {
        let piece_len = char_len(&piece);

        if pending_len > 0 && pending_len + seam_len(&pending, &piece) + piece_len > max {
            chunks.push(std::mem::take(&mut pending));
            pending_len = 0;
        }

        pending_len += seam_len(&pending, &piece) + piece_len;
        join_into(&mut pending, &piece);

        if pending_len >= config.min_chars {
            chunks.push(std::mem::take(&mut pending));
            pending_len = 0;
        }
    }

    if !pending.is_empty() {
        chunks.push(pending);
    }

    if chunks.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }

    chunks
}

// ── Internal helpers ───────────────────────────────────────────────

/// First pass: cut after every delimiter, force-breaking anything over `max`.
fn split_pieces(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if DELIMITERS.contains(&c) {
            flush_piece(&mut pieces, &mut current, max);
        }
    }
    flush_piece(&mut pieces, &mut current, max);

    pieces
}

fn flush_piece(pieces: &mut Vec<String>, current: &mut String, max: usize) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        if char_len(trimmed) > max {
            pieces.extend(hard_split(trimmed, max));
        } else {
            pieces.push(trimmed.to_string());
        }
    }
    current.clear();
}

/// Break an over-long, delimiter-free run. Prefers whitespace; a single
/// token longer than `max` is cut at character boundaries.
fn hard_split(text: &str, max: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = char_len(word);

        if word_len > max {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for window in chars.chunks(max) {
                out.push(window.iter().collect());
            }
            continue;
        }

        let sep = usize::from(!current.is_empty());
        if current_len + sep + word_len > max {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        out.push(current);
    }

    out
}

/// Whether joining `left` and `right` needs a space at the seam.
fn needs_space(left: &str, right: &str) -> bool {
    matches!(
        (left.chars().next_back(), right.chars().next()),
        (Some(l), Some(r)) if l.is_ascii() && r.is_ascii()
    )
}

fn seam_len(left: &str, right: &str) -> usize {
    usize::from(needs_space(left, right))
}

fn join_into(acc: &mut String, piece: &str) {
    if needs_space(acc, piece) {
        acc.push(' ');
    }
    acc.push_str(piece);
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_chars: usize, min_chars: usize) -> SegmenterConfig {
        SegmenterConfig {
            max_chars,
            min_chars,
        }
    }

    #[test]
    fn short_cjk_pieces_merge_into_one_chunk() {
        let chunks = segment("你好，世界。今天天气不错！", &cfg(80, 25));
        assert_eq!(chunks, vec!["你好，世界。今天天气不错！"]);
    }

    #[test]
    fn breaks_at_punctuation_once_minimum_is_met() {
        let text = "The quick brown fox jumps over the lazy dog. \
                    Pack my box with five dozen liquor jugs! \
                    How vexingly quick daft zebras jump?";
        let chunks = segment(text, &cfg(80, 25));
        assert_eq!(
            chunks,
            vec![
                "The quick brown fox jumps over the lazy dog.",
                "Pack my box with five dozen liquor jugs!",
                "How vexingly quick daft zebras jump?",
            ]
        );
    }

    #[test]
    fn ascii_pieces_are_joined_with_a_space() {
        let chunks = segment("Hi.Yes.Okay then, let us begin the reading now.", &cfg(80, 25));
        assert_eq!(chunks, vec!["Hi. Yes. Okay then, let us begin the reading now."]);
    }

    #[test]
    fn trailing_short_piece_is_kept() {
        let chunks = segment("This first sentence is long enough to stand alone. Ok.", &cfg(80, 25));
        assert_eq!(
            chunks,
            vec!["This first sentence is long enough to stand alone.", "Ok."]
        );
    }

    #[test]
    fn long_run_without_punctuation_is_force_broken() {
        let text = "word ".repeat(60);
        let chunks = segment(&text, &cfg(80, 25));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 80, "chunk too long: {}", char_len(chunk));
        }
    }

    #[test]
    fn unspaced_cjk_run_is_cut_at_char_boundaries() {
        let text = "啊".repeat(200);
        let chunks = segment(&text, &cfg(80, 25));
        assert_eq!(chunks.len(), 3);
        assert_eq!(char_len(&chunks[0]), 80);
        assert_eq!(char_len(&chunks[2]), 40);
    }

    #[test]
    fn merging_never_crosses_the_maximum() {
        let text = "Tiny. ".to_string() + &"x".repeat(78) + ".";
        let chunks = segment(&text, &cfg(80, 25));
        for chunk in &chunks {
            assert!(char_len(chunk) <= 80);
        }
        assert_eq!(chunks[0], "Tiny.");
    }

    #[test]
    fn segmentation_is_deterministic() {
        let text = "第一句话。第二句话比较长一些，需要更多的字符来填充！第三句？最后。";
        let a = segment(text, &SegmenterConfig::default());
        let b = segment(text, &SegmenterConfig::default());
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(segment("   \n\t", &SegmenterConfig::default()).is_empty());
    }
}
