use regex::Regex;
use std::sync::OnceLock;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// A complete model response split into its reasoning and answer parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentedMessage {
    pub thinking: String,
    pub visible: String,
}

fn think_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // (?s) so the thinking body may span newlines; non-greedy body so only
        // the first close marker ends it.
        let pattern = format!(
            "(?s){}(.*?){}(.*)",
            regex::escape(THINK_OPEN),
            regex::escape(THINK_CLOSE)
        );
        Regex::new(&pattern).expect("think regex is valid")
    })
}

/// Split a complete response into `{thinking, visible}`.
///
/// Only the first `<think>…</think>` region is honored; anything after its
/// closing marker is visible content even if it looks like another marker.
/// With no markers, the whole (trimmed) input is visible.
pub fn segment(text: &str) -> SegmentedMessage {
    if let Some(caps) = think_regex().captures(text) {
        SegmentedMessage {
            thinking: caps[1].trim().to_string(),
            visible: caps[2].trim().to_string(),
        }
    } else {
        SegmentedMessage {
            thinking: String::new(),
            visible: text.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        let out = segment("<think>REASON</think>ANSWER");
        assert_eq!(out.thinking, "REASON");
        assert_eq!(out.visible, "ANSWER");
    }

    #[test]
    fn test_no_markers_passthrough() {
        let out = segment("  just an answer  ");
        assert_eq!(out.thinking, "");
        assert_eq!(out.visible, "just an answer");
    }

    #[test]
    fn test_multiline_thinking_body() {
        let out = segment("<think>line one\nline two</think>\n\nThe answer.");
        assert_eq!(out.thinking, "line one\nline two");
        assert_eq!(out.visible, "The answer.");
    }

    #[test]
    fn test_only_first_pair_honored() {
        let out = segment("<think>A</think>B<think>C</think>D");
        assert_eq!(out.thinking, "A");
        assert_eq!(out.visible, "B<think>C</think>D");
    }

    #[test]
    fn test_idempotent_on_visible_output() {
        let first = segment("<think>hm</think> 42 ");
        let second = segment(&first.visible);
        assert_eq!(second.thinking, "");
        assert_eq!(second.visible, first.visible);
    }

    #[test]
    fn test_empty_thinking_section() {
        let out = segment("<think></think>answer");
        assert_eq!(out.thinking, "");
        assert_eq!(out.visible, "answer");
    }

    #[test]
    fn test_unclosed_marker_is_visible() {
        let out = segment("<think>never closed");
        assert_eq!(out.thinking, "");
        assert_eq!(out.visible, "<think>never closed");
    }

    #[test]
    fn test_empty_input() {
        let out = segment("");
        assert_eq!(out, SegmentedMessage::default());
    }
}
