//! Line grammar for generator output.
//!
//! The model is asked for one draft per line. After fence lines are dropped,
//! every non-empty line is classified and only `Draft` lines are kept, in
//! the order they appeared.

use trendcaster_core::char_len;

/// Lines at or below this many characters are not drafts
pub const MIN_LINE_CHARS: usize = 10;

const STRUCTURAL_PREFIXES: [char; 5] = ['{', '}', '[', ']', '"'];
const LABEL_PREFIXES: [&str; 3] = ["tweet", "TWEET", "Tweet"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A code fence such as "```" or "```json"
    Fence,
    /// JSON or list scaffolding
    Structural,
    /// A "Tweet 1:" style label
    Label,
    TooShort,
    Draft,
}

/// Classify a single, already trimmed, non-empty line
pub fn classify_line(line: &str) -> LineKind {
    if line.starts_with("```") {
        LineKind::Fence
    } else if line.starts_with(&STRUCTURAL_PREFIXES[..]) {
        LineKind::Structural
    } else if LABEL_PREFIXES.iter().any(|label| line.starts_with(label)) {
        LineKind::Label
    } else if char_len(line) <= MIN_LINE_CHARS {
        LineKind::TooShort
    } else {
        LineKind::Draft
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub drafts: Vec<String>,
    pub rejected: Vec<(LineKind, String)>,
}

impl ParseReport {
    pub fn rejected_count(&self, kind: LineKind) -> usize {
        self.rejected.iter().filter(|(k, _)| *k == kind).count()
    }
}

pub fn parse_drafts(raw: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match classify_line(line) {
            LineKind::Draft => report.drafts.push(line.to_string()),
            kind => report.rejected.push((kind, line.to_string())),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("```json"), LineKind::Fence);
        assert_eq!(classify_line("{\"text\": \"hi\"}"), LineKind::Structural);
        assert_eq!(classify_line("]"), LineKind::Structural);
        assert_eq!(classify_line("\"quoted opener that is long\""), LineKind::Structural);
        assert_eq!(classify_line("Tweet 1: something clever"), LineKind::Label);
        assert_eq!(classify_line("TWEET 2"), LineKind::Label);
        assert_eq!(classify_line("tweet three goes here"), LineKind::Label);
        assert_eq!(classify_line("Too short"), LineKind::TooShort);
        assert_eq!(classify_line("exactly 11!"), LineKind::Draft);
    }

    #[test]
    fn test_ten_characters_is_too_short() {
        assert_eq!(classify_line("0123456789"), LineKind::TooShort);
        assert_eq!(classify_line("ééééééééééé"), LineKind::Draft);
    }

    #[test]
    fn test_parse_fenced_output() {
        let raw = "```\nStop waiting for Monday to start. #Motivation\n\n```\n";
        let report = parse_drafts(raw);
        assert_eq!(
            report.drafts,
            vec!["Stop waiting for Monday to start. #Motivation"]
        );
        assert_eq!(report.rejected_count(LineKind::Fence), 2);
    }

    #[test]
    fn test_parse_keeps_order_and_trims() {
        let raw = "  First draft line here  \nTweet 2:\nSecond draft line here\n[\nThird draft line here";
        let report = parse_drafts(raw);
        assert_eq!(
            report.drafts,
            vec![
                "First draft line here",
                "Second draft line here",
                "Third draft line here"
            ]
        );
        assert_eq!(report.rejected.len(), 2);
    }

    #[test]
    fn test_parse_empty_output() {
        let report = parse_drafts("");
        assert!(report.drafts.is_empty());
        assert!(report.rejected.is_empty());
    }
}
