//! Splits raw input lines into segments and segments into fields.

use crate::options::ParserOptions;

/// Delimiter-based segment tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    delimiter: char,
    segment_terminator: Option<char>,
}

impl Tokenizer {
    pub fn new(delimiter: char, segment_terminator: Option<char>) -> Self {
        Self {
            delimiter,
            segment_terminator,
        }
    }

    pub fn from_options(options: &ParserOptions) -> Self {
        Self::new(options.delimiter, options.segment_terminator)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Split one physical line into its segments.
    ///
    /// Only the line ending (`\r`, `\n`) is dropped; field values keep their
    /// padding. With a terminator configured, the line is cut at every
    /// terminator and whitespace-only pieces are skipped, so both
    /// `BEG*00*SA~` and `ISA*..~GS*..~` work. Without one the whole line is a
    /// single segment. A blank line yields no segments.
    pub fn segments<'a>(&self, line: &'a str) -> Vec<&'a str> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        match self.segment_terminator {
            Some(terminator) => line
                .split(terminator)
                .filter(|s| !s.trim().is_empty())
                .collect(),
            None if line.trim().is_empty() => Vec::new(),
            None => vec![line],
        }
    }

    /// Split one segment into its fields. Field 0 is the segment code.
    pub fn fields<'a>(&self, segment: &'a str) -> Vec<&'a str> {
        segment.split(self.delimiter).collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::from_options(&ParserOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_keep_empty_positions() {
        let tokenizer = Tokenizer::default();

        assert_eq!(
            tokenizer.fields("N1*ST**92*1234"),
            vec!["N1", "ST", "", "92", "1234"]
        );
    }

    #[test]
    fn test_segments_strip_terminator_and_line_ending() {
        let tokenizer = Tokenizer::default();

        assert_eq!(tokenizer.segments("BEG*00*SA~\r\n"), vec!["BEG*00*SA"]);
        assert_eq!(tokenizer.segments("BEG*00*SA"), vec!["BEG*00*SA"]);
    }

    #[test]
    fn test_segments_keep_field_padding() {
        let tokenizer = Tokenizer::default();

        assert_eq!(
            tokenizer.segments("N1*ST*Acme   ~REF*DP*038  ~  \r\n"),
            vec!["N1*ST*Acme   ", "REF*DP*038  "]
        );
        assert_eq!(
            Tokenizer::new('*', None).segments("N1*ST*Acme   \r\n"),
            vec!["N1*ST*Acme   "]
        );
    }

    #[test]
    fn test_segments_split_packed_line() {
        let tokenizer = Tokenizer::default();

        assert_eq!(
            tokenizer.segments("GS*PO*1~ST*850*0001~\n"),
            vec!["GS*PO*1", "ST*850*0001"]
        );
    }

    #[test]
    fn test_blank_line_has_no_segments() {
        assert!(Tokenizer::default().segments("   \n").is_empty());
        assert!(Tokenizer::new('*', None).segments("\r\n").is_empty());
    }

    #[test]
    fn test_without_terminator_keeps_tilde() {
        let tokenizer = Tokenizer::new('|', None);

        assert_eq!(tokenizer.segments("MSG|a~b\n"), vec!["MSG|a~b"]);
        assert_eq!(tokenizer.fields("MSG|a~b"), vec!["MSG", "a~b"]);
    }
}
