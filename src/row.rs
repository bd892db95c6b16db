//! # Row
//!
//! Utilities for rows. A `Row` owns the underlying characters, the rendered
//! string and the syntax highlighting information.

use std::{fmt::Write, iter::repeat_n};

use unicode_width::UnicodeWidthChar;

use crate::ansi_escape::{RESET_FMT, REVERSE_VIDEO};
use crate::error::Error;
use crate::syntax::{Conf as SyntaxConf, HlType};

/// The "Highlight State" of the row
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum HlState {
    /// Normal state.
    #[default]
    Normal,
    /// A multi-line comment has been open, but not yet closed.
    MultiLineComment,
    /// A string has been open with the given quote character (for instance
    /// b'\'' or b'"'), but not yet closed.
    String(u8),
}

/// Quote characters recognized when `syntax.highlight_strings` is set.
const STRING_QUOTES: [u8; 2] = [b'"', b'\''];

/// Represents a row of characters and how it is rendered.
#[derive(Default)]
pub struct Row {
    /// The characters of the row.
    pub chars: Vec<u8>,
    /// How the characters are rendered. In particular, tabs are converted into
    /// several spaces, and bytes may be combined into single UTF-8
    /// characters.
    render: String,
    /// Mapping from indices in `self.chars` to the corresponding indices in
    /// `self.render`.
    pub cx2rx: Vec<usize>,
    /// Mapping from indices in `self.render` to the corresponding indices in
    /// `self.chars`.
    pub rx2cx: Vec<usize>,
    /// The vector of `HLType` for each rendered character.
    hl: Vec<HlType>,
    /// The final state of the row.
    pub hl_state: HlState,
    /// If not `None`, the range that is currently matched during a FIND
    /// operation.
    pub match_segment: Option<std::ops::Range<usize>>,
}

impl Row {
    /// Create a new row, containing characters `chars`.
    pub fn new(chars: Vec<u8>) -> Self { Self { chars, cx2rx: vec![0], ..Self::default() } }

    /// Update the row: convert tabs into spaces and compute highlight symbols
    /// The `hl_state` argument is the `HLState` for the previous row.
    pub fn update(&mut self, syntax: &SyntaxConf, hl_state: HlState, tab: usize) -> HlState {
        let (..) = (self.render.clear(), self.cx2rx.clear(), self.rx2cx.clear());
        let (mut cx, mut rx) = (0, 0);
        for c in String::from_utf8_lossy(&self.chars).chars() {
            // The number of rendered characters
            let n_rend_chars = if c == '\t' { tab - (rx % tab) } else { c.width().unwrap_or(1) };
            self.render.push_str(&(if c == '\t' { " ".repeat(n_rend_chars) } else { c.into() }));
            self.cx2rx.extend(repeat_n(rx, c.len_utf8()));
            self.rx2cx.extend(repeat_n(cx, n_rend_chars));
            (rx, cx) = (rx + n_rend_chars, cx + c.len_utf8());
        }
        let (..) = (self.cx2rx.push(rx), self.rx2cx.push(cx));
        self.update_syntax(syntax, hl_state)
    }

    /// Obtain the character size, in bytes, given its position in
    /// `self.render`. This is done in constant time by using the difference
    /// between `self.rx2cx[rx]` and the cx for the next character.
    pub fn get_char_size(&self, rx: usize) -> usize {
        let cx0 = self.rx2cx[rx];
        self.rx2cx.iter().skip(rx + 1).map(|cx| cx - cx0).find(|d| *d > 0).unwrap_or(1)
    }

    /// Update the syntax highlighting types of the row.
    fn update_syntax(&mut self, syntax: &SyntaxConf, mut hl_state: HlState) -> HlState {
        self.hl.clear();
        let line = self.render.as_bytes();

        let ml_comment_delims = syntax.ml_comment_delims;

        'syntax_loop: while self.hl.len() < line.len() {
            let i = self.hl.len();
            let find_str = |s: &str| line.get(i..(i + s.len())).is_some_and(|r| r.eq(s.as_bytes()));

            if hl_state == HlState::Normal && syntax.sl_comment_start.iter().any(|s| find_str(s)) {
                self.hl.extend(repeat_n(HlType::Comment, line.len() - i));
                continue;
            }

            if let Some((start, end)) = ml_comment_delims {
                if hl_state == HlState::MultiLineComment {
                    if find_str(end) {
                        self.hl.extend(repeat_n(HlType::MlComment, end.len()));
                        hl_state = HlState::Normal;
                    } else {
                        self.hl.push(HlType::MlComment);
                    }
                    continue;
                } else if hl_state == HlState::Normal && find_str(start) {
                    self.hl.extend(repeat_n(HlType::MlComment, start.len()));
                    hl_state = HlState::MultiLineComment;
                    continue;
                }
            }

            let c = line[i];

            // At this point, hl_state is Normal or String
            if let HlState::String(quote) = hl_state {
                self.hl.push(HlType::String);
                if c == quote {
                    hl_state = HlState::Normal;
                } else if c == b'\\' && i != line.len() - 1 {
                    self.hl.push(HlType::String);
                }
                continue;
            } else if syntax.highlight_strings && STRING_QUOTES.contains(&c) {
                hl_state = HlState::String(c);
                self.hl.push(HlType::String);
                continue;
            }

            let prev_sep = (i == 0) || is_sep(line[i - 1]);

            if syntax.highlight_numbers
                && ((c.is_ascii_digit() && prev_sep)
                    || (i != 0 && self.hl[i - 1] == HlType::Number && !prev_sep && !is_sep(c))
                    || (i != 0 && self.hl[i - 1] == HlType::Number && c == b'.'))
            {
                self.hl.push(HlType::Number);
                continue;
            }

            if prev_sep {
                // This filter makes sure that names such as "in_comment" are not partially
                // highlighted (even though "in" is a keyword in rust). The argument is the
                // keyword that is matched at `i`.
                let s_filter = |kw: &str| line.get(i + kw.len()).is_none_or(|c| is_sep(*c));
                let matched = syntax.keywords.iter().find(|(_, kw)| find_str(kw) && s_filter(kw));
                if let Some(&(keyword_highlight_type, keyword)) = matched {
                    self.hl.extend(repeat_n(keyword_highlight_type, keyword.len()));
                    continue 'syntax_loop;
                }
            }

            self.hl.push(HlType::Normal);
        }

        // String state doesn't propagate to the next row
        self.hl_state =
            if matches!(hl_state, HlState::String(_)) { HlState::Normal } else { hl_state };
        self.hl_state
    }

    /// Draw the row and write the result to a buffer. An `offset` can be given,
    /// as well as a limit on the length of the row (`max_len`). After
    /// writing the characters, clear the rest of the line and move the
    /// cursor to the start of the next line.
    pub fn draw(&self, offset: usize, max_len: usize, buffer: &mut String) -> Result<(), Error> {
        let mut current_hl_type = HlType::Normal;
        let chars = self.render.chars().skip(offset).take(max_len);
        let mut rx = self.render.chars().take(offset).map(|c| c.width().unwrap_or(1)).sum();
        for (c, mut hl_type) in chars.zip(self.hl.iter().skip(offset)) {
            if c.is_ascii_control() {
                let rendered_char = if (c as u8) <= 26 { (b'@' + c as u8) as char } else { '?' };
                write!(buffer, "{REVERSE_VIDEO}{rendered_char}{RESET_FMT}")?;
                // Restore previous color
                if current_hl_type != HlType::Normal {
                    buffer.push_str(&current_hl_type.to_string());
                }
            } else {
                if let Some(match_segment) = &self.match_segment {
                    if match_segment.contains(&rx) {
                        // Set the highlight type to Match, i.e. set the background to cyan
                        hl_type = &HlType::Match;
                    } else if rx == match_segment.end {
                        // Reset the formatting, in particular the background
                        buffer.push_str(RESET_FMT);
                    }
                }
                if current_hl_type != *hl_type {
                    buffer.push_str(&hl_type.to_string());
                    current_hl_type = *hl_type;
                }
                buffer.push(c);
            }
            rx += c.width().unwrap_or(1);
        }
        buffer.push_str(RESET_FMT);
        Ok(())
    }
}

/// Return whether `c` is an ASCII separator.
const fn is_sep(c: u8) -> bool {
    c.is_ascii_whitespace() || c == b'\0' || (c.is_ascii_punctuation() && c != b'_')
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "test assertions")]
mod tests {
    use super::*;

    fn default_syntax_conf() -> SyntaxConf {
        SyntaxConf {
            name: "test_lang",
            highlight_numbers: true,
            highlight_strings: false,
            sl_comment_start: &[],
            ml_comment_delims: None,
            keywords: Vec::new(),
        }
    }

    #[test]
    fn update_simple_ascii() {
        let mut row = Row::new("hello".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(row.render, "hello");
        assert_eq!(row.chars, "hello".as_bytes());
        assert_eq!(row.cx2rx, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(row.rx2cx, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn update_empty_line() {
        let mut row = Row::new(Vec::new());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(row.render, "");
        assert_eq!(row.cx2rx, vec![0]);
        assert_eq!(row.rx2cx, vec![0]);
    }

    #[test]
    fn update_tab_expansion() {
        let mut row = Row::new("a\tb".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(row.render, "a   b");
        assert_eq!(row.cx2rx, vec![0, 1, 4, 5]);
        assert_eq!(row.rx2cx, vec![0, 1, 1, 1, 2, 3]);
    }

    #[test]
    fn update_unicode() {
        let mut row = Row::new("こんにちは".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(row.render, "こんにちは");
        assert_eq!(row.cx2rx.last(), Some(&10));
        assert_eq!(row.rx2cx.last(), Some(&15));
    }

    #[test]
    fn syntax_single_line_comment() {
        let mut row = Row::new("code // comment".as_bytes().to_vec());
        let mut syntax_conf = default_syntax_conf();
        syntax_conf.sl_comment_start = &["//"];
        row.update(&syntax_conf, HlState::Normal, 4);

        let mut expected = vec![HlType::Normal; "code ".len()];
        expected.extend(vec![HlType::Comment; "// comment".len()]);
        assert_eq!(row.hl, expected);
        assert_eq!(row.hl_state, HlState::Normal);
    }

    #[test]
    fn syntax_multi_line_comment_spans_rows() {
        let mut syntax_conf = default_syntax_conf();
        syntax_conf.ml_comment_delims = Some(("/*", "*/"));

        let mut row1 = Row::new("code /* comment".as_bytes().to_vec());
        let state1 = row1.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(state1, HlState::MultiLineComment);

        let mut row2 = Row::new(" still comment */ code".as_bytes().to_vec());
        let state2 = row2.update(&syntax_conf, state1, 4);
        assert_eq!(state2, HlState::Normal);
        let mut expected = vec![HlType::MlComment; " still comment */".len()];
        expected.extend(vec![HlType::Normal; " code".len()]);
        assert_eq!(row2.hl, expected);
    }

    #[test]
    fn syntax_strings() {
        let mut syntax_conf = default_syntax_conf();
        syntax_conf.highlight_strings = true;

        let mut row = Row::new("text \"string\" end".as_bytes().to_vec());
        row.update(&syntax_conf, HlState::Normal, 4);
        let mut expected = vec![HlType::Normal; "text ".len()];
        expected.extend(vec![HlType::String; "\"string\"".len()]);
        expected.extend(vec![HlType::Normal; " end".len()]);
        assert_eq!(row.hl, expected);
        assert_eq!(row.hl_state, HlState::Normal);

        let mut unterminated = Row::new("text \"open string".as_bytes().to_vec());
        let final_state = unterminated.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(final_state, HlState::Normal);
    }

    #[test]
    fn syntax_keywords_respect_word_boundaries() {
        let mut syntax_conf = default_syntax_conf();
        syntax_conf.keywords = vec![(HlType::Keyword1, "fn"), (HlType::Keyword2, "true")];

        let mut row = Row::new("fn get_true()".as_bytes().to_vec());
        row.update(&syntax_conf, HlState::Normal, 4);
        let mut expected = vec![HlType::Keyword1; "fn".len()];
        expected.extend(vec![HlType::Normal; " get_true()".len()]);
        assert_eq!(row.hl, expected);
    }

    #[test]
    fn syntax_numbers() {
        let mut row = Row::new("123 val 4.56".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);

        let mut expected = vec![HlType::Number; "123".len()];
        expected.extend(vec![HlType::Normal; " val ".len()]);
        expected.extend(vec![HlType::Number; "4.56".len()]);
        assert_eq!(row.hl, expected);
    }

    #[test]
    fn get_char_size_unicode() {
        let mut row = Row::new("a世b".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);
        assert_eq!(row.get_char_size(0), 1);
        assert_eq!(row.get_char_size(1), 3);
        assert_eq!(row.get_char_size(3), 1);
    }

    #[test]
    fn draw_simple_ascii() {
        let mut row = Row::new("hello".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);

        let mut buffer = String::new();
        row.draw(0, 5, &mut buffer).expect("draw should not fail on a String buffer");
        assert_eq!(buffer, format!("hello{RESET_FMT}"));

        buffer.clear();
        row.draw(2, 3, &mut buffer).expect("draw should not fail on a String buffer");
        assert_eq!(buffer, format!("llo{RESET_FMT}"));
    }

    #[test]
    fn draw_control_characters() {
        let mut row = Row::new(b"a\x01b".to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);

        let mut buffer = String::new();
        row.draw(0, row.render.len(), &mut buffer).expect("draw should not fail on a String buffer");
        assert_eq!(buffer, format!("a{REVERSE_VIDEO}A{RESET_FMT}b{RESET_FMT}"));
    }

    #[test]
    fn draw_match_segment() {
        let mut row = Row::new("find this text".as_bytes().to_vec());
        let syntax_conf = default_syntax_conf();
        row.update(&syntax_conf, HlState::Normal, 4);
        row.match_segment = Some(5..9);

        let mut buffer = String::new();
        row.draw(0, row.render.len(), &mut buffer).expect("draw should not fail on a String buffer");
        let expected = format!(
            "find {}this{}{} text{RESET_FMT}",
            HlType::Match,
            RESET_FMT,
            HlType::Normal,
        );
        assert_eq!(buffer, expected);
    }
}
