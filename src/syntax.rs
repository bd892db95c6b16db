//! # Syntax
//!
//! The compiled-in syntax highlighting database: one `Conf` per supported language, selected by
//! matching a file name against the language's extensions or name substrings.

use std::fmt::{self, Display, Formatter};

/// Type of syntax highlighting for a single rendered character.
///
/// Each `HlType` is associated with a color, via its discriminant. The ANSI color is equal to the
/// discriminant, modulo 100. The colors are described here:
/// <https://en.wikipedia.org/wiki/ANSI_escape_code#Colors>
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HlType {
    Normal = 39,      // Default foreground color
    Number = 31,      // Red
    Match = 46,       // Cyan background
    String = 32,      // Green
    Comment = 34,     // Blue
    MlComment = 134,  // Blue
    Keyword1 = 33,    // Yellow
    Keyword2 = 35,    // Magenta
}

impl Display for HlType {
    /// Write the ANSI color escape sequence for the `HlType` using the given formatter.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "\x1b[{}m", (*self as u32) % 100) }
}

/// Configuration for syntax highlighting of one language.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Conf {
    /// The name of the language, e.g. "C".
    pub name: &'static str,
    /// Whether to highlight numbers.
    pub highlight_numbers: bool,
    /// Whether to highlight single- and double-quoted strings.
    pub highlight_strings: bool,
    /// The tokens that start a single-line comment, e.g. "//".
    pub sl_comment_start: &'static [&'static str],
    /// The tokens that start and end a multi-line comment, e.g. ("/*", "*/").
    pub ml_comment_delims: Option<(&'static str, &'static str)>,
    /// Keywords to highlight, split into `Keyword1` and `Keyword2` classes. A raw keyword entry
    /// ending in `|` belongs to `Keyword2`; the marker is stripped before matching.
    pub keywords: Vec<(HlType, &'static str)>,
}

/// A raw entry in the compiled-in syntax database.
struct Entry {
    name: &'static str,
    extensions: &'static [&'static str],
    highlight_numbers: bool,
    highlight_strings: bool,
    sl_comment_start: &'static [&'static str],
    ml_comment_delims: Option<(&'static str, &'static str)>,
    /// Raw keyword list. An entry ending in `|` is `Keyword2`, otherwise `Keyword1`.
    keywords: &'static [&'static str],
}

/// Partition a raw keyword list into `(HlType, stripped keyword)` pairs, following the trailing
/// `|` convention (carried over from the original C `editorSyntax` keyword arrays).
fn partition_keywords(raw: &'static [&'static str]) -> Vec<(HlType, &'static str)> {
    raw.iter()
        .map(|kw| match kw.strip_suffix('|') {
            Some(stripped) => (HlType::Keyword2, stripped),
            None => (HlType::Keyword1, *kw),
        })
        .collect()
}

impl From<&Entry> for Conf {
    fn from(entry: &Entry) -> Self {
        Self {
            name: entry.name,
            highlight_numbers: entry.highlight_numbers,
            highlight_strings: entry.highlight_strings,
            sl_comment_start: entry.sl_comment_start,
            ml_comment_delims: entry.ml_comment_delims,
            keywords: partition_keywords(entry.keywords),
        }
    }
}

const C_KEYWORDS: &[&str] = &[
    "switch", "if", "while", "for", "break", "continue", "return", "else", "struct", "union",
    "typedef", "static", "enum", "class", "case", "#include", "#define",
    "int|", "long|", "double|", "float|", "char|", "unsigned|", "signed|", "void|",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "while", "for", "break", "continue", "return", "import",
    "from", "as", "with", "try", "except", "finally", "raise", "pass", "lambda", "yield", "global",
    "nonlocal", "assert", "del", "and", "or", "not", "in", "is",
    "None|", "True|", "False|", "self|",
];

const JS_KEYWORDS: &[&str] = &[
    "function", "var", "let", "const", "if", "else", "for", "while", "break", "continue", "return",
    "switch", "case", "default", "class", "extends", "new", "try", "catch", "finally", "throw",
    "typeof", "instanceof", "import", "export", "from", "async", "await",
    "true|", "false|", "null|", "undefined|", "this|",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern", "fn", "for", "if",
    "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self",
    "Self", "static", "struct", "super", "trait", "type", "unsafe", "use", "where", "while", "async",
    "await", "yield",
    "bool|", "char|", "str|", "u8|", "u16|", "u32|", "u64|", "u128|", "usize|", "i8|", "i16|",
    "i32|", "i64|", "i128|", "isize|", "f32|", "f64|", "String|", "Vec|", "Option|", "Result|",
    "true|", "false|",
];

/// The compiled-in syntax database. The first entry whose extension or name pattern matches the
/// file name wins.
static SYNTAX_DATABASE: &[Entry] = &[
    Entry {
        name: "C",
        extensions: &[".c", ".h", ".cpp"],
        highlight_numbers: true,
        highlight_strings: true,
        sl_comment_start: &["//"],
        ml_comment_delims: Some(("/*", "*/")),
        keywords: C_KEYWORDS,
    },
    Entry {
        name: "PHP",
        extensions: &[".php"],
        highlight_numbers: true,
        highlight_strings: true,
        sl_comment_start: &["//", "#"],
        ml_comment_delims: Some(("/*", "*/")),
        keywords: C_KEYWORDS,
    },
    Entry {
        name: "JavaScript",
        extensions: &[".js"],
        highlight_numbers: true,
        highlight_strings: true,
        sl_comment_start: &["//"],
        ml_comment_delims: Some(("/*", "*/")),
        keywords: JS_KEYWORDS,
    },
    Entry {
        name: "Python",
        extensions: &[".py"],
        highlight_numbers: true,
        highlight_strings: true,
        sl_comment_start: &["#"],
        ml_comment_delims: None,
        keywords: PYTHON_KEYWORDS,
    },
    Entry {
        name: "Rust",
        extensions: &[".rs"],
        highlight_numbers: true,
        highlight_strings: true,
        sl_comment_start: &["//"],
        ml_comment_delims: Some(("/*", "*/")),
        keywords: RUST_KEYWORDS,
    },
];

impl Conf {
    /// Return the syntax configuration matching `file_name`, if any: either by a dotted-extension
    /// pattern matching the name's last `.`-suffix, or by a substring match against the full name.
    /// The first entry in the database that matches wins.
    #[must_use]
    pub fn find(file_name: &str) -> Option<Self> {
        SYNTAX_DATABASE
            .iter()
            .find(|entry| {
                entry.extensions.iter().any(|pat| {
                    if let Some(ext) = pat.strip_prefix('.') {
                        file_name.rsplit('.').next().is_some_and(|suffix| suffix == ext)
                    } else {
                        file_name.contains(pat)
                    }
                })
            })
            .map(Conf::from)
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn find_by_extension() {
        let conf = Conf::find("main.c").expect("should match the C syntax");
        assert_eq!(conf.name, "C");
        let conf = Conf::find("src/lib.rs").expect("should match the Rust syntax");
        assert_eq!(conf.name, "Rust");
    }

    #[test]
    fn find_no_match() {
        assert!(Conf::find("README.md").is_none());
        assert!(Conf::find("Makefile").is_none());
    }

    #[test]
    fn keyword_partition_splits_on_trailing_pipe() {
        let conf = Conf::find("main.c").expect("should match the C syntax");
        assert!(conf.keywords.contains(&(HlType::Keyword1, "if")));
        assert!(conf.keywords.contains(&(HlType::Keyword2, "int")));
        assert!(!conf.keywords.iter().any(|&(_, kw)| kw.ends_with('|')));
    }
}
