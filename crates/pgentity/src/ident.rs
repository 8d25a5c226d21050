//! Identifier quoting, literal escaping and placeholder rendering.
//!
//! A [`Dialect`] describes how a backend quotes identifiers and how bound
//! parameters are written into statement text:
//!
//! - PostgreSQL: `"name"` and numbered `$1, $2, ...` placeholders
//! - MySQL: `` `name` `` and positional `?` placeholders
//!
//! Identifiers are never bound as parameters (neither backend allows it), so
//! every table and column name goes through [`Dialect::escape_identifier`].

use std::fmt::Write;

/// How bound parameters appear in statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ...
    Numbered,
    /// `?` for every parameter, in order.
    Positional,
}

/// Quoting and placeholder rules of a SQL backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    pub quote: char,
    pub placeholder: PlaceholderStyle,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::POSTGRES
    }
}

impl Dialect {
    pub const POSTGRES: Dialect = Dialect {
        name: "postgresql",
        quote: '"',
        placeholder: PlaceholderStyle::Numbered,
    };

    pub const MYSQL: Dialect = Dialect {
        name: "mysql",
        quote: '`',
        placeholder: PlaceholderStyle::Positional,
    };

    /// Wrap `name` in the dialect quote character.
    ///
    /// An embedded quote character is doubled; NUL characters are dropped since
    /// neither backend accepts them inside identifiers.
    pub fn escape_identifier(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_identifier(&mut out, name);
        out
    }

    pub(crate) fn write_identifier(&self, out: &mut String, name: &str) {
        out.push(self.quote);
        for ch in name.chars() {
            if ch == '\0' {
                continue;
            }
            if ch == self.quote {
                out.push(ch);
            }
            out.push(ch);
        }
        out.push(self.quote);
    }

    /// Render the placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        let mut out = String::new();
        self.write_placeholder(&mut out, n);
        out
    }

    pub(crate) fn write_placeholder(&self, out: &mut String, n: usize) {
        match self.placeholder {
            PlaceholderStyle::Numbered => {
                let _ = write!(out, "${n}");
            }
            PlaceholderStyle::Positional => out.push('?'),
        }
    }
}

/// Escape a value for inclusion inside a quoted string literal.
///
/// Only used where a statement is rendered without bound parameters (debug
/// output). Statements sent to the database always bind their values.
pub fn escape_literal(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\x08' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\x1a' => out.push_str("\\z"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' | '\'' | '\\' | '%' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_simple_identifier() {
        assert_eq!(Dialect::POSTGRES.escape_identifier("users"), r#""users""#);
        assert_eq!(Dialect::MYSQL.escape_identifier("users"), "`users`");
    }

    #[test]
    fn doubles_embedded_quote() {
        assert_eq!(
            Dialect::POSTGRES.escape_identifier(r#"we"ird"#),
            r#""we""ird""#
        );
        assert_eq!(Dialect::MYSQL.escape_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn injection_attempt_stays_inside_quotes() {
        let quoted = Dialect::POSTGRES.escape_identifier(r#"x"; DROP TABLE users; --"#);
        assert_eq!(quoted, r#""x""; DROP TABLE users; --""#);
    }

    #[test]
    fn drops_nul() {
        assert_eq!(Dialect::POSTGRES.escape_identifier("a\0b"), r#""ab""#);
    }

    #[test]
    fn placeholder_styles() {
        assert_eq!(Dialect::POSTGRES.placeholder(3), "$3");
        assert_eq!(Dialect::MYSQL.placeholder(3), "?");
    }

    #[test]
    fn escapes_literal_specials() {
        assert_eq!(escape_literal("it's"), r"it\'s");
        assert_eq!(escape_literal("50%"), r"50\%");
        assert_eq!(escape_literal("a\nb\tc"), r"a\nb\tc");
        assert_eq!(escape_literal("\0\x1a\r\x08"), r"\0\z\r\b");
        assert_eq!(escape_literal(r#"back\slash "q""#), r#"back\\slash \"q\""#);
    }
}
