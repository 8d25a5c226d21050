use super::{Statement, StatementKind};
use crate::compile::BuildContext;
use crate::error::{StoreError, StoreResult};
use crate::ident::Dialect;
use crate::query::NativeQuery;

/// Raw SQL passthrough.
///
/// Without bindings the text is used as is. With bindings every `?` in plain
/// SQL becomes the next dialect placeholder, and the number of markers must
/// equal the number of bindings. Markers inside string literals (`'...'`,
/// `E'...'`, `$tag$...$tag$`), quoted identifiers and comments are left alone.
pub fn native(cx: &BuildContext, native: &NativeQuery) -> StoreResult<Statement> {
    if native.bindings.is_empty() {
        return Ok(Statement {
            kind: StatementKind::Native,
            text: native.sql.clone(),
            values: Vec::new(),
        });
    }

    let (text, markers) = rewrite_markers(&cx.dialect, &native.sql);

    if markers != native.bindings.len() {
        return Err(StoreError::invalid_query(format!(
            "native$ has {} placeholder(s) but {} binding(s)",
            markers,
            native.bindings.len()
        )));
    }

    Ok(Statement {
        kind: StatementKind::Native,
        text,
        values: native.bindings.clone(),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Lex {
    Code,
    /// `'...'` or `"..."`; the quote is doubled to escape it.
    Quoted(char),
    /// `E'...'`, where backslash escapes the next char.
    Escaped,
    Dollar(Vec<char>),
    LineComment,
    BlockComment(usize),
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The `$tag$` opening at the start of `s`, if any.
fn dollar_tag(s: &[char]) -> Option<Vec<char>> {
    let mut end = 1;
    while end < s.len() && is_ident_char(s[end]) {
        end += 1;
    }
    let starts_with_digit = s.get(1).is_some_and(char::is_ascii_digit);
    (s.get(end) == Some(&'$') && !starts_with_digit).then(|| s[..=end].to_vec())
}

fn rewrite_markers(dialect: &Dialect, sql: &str) -> (String, usize) {
    let chars: Vec<char> = sql.chars().collect();
    let mut text = String::with_capacity(sql.len() + 8);
    let mut markers = 0usize;
    let mut state = Lex::Code;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        let prev = i.checked_sub(1).map(|p| chars[p]);
        // chars consumed by this step
        let mut step = 1;

        match &state {
            Lex::Code => match ch {
                '?' => {
                    markers += 1;
                    dialect.write_placeholder(&mut text, markers);
                    i += 1;
                    continue;
                }
                '\'' => {
                    let e_prefix = matches!(prev, Some('e' | 'E'))
                        && !i.checked_sub(2).is_some_and(|p| is_ident_char(chars[p]));
                    state = if e_prefix { Lex::Escaped } else { Lex::Quoted('\'') };
                }
                '"' => state = Lex::Quoted('"'),
                '-' if next == Some('-') => {
                    step = 2;
                    state = Lex::LineComment;
                }
                '/' if next == Some('*') => {
                    step = 2;
                    state = Lex::BlockComment(1);
                }
                '$' if !prev.is_some_and(is_ident_char) => {
                    if let Some(tag) = dollar_tag(&chars[i..]) {
                        step = tag.len();
                        state = Lex::Dollar(tag);
                    }
                }
                _ => {}
            },
            Lex::Quoted(quote) => {
                if ch == *quote {
                    if next == Some(*quote) {
                        step = 2;
                    } else {
                        state = Lex::Code;
                    }
                }
            }
            Lex::Escaped => match ch {
                '\\' if next.is_some() => step = 2,
                '\'' if next == Some('\'') => step = 2,
                '\'' => state = Lex::Code,
                _ => {}
            },
            Lex::Dollar(tag) => {
                if chars[i..].starts_with(tag) {
                    step = tag.len();
                    state = Lex::Code;
                }
            }
            Lex::LineComment => {
                if ch == '\n' {
                    state = Lex::Code;
                }
            }
            Lex::BlockComment(depth) => {
                let depth = *depth;
                if ch == '*' && next == Some('/') {
                    step = 2;
                    state = if depth == 1 {
                        Lex::Code
                    } else {
                        Lex::BlockComment(depth - 1)
                    };
                } else if ch == '/' && next == Some('*') {
                    step = 2;
                    state = Lex::BlockComment(depth + 1);
                }
            }
        }

        text.extend(&chars[i..i + step]);
        i += step;
    }

    (text, markers)
}
