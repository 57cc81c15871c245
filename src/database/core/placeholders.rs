//! Positional parameter translation
//!
//! Statements are written with `$1`, `$2`, ... placeholders. SQLite reads
//! `$name` as a named parameter, so each `$N` is rewritten to the numbered
//! form `?N` before the statement is prepared. Text inside string literals,
//! quoted identifiers and comments is copied unchanged.

/// Rewrite `$N` placeholders to `?N`.
pub fn bind_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                copy_quoted(&mut chars, &mut out, c);
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                // line comment runs to end of line
                for next in chars.by_ref() {
                    out.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                if let Some(star) = chars.next() {
                    out.push(star);
                }
                let mut prev = '\0';
                for next in chars.by_ref() {
                    out.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '$' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                out.push('?');
                while let Some(&digit) = chars.peek() {
                    if !digit.is_ascii_digit() {
                        break;
                    }
                    out.push(digit);
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// The statement without surrounding whitespace, trailing semicolons and
/// trailing comments.
///
/// Semicolons and comment markers inside literals and quoted identifiers are
/// part of the statement.
pub fn trim_statement(sql: &str) -> &str {
    let mut end = 0;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                end = sql.len();
                while let Some((j, next)) = chars.next() {
                    if next == c {
                        if chars.peek().map(|&(_, n)| n) == Some(c) {
                            chars.next();
                            continue;
                        }
                        end = j + next.len_utf8();
                        break;
                    }
                }
            }
            '-' if chars.peek().map(|&(_, n)| n) == Some('-') => {
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek().map(|&(_, n)| n) == Some('*') => {
                chars.next();
                let mut prev = '\0';
                for (_, next) in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ';' => {}
            c if c.is_whitespace() => {}
            _ => end = i + c.len_utf8(),
        }
    }

    sql[..end].trim_start()
}

/// Copy a quoted run up to and including its closing quote.
///
/// A doubled quote character is an escaped quote and does not close the run.
fn copy_quoted<I>(chars: &mut std::iter::Peekable<I>, out: &mut String, quote: char)
where
    I: Iterator<Item = char>,
{
    while let Some(c) = chars.next() {
        out.push(c);
        if c == quote {
            if chars.peek() == Some(&quote) {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            return;
        }
    }
}
