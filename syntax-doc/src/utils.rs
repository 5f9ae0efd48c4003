use std::iter::Peekable;

pub struct IsLast<I: Iterator>(Peekable<I>);

impl<I: Iterator> IsLast<I> {
    pub fn new(iter: I) -> Self {
        Self(iter.peekable())
    }
}

impl<I: Iterator> Iterator for IsLast<I> {
    type Item = (I::Item, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.0.next()?;
        let is_last = self.0.peek().is_none();
        Some((item, is_last))
    }
}

/// Removes whitespace that all non-blank lines have in common at their start.
/// Blank lines become empty.
pub fn dedent(lines: &[&str]) -> Vec<String> {
    let margin = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(|margin, indent| {
            let common = margin
                .char_indices()
                .zip(indent.chars())
                .find(|((_, a), b)| a != b)
                .map(|((i, _), _)| i)
                .unwrap_or_else(|| margin.len().min(indent.len()));
            &margin[..common]
        })
        .unwrap_or("");

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            }
            else {
                line[margin.len()..].to_owned()
            }
        })
        .collect()
}

/// Converts `CamelCase` and `snake_case` to `dash-case`.
///
/// Runs of capitals are kept together, so `XMLTag` becomes `xml-tag`, and
/// digits that follow a letter start a new word, so `HTTP20` becomes
/// `http-20`. Underscores and dashes separate words, but never lead or trail.
/// Other characters are kept and don't separate words.
pub fn to_dash_case(name: &str) -> String {
    let chars = name.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if i > 0 && !out.is_empty() && !out.ends_with('-') {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let starts_word = if c.is_uppercase() {
                prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next.map_or(false, char::is_lowercase))
            }
            else if c.is_ascii_digit() {
                prev.is_alphabetic()
            }
            else {
                false
            };
            if starts_word {
                out.push('-');
            }
        }

        out.extend(c.to_lowercase());
    }

    out.trim_end_matches('-').to_owned()
}

/// Removes quotes from an ANTLR literal and resolves its escape sequences.
/// Unknown escapes are kept as they are.
pub fn unescape_literal(literal: &str) -> String {
    let inner = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(literal);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(c @ ('\\' | '\'' | '"')) => out.push(c),
            Some('u') => {
                let hex = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect::<String>()
                }
                else {
                    chars.by_ref().take(4).collect::<String>()
                };
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }

    out
}
