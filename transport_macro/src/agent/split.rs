//! Splitting template lines at assignment operators

/// Which delimiter split the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    None,
    Sum,
    SumEqual,
}

/// A template line divided into sides, trailing punctuation removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLine<'a> {
    pub kind: SplitKind,
    /// Left side without trailing whitespace; `None` when unsplit
    pub lhs: Option<&'a str>,
    pub rhs: &'a str,
    /// Byte offset of `rhs` within the line
    pub rhs_offset: usize,
    pub semicolon: bool,
    pub comma: bool,
}

impl SplitLine<'_> {
    /// Punctuation stripped from the right side, to be re-appended
    pub fn trailer(&self) -> &'static str {
        match (self.semicolon, self.comma) {
            (true, true) => ";,",
            (true, false) => ";",
            (false, true) => ",",
            (false, false) => "",
        }
    }
}

/// Characters that turn a following `=` into part of another operator
const OPERATOR_PREFIXES: &[u8] = b"=!<>+-*/%&|^";

/// Split at the first assignment delimiter outside brackets and strings
///
/// At each position the sum-equal delimiter is tried before the plain one,
/// and a plain `=` only counts when it is not part of `==`, `<=`, `+=` and
/// similar operators.
pub fn split_line<'a>(line: &'a str, equal: &str, sum_equal: &str) -> SplitLine<'a> {
    let bytes = line.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut split = None;

    let mut position = 0;
    while position < bytes.len() {
        let byte = bytes[position];

        if in_string {
            match byte {
                b'\\' => position += 1,
                b'"' => in_string = false,
                _ => {}
            }
            position += 1;
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                let rest = &line[position..];
                if !sum_equal.is_empty() && rest.starts_with(sum_equal) {
                    split = Some((position, sum_equal.len(), SplitKind::SumEqual));
                    break;
                }
                if !equal.is_empty()
                    && rest.starts_with(equal)
                    && is_standalone(bytes, position, equal.len())
                {
                    split = Some((position, equal.len(), SplitKind::Sum));
                    break;
                }
            }
            _ => {}
        }
        position += 1;
    }

    match split {
        Some((at, width, kind)) => {
            let (rhs, semicolon, comma) = strip_trailer(&line[at + width..]);
            SplitLine {
                kind,
                lhs: Some(line[..at].trim_end()),
                rhs,
                rhs_offset: at + width,
                semicolon,
                comma,
            }
        }
        None => {
            let (rhs, semicolon, comma) = strip_trailer(line);
            SplitLine {
                kind: SplitKind::None,
                lhs: None,
                rhs,
                rhs_offset: 0,
                semicolon,
                comma,
            }
        }
    }
}

fn is_standalone(bytes: &[u8], at: usize, width: usize) -> bool {
    let before_ok = at == 0 || !OPERATOR_PREFIXES.contains(&bytes[at - 1]);
    let after_ok = bytes.get(at + width) != Some(&b'=');
    before_ok && after_ok
}

/// Semicolon is stripped before comma, so a line ending `,;` is re-emitted
/// ending `;,`
fn strip_trailer(text: &str) -> (&str, bool, bool) {
    let mut rest = text.trim_end();
    let semicolon = rest.ends_with(';');
    if semicolon {
        rest = rest[..rest.len() - 1].trim_end();
    }
    let comma = rest.ends_with(',');
    if comma {
        rest = rest[..rest.len() - 1].trim_end();
    }
    (rest, semicolon, comma)
}
