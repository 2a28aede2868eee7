//! Turns raw backend output chunks into display lines.

use crate::protocol::OutputStream;

/// One display line cut from an output chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub stream: OutputStream,
}

/// Strip ANSI/VT escape sequences and stray control characters.
///
/// Newlines and tabs survive; carriage returns become line breaks. Cursor
/// forward (`CSI n C`) is rendered as `n` spaces since shells use it in place
/// of literal padding.
pub fn strip_control(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    let mut params = String::new();
                    while let Some(nc) = chars.next() {
                        if ('@'..='~').contains(&nc) {
                            if nc == 'C' {
                                let n = params.parse::<usize>().unwrap_or(1).clamp(1, 256);
                                result.extend(std::iter::repeat(' ').take(n));
                            }
                            break;
                        }
                        params.push(nc);
                    }
                }
                Some(']') | Some('P') | Some('_') | Some('^') => {
                    chars.next();
                    while let Some(nc) = chars.next() {
                        if nc == '\x07' {
                            break;
                        }
                        if nc == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                Some('(' | ')' | '*' | '+') => {
                    chars.next();
                    chars.next();
                }
                Some(nc) if ('0'..='~').contains(nc) => {
                    chars.next();
                }
                _ => {}
            },
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    result.push('\n');
                }
            }
            '\n' | '\t' => result.push(c),
            c if c.is_control() => {}
            c => result.push(c),
        }
    }
    result
}

/// Split a raw chunk into non-blank display lines tagged with `stream`, in order.
pub fn normalize(raw: &str, stream: OutputStream) -> Vec<OutputLine> {
    strip_control(raw)
        .split('\n')
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| OutputLine {
            text: segment.to_string(),
            stream,
        })
        .collect()
}
