use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use storage_core::StorageError;

use crate::value::{PropertyValue, format_datetime};

/// Everything except RFC 3986 unreserved characters gets encoded.
const FILTER_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Render one value as a quoted, percent-encoded filter literal:
/// `datetime'<ISO-8601>'` for date-times, `'<text>'` otherwise.
///
/// Quotes inside strings are percent-encoded, not doubled.
pub fn quote_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::DateTime(dt) => {
            format!("datetime'{}'", utf8_percent_encode(&format_datetime(dt), FILTER_VALUE))
        }
        PropertyValue::String(s) => format!("'{}'", utf8_percent_encode(s, FILTER_VALUE)),
    }
}

/// Substitute `{0}`, `{1}`, … in `template` with quoted arguments.
///
/// `{{` and `}}` are literal braces. An index past the end of `args`,
/// a non-numeric placeholder or an unbalanced brace is an error.
pub fn format_filter(template: &str, args: &[PropertyValue]) -> Result<String, StorageError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut digits = String::new();
                let mut closed = false;
                for (_, d) in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    digits.push(d);
                }
                if !closed {
                    return Err(StorageError::InvalidFilter(format!(
                        "unclosed placeholder at {pos} in '{template}'"
                    )));
                }
                let index: usize = digits.trim().parse().map_err(|_| {
                    StorageError::InvalidFilter(format!("bad placeholder '{{{digits}}}' in '{template}'"))
                })?;
                let value = args.get(index).ok_or_else(|| {
                    StorageError::InvalidFilter(format!(
                        "placeholder {{{index}}} but only {} argument(s)",
                        args.len()
                    ))
                })?;
                out.push_str(&quote_value(value));
            }
            '}' => {
                return Err(StorageError::InvalidFilter(format!(
                    "unmatched '}}' at {pos} in '{template}'"
                )));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
