//! Minimal CSV codec for the usage log.
//!
//! Every field is written quoted with embedded quotes doubled, so commas,
//! quotes and line breaks inside a field survive a round trip. The reader
//! also accepts unquoted fields, which older rows may contain.

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CsvError {
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("unexpected character {found:?} after closing quote on line {line}")]
    TrailingCharacter { line: usize, found: char },
}

pub fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Encodes one row, including the trailing newline.
pub fn encode_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// Parses a whole document into rows of fields. Blank lines are skipped.
pub fn parse(input: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut rows = Vec::new();
    let mut pos = skip_blank_lines(input, 0);
    while pos < input.len() {
        let (row, next) = parse_record(input, pos)?;
        rows.push(row);
        pos = skip_blank_lines(input, next);
    }
    Ok(rows)
}

/// Like [`parse`], but a malformed record is reported and skipped instead of
/// failing the whole document. Parsing resumes on the line after the one the
/// bad record started on.
pub fn parse_lossy(input: &str) -> (Vec<Vec<String>>, Vec<CsvError>) {
    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut pos = skip_blank_lines(input, 0);
    while pos < input.len() {
        match parse_record(input, pos) {
            Ok((row, next)) => {
                rows.push(row);
                pos = next;
            }
            Err(e) => {
                errors.push(e);
                pos = input[pos..].find('\n').map_or(input.len(), |i| pos + i + 1);
            }
        }
        pos = skip_blank_lines(input, pos);
    }
    (rows, errors)
}

fn skip_blank_lines(input: &str, mut pos: usize) -> usize {
    loop {
        let rest = &input[pos..];
        if rest.starts_with('\n') {
            pos += 1;
        } else if rest.starts_with("\r\n") {
            pos += 2;
        } else {
            return pos;
        }
    }
}

fn line_at(input: &str, offset: usize) -> usize {
    input[..offset].matches('\n').count() + 1
}

/// Parses one record starting at byte `start`; returns it with the offset
/// just past its terminating newline.
fn parse_record(input: &str, start: usize) -> Result<(Vec<String>, usize), CsvError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = input[start..].char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' if field.is_empty() => {
                loop {
                    match chars.next() {
                        Some((_, '"')) if matches!(chars.peek(), Some((_, '"'))) => {
                            chars.next();
                            field.push('"');
                        }
                        Some((_, '"')) => break,
                        Some((_, c)) => field.push(c),
                        None => {
                            return Err(CsvError::UnterminatedQuote { line: line_at(input, start) })
                        }
                    }
                }
                match chars.peek() {
                    None | Some((_, ',')) | Some((_, '\n')) | Some((_, '\r')) => {}
                    Some(&(j, found)) => {
                        return Err(CsvError::TrailingCharacter {
                            line: line_at(input, start + j),
                            found,
                        })
                    }
                }
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if matches!(chars.peek(), Some((_, '\n'))) => {}
            '\n' => {
                fields.push(field);
                return Ok((fields, start + i + 1));
            }
            c => field.push(c),
        }
    }

    fields.push(field);
    Ok((fields, input.len()))
}
