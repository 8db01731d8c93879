//! CSV form of a record list.
//!
//! Header row is fixed; tags are joined with `;`. Quoting follows RFC 4180:
//! a field containing a comma, quote, CR or LF is wrapped in quotes and its
//! quotes are doubled.

use std::borrow::Cow;

use crate::portable::PortableRecord;
use crate::record::VaultRecord;
use lockbox_common::{Error, Result};

/// Column order of exported files.
pub const CSV_HEADER: [&str; 8] = [
    "title", "username", "password", "url", "notes", "category", "tags", "favorite",
];

/// Separator between tags inside the `tags` column.
pub const TAG_SEPARATOR: &str = ";";

/// Render records as CSV, header first, one `\n`-terminated line per record.
pub fn write_records(records: &[VaultRecord]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    for record in records {
        let tags = record.tags.join(TAG_SEPARATOR);
        let fields = [
            record.title.as_str(),
            record.username.as_str(),
            record.password.as_str(),
            record.url.as_deref().unwrap_or(""),
            record.notes.as_deref().unwrap_or(""),
            record.category.as_str(),
            tags.as_str(),
            if record.favorite { "true" } else { "false" },
        ];
        let line: Vec<Cow<'_, str>> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field if needed.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Parse CSV text into loosely-typed records.
///
/// Columns are matched by header name, so files from other tools with extra
/// or reordered columns still load. `title` and `password` are required.
///
/// # Errors
/// - [`Error::InvalidInput`] for a missing header, missing required
///   columns, or an unterminated quoted field
pub fn parse_records(text: &str) -> Result<Vec<PortableRecord>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = parse_rows(text)?.into_iter();

    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| Error::InvalidInput("CSV is empty".to_string()))?
        .into_iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let column = |name: &str| header.iter().position(|h| h == name);
    let title = column("title");
    let password = column("password");
    let (title, password) = match (title, password) {
        (Some(t), Some(p)) => (t, p),
        _ => {
            return Err(Error::InvalidInput(
                "CSV header must contain title and password columns".to_string(),
            ))
        }
    };
    let username = column("username");
    let url = column("url");
    let notes = column("notes");
    let category = column("category");
    let tags = column("tags");
    let favorite = column("favorite");

    let records = rows
        .map(|row| {
            let get = |idx: Option<usize>| -> String {
                idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
            };
            let optional = |idx: Option<usize>| Some(get(idx)).filter(|v| !v.trim().is_empty());

            PortableRecord {
                title: get(Some(title)),
                username: get(username),
                password: get(Some(password)),
                url: optional(url),
                notes: optional(notes),
                category: optional(category),
                tags: get(tags)
                    .split(TAG_SEPARATOR)
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                favorite: matches!(
                    get(favorite).trim().to_ascii_lowercase().as_str(),
                    "true" | "1" | "yes"
                ),
                ..PortableRecord::default()
            }
        })
        .collect();

    Ok(records)
}

/// Split CSV text into rows of unescaped fields. Blank lines are skipped.
fn parse_rows(text: &str) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    fn end_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
        row.push(std::mem::take(field));
        let finished = std::mem::take(row);
        if !(finished.len() == 1 && finished[0].is_empty()) {
            rows.push(finished);
        }
    }

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_row(&mut rows, &mut row, &mut field);
            }
            '\n' => end_row(&mut rows, &mut row, &mut field),
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err(Error::InvalidInput("Unterminated quoted CSV field".to_string()));
    }
    if !field.is_empty() || !row.is_empty() {
        end_row(&mut rows, &mut row, &mut field);
    }
    Ok(rows)
}
