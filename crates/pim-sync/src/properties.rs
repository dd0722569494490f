//! Flat `key=value` files, compatible with `java.util.Properties` output for
//! the subset of syntax the mapping files use.
//!
//! `#` and `!` start comment lines. The first unescaped `=` or `:` separates
//! key from value. `\=`, `\:`, `\#`, `\!`, `\ ` and `\\` escape those
//! characters. Line continuations and `\uXXXX` escapes are not supported.

use std::fs;
use std::io::Write as _;
use std::path::Path;

/// Parses `text` into `(key, value)` pairs in file order.
pub(crate) fn parse(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                return None;
            }
            let split = separator_index(line);
            let (raw_key, raw_value) = match split {
                Some(idx) => (&line[..idx], &line[idx + 1..]),
                None => (line, ""),
            };
            Some((unescape(raw_key.trim_end()), unescape(raw_value.trim())))
        })
        .collect()
}

/// Renders entries in the given order under a `#`-prefixed header line.
pub(crate) fn render<'a, I>(header: &str, entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut out = format!("#{header}\n");
    for (key, value) in entries {
        out.push_str(&escape_key(key));
        out.push('=');
        out.push_str(&value);
        out.push('\n');
    }
    out
}

/// Writes `contents` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written mapping.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, path)
}

fn separator_index(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '=' || ch == ':' {
            return Some(idx);
        }
    }
    None
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (idx, ch) in key.char_indices() {
        match ch {
            '=' | ':' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '#' | '!' | ' ' if idx == 0 => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
