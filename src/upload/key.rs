//! Object key derivation

use chrono::{DateTime, SecondsFormat, Utc};

/// Longest title segment kept in an object key, in characters
pub const MAX_TITLE_LENGTH: usize = 100;

/// Title segment used when nothing survives sanitization
pub const UNTITLED: &str = "untitled";

const UNSAFE_CHARACTERS: [char; 10] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|', '%'];

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' => 'c',
        'Ç' => 'C',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        other => other,
    }
}

/// Turn a page title into a filesystem- and URL-friendly key segment
pub fn sanitize_title(title: &str) -> String {
    let folded: String = title
        .chars()
        .filter(|c| !UNSAFE_CHARACTERS.contains(c) && !c.is_control())
        .map(fold_accent)
        .collect();

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_TITLE_LENGTH).collect();
    let truncated = truncated.trim_end();

    if truncated.is_empty() {
        UNTITLED.to_string()
    } else {
        truncated.to_string()
    }
}

/// `{prefix}/{timestamp}-{title}.json`, with `:` and `.` in the timestamp turned into `-`
pub fn object_key(prefix: &str, timestamp: DateTime<Utc>, title: &str) -> String {
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let name = format!("{}-{}.json", stamp, sanitize_title(title));

    match prefix.trim_matches('/') {
        "" => name,
        prefix => format!("{}/{}", prefix, name),
    }
}
