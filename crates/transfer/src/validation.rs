use chunkdrop_protocol::constants::DEFAULT_FILENAME;

/// Reduces an untrusted client filename to a single safe path segment.
///
/// Only the text after the last `/` or `\` is kept and NUL bytes are
/// stripped. Empty results, `.` and `..` fall back to
/// [`DEFAULT_FILENAME`].
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| *c != '\0').collect();

    match cleaned.as_str() {
        "" | "." | ".." => DEFAULT_FILENAME.to_string(),
        _ => cleaned,
    }
}
