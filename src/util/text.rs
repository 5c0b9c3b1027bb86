use std::borrow::Cow;

/// Ellipsis appended when text is cut.
const ELLIPSIS: &str = "...";

/// Truncates a string to at most `max_chars` characters.
///
/// Counts Unicode scalar values, not bytes or display columns. If the string
/// is longer than `max_chars`, the first `max_chars` characters are kept and
/// `"..."` is appended; otherwise the input is returned unchanged.
///
/// Returns `Cow::Borrowed` when no truncation is needed.
///
/// # Examples
///
/// ```
/// use techdigest::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello...");
/// assert_eq!(truncate_chars("你好世界", 2), "你好...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        // A character exists past the limit, so cut before it.
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
        None => Cow::Borrowed(s),
    }
}
