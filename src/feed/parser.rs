use feed_rs::parser;
use thiserror::Error;

/// Feed XML could not be parsed as RSS or Atom.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(#[from] parser::ParseFeedError);

/// One item from an RSS/Atom document, before it is tagged with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItem {
    pub title: Option<String>,
    pub link: String,
    pub summary: String,
    pub published: String,
}

/// Parses an RSS or Atom document, keeping at most `limit` items.
///
/// Missing fields become empty strings (or `None` for the title) so that
/// an item with no link is still returned; the merge stage drops it.
pub fn parse_feed(bytes: &[u8], limit: usize) -> Result<Vec<ParsedItem>, ParseError> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty());

            ParsedItem {
                title,
                link,
                summary,
                published,
            }
        })
        .collect();

    Ok(items)
}
