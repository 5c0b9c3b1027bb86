use crate::config::SourceConfig;
use crate::feed::parser::ParsedItem;

/// One item yielded by a source, tagged with where it came from.
///
/// `link` is the deduplication identity; an entry with an empty link never
/// survives the merge stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: String,
    pub summary: String,
    pub published: String,
    pub source_name: String,
    pub source_key: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

impl RawEntry {
    pub(crate) fn from_item(item: ParsedItem, source: &SourceConfig) -> Self {
        Self {
            title: item.title,
            link: item.link,
            summary: item.summary,
            published: item.published,
            source_name: source.name.clone(),
            source_key: source.key.clone(),
            tags: source.tags.clone(),
            category: source.category.clone(),
        }
    }
}
