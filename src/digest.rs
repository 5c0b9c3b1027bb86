//! Markdown rendering of a collected payload.
use crate::storage::{PayloadEntry, RunMeta, DEFAULT_CATEGORY, DEFAULT_SOURCE, DEFAULT_TITLE};
use crate::util::truncate_chars;
use chrono::Local;
use std::collections::BTreeMap;

/// Summaries longer than this many characters are cut.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Renders the digest for `date`, stamping the footer with the local time.
pub fn generate_markdown(entries: &[PayloadEntry], date: &str, meta: Option<&RunMeta>) -> String {
    let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
    render(entries, date, meta, &generated_at)
}

/// Deterministic core of [`generate_markdown`].
pub fn render(
    entries: &[PayloadEntry],
    date: &str,
    meta: Option<&RunMeta>,
    generated_at: &str,
) -> String {
    let mut lines: Vec<String> = vec![format!("# Tech digest - {date}"), String::new()];

    if let Some(meta) = meta {
        render_metrics(&mut lines, meta, entries.len());
    }

    for (category, sources) in group(entries) {
        lines.push(format!("## {category}"));
        lines.push(String::new());
        for (source, items) in sources {
            lines.push(format!("### {source}"));
            lines.push(String::new());
            for entry in items {
                render_entry(&mut lines, entry, source);
            }
        }
    }

    lines.push(format!("*Generated by techdigest at {generated_at}*"));
    lines.join("\n")
}

type Groups<'a> = BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a PayloadEntry>>>;

/// Category, then source, both sorted. Entries keep payload order.
fn group(entries: &[PayloadEntry]) -> Groups<'_> {
    let mut groups: Groups<'_> = BTreeMap::new();
    for entry in entries {
        let category = entry
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);
        let source = non_empty_or(&entry.source, DEFAULT_SOURCE);
        groups
            .entry(category)
            .or_default()
            .entry(source)
            .or_default()
            .push(entry);
    }
    groups
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

/// Each line is written only when its fields are usable.
fn render_metrics(lines: &mut Vec<String>, meta: &RunMeta, entry_count: usize) {
    lines.push("## Summary metrics".to_string());
    lines.push(String::new());

    if meta.raw_entries.is_some() || meta.dedup_rate.is_some() {
        let rate = match meta.dedup_rate {
            Some(rate) if rate.is_finite() => format!("{:.2}%", rate * 100.0),
            _ => "N/A".to_string(),
        };
        match meta.raw_entries {
            Some(raw) => lines.push(format!(
                "- Dedup rate: {rate} (raw {raw} -> unique {})",
                meta.unique_entries.unwrap_or(entry_count)
            )),
            None => lines.push(format!("- Dedup rate: {rate}")),
        }
    }

    if !meta.category_counts.is_empty() {
        let counts: Vec<String> = meta
            .category_counts
            .iter()
            .map(|(category, count)| format!("{category} {count}"))
            .collect();
        lines.push(format!("- Categories: {}", counts.join(" / ")));
    }

    if let (Some(total), Some(failed)) = (meta.total_sources, meta.failed_source_count) {
        let succeeded = total.saturating_sub(failed);
        lines.push(format!(
            "- Source health: {succeeded}/{total} succeeded (failed {failed})"
        ));
    }

    if !meta.failed_sources.is_empty() {
        let names: Vec<&str> = meta
            .failed_sources
            .iter()
            .map(|f| non_empty_or(&f.name, non_empty_or(&f.key, DEFAULT_SOURCE)))
            .collect();
        lines.push(format!("- Failed sources: {}", names.join(", ")));
    }

    lines.push(String::new());
}

fn render_entry(lines: &mut Vec<String>, entry: &PayloadEntry, source: &str) {
    let title = non_empty_or(&entry.title, DEFAULT_TITLE);
    if entry.url.is_empty() {
        lines.push(format!("#### {title}"));
    } else {
        lines.push(format!("#### [{title}]({})", entry.url));
    }
    lines.push(format!(
        "Published at: {}",
        non_empty_or(&entry.published_at, "unknown")
    ));
    lines.push(String::new());

    if !entry.summary_raw.is_empty() {
        lines.push(truncate_chars(&entry.summary_raw, SUMMARY_MAX_CHARS).into_owned());
        lines.push(String::new());
    }

    lines.push(format!("**Source**: {source}"));
    if !entry.tags.is_empty() {
        let tags: Vec<String> = entry.tags.iter().map(|t| format!("#{t}")).collect();
        lines.push(format!("**Tags**: {}", tags.join(" ")));
    }
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
}
