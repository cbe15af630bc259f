//! Plain-text renderings of tool results

use std::fmt::Write;

use laterbridge_client::FeedCollection;
use laterbridge_core::{Item, SaveResult};

/// One line per item plus the continuation cursor
pub fn article_list(collection: &FeedCollection) -> String {
    let mut out = String::new();
    if collection.items.is_empty() {
        out.push_str("No articles found.\n");
    } else {
        let _ = writeln!(out, "{} article(s):", collection.items.len());
        for (index, item) in collection.items.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", index + 1, summary_line(item));
        }
    }
    if let Some(cursor) = &collection.next_cursor {
        let _ = writeln!(out, "\nMore articles available. Next cursor: {}", cursor);
    }
    out
}

fn summary_line(item: &Item) -> String {
    let mut line = format!("[{}] {}", item.id, display_title(item));
    if let Some(author) = &item.author {
        let _ = write!(line, " by {}", author);
    }
    let _ = write!(
        line,
        " ({}, {}% read)",
        item.status.label(),
        item.progress_percent()
    );
    if let Some(url) = &item.url {
        let _ = write!(line, " <{}>", url);
    }
    line
}

fn display_title(item: &Item) -> &str {
    if item.title.trim().is_empty() {
        "(untitled)"
    } else {
        &item.title
    }
}

/// Every known field of one item, then its highlights
pub fn article_detail(item: &Item) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", display_title(item));
    let _ = writeln!(out, "ID: {}", item.id);
    if let Some(secondary) = &item.secondary_id {
        let _ = writeln!(out, "Content ID: {}", secondary);
    }
    if let Some(url) = &item.url {
        let _ = writeln!(out, "URL: {}", url);
    }
    if let Some(author) = &item.author {
        let _ = writeln!(out, "Author: {}", author);
    }
    if let Some(publisher) = &item.publisher {
        let _ = writeln!(out, "Publisher: {}", publisher);
    }
    if let Some(published) = &item.published {
        let _ = writeln!(out, "Published: {}", published);
    }
    let _ = writeln!(out, "Status: {}", item.status.label());
    let _ = writeln!(out, "Progress: {}%", item.progress_percent());
    if let Some(words) = item.word_count {
        let _ = writeln!(out, "Words: {}", words);
    }
    if !item.tags.is_empty() {
        let _ = writeln!(out, "Tags: {}", item.tags.join(", "));
    }
    if let Some(note) = &item.note {
        let _ = writeln!(out, "Note: {}", note);
    }

    if item.highlights.is_empty() {
        out.push_str("\nNo highlights.\n");
    } else {
        let _ = writeln!(out, "\n## Highlights ({})", item.highlights.len());
        for highlight in &item.highlights {
            let _ = writeln!(out, "> {}", highlight.text);
            if let Some(note) = &highlight.note {
                let _ = writeln!(out, "  Note: {}", note);
            }
        }
    }
    out
}

pub fn not_found(identifier: &str) -> String {
    format!("No article with ID {} was found in your library.", identifier)
}

pub fn saved(url: &str, result: &SaveResult) -> String {
    match &result.secondary_id {
        Some(secondary) => format!(
            "Saved {} (ID: {}, content ID: {})",
            url, result.id, secondary
        ),
        None => format!("Saved {} (ID: {})", url, result.id),
    }
}
