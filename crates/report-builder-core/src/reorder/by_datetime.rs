use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::debug;

use super::{FilePages, LocalBookmark, ReorderOutcome, ReorderStrategy};
use crate::pdf::{PageIndex, PageRef};

/// `DD-Mon-YYYY / HH:MM`
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}-\w{3}-\d{4}\s+/\s+\d{2}:\d{2}").expect("valid timestamp pattern")
});
static MANUALLY_INTEGRATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d.+(BMB\s?\*|BM\s?\*|MB\s?\*)").expect("valid integration marker pattern")
});

const TIMESTAMP_FORMAT: &str = "%d-%b-%Y/%H:%M";

/// Outline entries with this title are internal markers and never recovered.
const INTERNAL_BOOKMARK_TITLE: &str = "Integration";

fn timestamp(text: &str) -> Option<NaiveDateTime> {
    let found = TIMESTAMP.find(text)?;
    let compact: String = found.as_str().chars().filter(|c| !c.is_whitespace()).collect();
    NaiveDateTime::parse_from_str(&compact, TIMESTAMP_FORMAT).ok()
}

fn manually_integrated(text: &str) -> bool {
    MANUALLY_INTEGRATED.is_match(text)
}

/// A timestamped page and its continuation pages.
#[derive(Debug)]
struct Group {
    timestamp: Option<NaiveDateTime>,
    manually_integrated: bool,
    /// `(file index, page)` of each member, in original order
    members: Vec<(usize, PageRef)>,
}

impl Group {
    fn key(&self) -> (Option<NaiveDateTime>, bool) {
        (self.timestamp, self.manually_integrated)
    }
}

/// Sorts acquisition records by their timestamp.
///
/// A page without a timestamp continues the record started by the nearest
/// preceding timestamped page. Records sort by time, a manually integrated
/// record before the automatic one of the same time, and repeated adjacent
/// records are dropped. Outline entries of the source files move with the
/// pages they point at.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatetimeReorder;

impl ReorderStrategy for DatetimeReorder {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn recovers_bookmarks(&self) -> bool {
        true
    }

    fn reorder(&self, files: &[FilePages]) -> ReorderOutcome {
        let mut groups: Vec<Group> = Vec::new();
        for (file_index, file) in files.iter().enumerate() {
            for record in &file.records {
                let ts = timestamp(&record.text);
                let mi = manually_integrated(&record.text);
                match groups.last_mut() {
                    Some(group) if ts.is_none() => {
                        group.manually_integrated |= mi;
                        group.members.push((file_index, record.page));
                    }
                    _ => groups.push(Group {
                        timestamp: ts,
                        manually_integrated: mi,
                        members: vec![(file_index, record.page)],
                    }),
                }
            }
        }

        groups.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(b.manually_integrated.cmp(&a.manually_integrated))
        });
        let before = groups.len();
        groups.dedup_by(|later, kept| later.key() == kept.key());
        if groups.len() < before {
            debug!("Dropped {} duplicate record(s)", before - groups.len());
        }

        // (file, source page) -> offset in the new sequence
        let mut placed: HashMap<(usize, PageIndex), usize> = HashMap::new();
        let mut pages = Vec::new();
        for group in &groups {
            for &(file_index, page) in &group.members {
                placed.insert((file_index, page.page), pages.len());
                pages.push(page);
            }
        }

        let mut recovered: Vec<LocalBookmark> = files
            .iter()
            .enumerate()
            .flat_map(|(file_index, file)| {
                file.outline.iter().filter_map(move |entry| {
                    (entry.title != INTERNAL_BOOKMARK_TITLE).then_some((file_index, entry))
                })
            })
            .filter_map(|(file_index, entry)| {
                let page_offset = *placed.get(&(file_index, entry.page))?;
                Some(LocalBookmark {
                    page_offset,
                    level: entry.level,
                    title: entry.title.clone(),
                    recovered: true,
                })
            })
            .collect();
        recovered.sort_by_key(|b| b.page_offset);

        ReorderOutcome { pages, recovered }
    }
}
