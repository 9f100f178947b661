use std::sync::LazyLock;

use regex::Regex;

use super::{FilePages, ReorderOutcome, ReorderStrategy};

static LAB_SAMPLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Lab Sample ID: (\S+)").expect("valid attribute pattern"));
static DATA_SET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Data Set ID: (\S+)").expect("valid attribute pattern"));

fn capture(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Sorts every page of the group by (lab sample id, data set id).
///
/// Missing values sort as the empty string. The sort is stable, so pages with
/// equal keys keep their file order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeReorder;

impl ReorderStrategy for AttributeReorder {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn reorder(&self, files: &[FilePages]) -> ReorderOutcome {
        let mut keyed: Vec<_> = files
            .iter()
            .flat_map(|file| &file.records)
            .map(|record| {
                (
                    capture(&LAB_SAMPLE_ID, &record.text),
                    capture(&DATA_SET_ID, &record.text),
                    record.page,
                )
            })
            .collect();
        keyed.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        ReorderOutcome {
            pages: keyed.into_iter().map(|(_, _, page)| page).collect(),
            recovered: Vec::new(),
        }
    }
}
