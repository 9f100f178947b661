//! Rule-derived bookmark titles for a sequence of pages.

use std::collections::BTreeSet;

use crate::rules::CompiledRule;

/// A title produced for one page of a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTitle {
    /// Position of the page in the sequence passed to [`PageExtractor::extract`]
    pub page_offset: usize,
    pub title: String,
}

/// Applies bookmark rules to page text.
///
/// Pages containing a non-content marker never produce titles and are
/// transparent for duplicate collapsing: a title repeated on both sides of a
/// skipped page is still one run. A title is emitted only on the first page of
/// a run of pages producing it.
#[derive(Debug, Clone, Copy)]
pub struct PageExtractor<'a> {
    skip_markers: &'a [String],
}

impl<'a> PageExtractor<'a> {
    pub const fn new(skip_markers: &'a [String]) -> Self {
        Self { skip_markers }
    }

    pub fn is_skipped(&self, text: &str) -> bool {
        self.skip_markers
            .iter()
            .any(|marker| !marker.is_empty() && text.contains(marker.as_str()))
    }

    /// Titles in page order, then rule order within a page.
    pub fn extract<S: AsRef<str>>(&self, rules: &[CompiledRule], texts: &[S]) -> Vec<PageTitle> {
        self.extract_each(texts.iter().map(|text| (rules, text.as_ref())))
    }

    /// Like [`extract`](Self::extract), with a rule list chosen per page.
    pub fn extract_each<'r, 't>(
        &self,
        pages: impl IntoIterator<Item = (&'r [CompiledRule], &'t str)>,
    ) -> Vec<PageTitle> {
        let mut titles = Vec::new();
        let mut previous: BTreeSet<String> = BTreeSet::new();
        for (page_offset, (rules, text)) in pages.into_iter().enumerate() {
            if self.is_skipped(text) {
                continue;
            }

            let mut current = BTreeSet::new();
            for rule in rules {
                let Some(title) = rule.title_for(text) else {
                    continue;
                };
                if !current.insert(title.clone()) {
                    continue;
                }
                if !previous.contains(&title) {
                    titles.push(PageTitle { page_offset, title });
                }
            }
            previous = current;
        }
        titles
    }
}
