//! Table of contents reconciliation.
//!
//! The layout reserves space for the table of contents before its final
//! entries are known. Once rendered with the final bookmarks, the table may
//! need more or fewer pages than reserved; everything after it then moves and
//! the report is composed one more time. A second change in length is an
//! error, not another iteration.

use tracing::{debug, info};

use super::{Composer, Composition};
use crate::error::{Error, Result};
use crate::layout::{BookmarkArena, LayoutPlan};
use crate::render::TocEntry;

/// Entries of the table of contents for the bookmarks listed in it.
///
/// Levels count only ancestors that are listed themselves, so an entry below
/// an unlisted bookmark is indented as if that bookmark were absent. Counting
/// every ancestor would leave gaps in the indentation of the table.
pub fn toc_entries(bookmarks: &BookmarkArena) -> Vec<TocEntry> {
    let mut levels: Vec<Option<usize>> = Vec::with_capacity(bookmarks.len());
    let mut entries = Vec::new();
    for (id, item) in bookmarks.iter() {
        let listed_ancestor = bookmarks
            .ancestors(id)
            .find_map(|ancestor| levels.get(ancestor.as_usize()).copied().flatten());
        if item.include_in_toc {
            let level = listed_ancestor.map_or(0, |l| l + 1);
            levels.push(Some(level));
            entries.push(TocEntry {
                title: item.title.clone(),
                level,
                start_page: item.start_page,
                end_page: item.end_page.unwrap_or(item.start_page),
            });
        } else {
            levels.push(None);
        }
    }
    entries
}

/// Where the reconciliation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocState {
    /// Nothing composed yet
    Start,
    /// The report has no table of contents; one pass was enough
    NoToc,
    /// Composed once with the reserved table length
    Estimated { item_index: usize, estimated: usize },
    /// The rendered length is known
    Realized {
        item_index: usize,
        estimated: usize,
        realized: usize,
    },
    /// The layout after the table moved by the length difference
    ShiftApplied { estimated: usize, realized: usize },
    /// Composed again with corrected page numbers
    Recomposed { estimated: usize, realized: usize },
}

impl TocState {
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::NoToc | Self::Recomposed { .. } => true,
            Self::Realized {
                estimated, realized, ..
            } => *estimated == *realized,
            Self::Start | Self::Estimated { .. } | Self::ShiftApplied { .. } => false,
        }
    }
}

/// Final composition with the state it was reached in.
#[derive(Debug)]
pub struct Reconciliation {
    pub composition: Composition,
    pub state: TocState,
    /// Number of composition passes that ran
    pub passes: usize,
}

/// Drives composition until the table of contents is consistent.
pub struct TocReconciler<'c> {
    composer: &'c Composer<'c>,
    state: TocState,
    passes: usize,
    composition: Option<Composition>,
}

impl<'c> TocReconciler<'c> {
    pub const fn new(composer: &'c Composer<'c>) -> Self {
        Self {
            composer,
            state: TocState::Start,
            passes: 0,
            composition: None,
        }
    }

    pub const fn state(&self) -> TocState {
        self.state
    }

    /// Run the state machine to a terminal state. `plan` is shifted in place
    /// when the table of contents changes length.
    pub async fn run(mut self, plan: &mut LayoutPlan) -> Result<Reconciliation> {
        while !self.state.is_terminal() {
            self.step(plan).await?;
        }
        let composition = self.composition.ok_or_else(|| {
            Error::LayoutInvariant("reconciliation finished without a composition".to_string())
        })?;
        info!(
            "Table of contents settled after {} pass(es): {:?}",
            self.passes, self.state
        );
        Ok(Reconciliation {
            composition,
            state: self.state,
            passes: self.passes,
        })
    }

    /// Advance by one transition.
    pub async fn step(&mut self, plan: &mut LayoutPlan) -> Result<()> {
        self.state = match self.state {
            TocState::Start => {
                let composition = self.compose(plan).await?;
                let next = composition.toc.as_ref().map_or(TocState::NoToc, |toc| {
                    TocState::Estimated {
                        item_index: toc.item_index,
                        estimated: toc.estimated,
                    }
                });
                self.composition = Some(composition);
                next
            }
            TocState::Estimated {
                item_index,
                estimated,
            } => {
                let realized = self
                    .composition
                    .as_ref()
                    .and_then(|c| c.toc.as_ref())
                    .map_or(estimated, |toc| toc.realized);
                TocState::Realized {
                    item_index,
                    estimated,
                    realized,
                }
            }
            TocState::Realized {
                item_index,
                estimated,
                realized,
            } => {
                if estimated == realized {
                    return Ok(());
                }
                debug!(
                    "Table of contents needs {} page(s), {} reserved",
                    realized, estimated
                );
                plan.apply_toc_shift(item_index, realized)?;
                TocState::ShiftApplied {
                    estimated,
                    realized,
                }
            }
            TocState::ShiftApplied {
                estimated,
                realized,
            } => {
                let composition = self.compose(plan).await?;
                if let Some(toc) = composition.toc.as_ref().filter(|toc| !toc.converged()) {
                    return Err(Error::TocNotConverged {
                        estimated,
                        realized,
                        recomposed: toc.realized,
                    });
                }
                self.composition = Some(composition);
                TocState::Recomposed {
                    estimated,
                    realized,
                }
            }
            terminal @ (TocState::NoToc | TocState::Recomposed { .. }) => terminal,
        };
        Ok(())
    }

    async fn compose(&mut self, plan: &LayoutPlan) -> Result<Composition> {
        self.passes += 1;
        debug!("Composition pass {}", self.passes);
        self.composer.compose(plan).await
    }
}
