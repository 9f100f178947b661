use super::bookmark::{BookmarkArena, BookmarkItem};

/// Assign every bookmark its last page.
///
/// A bookmark ends one page before the next bookmark at the same or a
/// shallower depth, or at `total_pages` when there is none. Ends never precede
/// starts, so several bookmarks sharing one page each cover that page.
///
/// Recovered outline entries are resolved among themselves: they neither end
/// nor are ended by the page titles they are interleaved with, and they stop
/// at the end of the nearest bookmark above them that is not recovered.
///
/// Bookmarks waiting for their closing boundary are kept on a stack of
/// strictly increasing depth, which makes each pass linear.
pub fn resolve_ranges(arena: &mut BookmarkArena, total_pages: usize) {
    let depths = arena.depths();
    let anchors = recovered_anchors(arena);
    let items = arena.items_mut();

    let mut open: Vec<usize> = Vec::new();
    for next in 0..items.len() {
        if items[next].recovered {
            continue;
        }
        while let Some(&top) = open.last() {
            if depths[top] < depths[next] {
                break;
            }
            open.pop();
            let start = items[top].start_page;
            items[top].end_page = Some(items[next].start_page.saturating_sub(1).max(start));
        }
        open.push(next);
    }
    for remaining in open {
        let start = items[remaining].start_page;
        items[remaining].end_page = Some(total_pages.max(start));
    }

    let limit_of = |items: &[BookmarkItem], anchor: Option<usize>| {
        anchor
            .and_then(|a| items[a].end_page)
            .unwrap_or(total_pages)
    };
    let mut open: Vec<usize> = Vec::new();
    let mut anchor: Option<usize> = None;
    for next in 0..items.len() {
        if !items[next].recovered {
            continue;
        }
        let limit = limit_of(items, anchor);
        if anchors[next] != anchor {
            for top in open.drain(..) {
                let start = items[top].start_page;
                items[top].end_page = Some(limit.max(start));
            }
            anchor = anchors[next];
        }
        while let Some(&top) = open.last() {
            if depths[top] < depths[next] {
                break;
            }
            open.pop();
            let start = items[top].start_page;
            let end = items[next].start_page.saturating_sub(1).min(limit);
            items[top].end_page = Some(end.max(start));
        }
        open.push(next);
    }
    let limit = limit_of(items, anchor);
    for remaining in open {
        let start = items[remaining].start_page;
        items[remaining].end_page = Some(limit.max(start));
    }
}

/// For every recovered bookmark, the nearest ancestor that is not recovered.
fn recovered_anchors(arena: &BookmarkArena) -> Vec<Option<usize>> {
    let items = arena.items();
    let mut anchors: Vec<Option<usize>> = Vec::with_capacity(items.len());
    for item in items {
        let anchor = item.parent.and_then(|parent| {
            let parent = parent.as_usize();
            if items[parent].recovered {
                anchors[parent]
            } else {
                Some(parent)
            }
        });
        anchors.push(anchor);
    }
    anchors
}
