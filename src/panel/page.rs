//! Splitting panel entries into key-sized pages.

use serde::Serialize;

use crate::error::{DpError, Result};

/// What a key position on a page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "slot", content = "entry", rename_all = "snake_case")]
pub enum Slot {
    /// Index into the panel's entries.
    Entry(usize),
    Parent,
    NextPage,
    PreviousPage,
}

/// One screenful of slots; slot index is key index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PanelPage {
    pub slots: Vec<Slot>,
}

impl PanelPage {
    pub fn get(&self, key: usize) -> Option<Slot> {
        self.slots.get(key).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Entry(i) => Some(*i),
            _ => None,
        })
    }
}

/// Lay `entries` items out over pages of `capacity` keys.
///
/// Page 0 starts with a `Parent` slot when the panel has a parent, later pages
/// start with `PreviousPage`, and a page that cannot hold the rest ends with
/// `NextPage`.
pub fn paginate(entries: usize, capacity: usize, has_parent: bool) -> Result<Vec<PanelPage>> {
    if capacity < 3 {
        return Err(DpError::LayoutTooSmall { capacity });
    }

    let mut pages = Vec::new();
    let mut next = 0;
    loop {
        let mut slots = Vec::with_capacity(capacity);
        if pages.is_empty() {
            if has_parent {
                slots.push(Slot::Parent);
            }
        } else {
            slots.push(Slot::PreviousPage);
        }

        let free = capacity - slots.len();
        let remaining = entries - next;
        if remaining <= free {
            slots.extend((next..entries).map(Slot::Entry));
            pages.push(PanelPage { slots });
            return Ok(pages);
        }
        let take = free - 1;
        slots.extend((next..next + take).map(Slot::Entry));
        slots.push(Slot::NextPage);
        next += take;
        pages.push(PanelPage { slots });
    }
}
