//! One refinement level: handle-linked element and node lists.
//!
//! Records are stored in [`Slots`] arenas; each record embeds its own
//! [`Links`] so that a [`ListHead`] can append and unlink in O(1) without
//! owning the records. Unlinking never moves a record, so handles stay
//! valid until the slot itself is vacated.

use std::marker::PhantomData;

/// Previous/next handles of a record inside its level list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Links<H> {
    pub prev: Option<H>,
    pub next: Option<H>,
}

impl<H> Default for Links<H> {
    fn default() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

/// Records that carry list links.
pub trait Linked<H> {
    fn links(&self) -> &Links<H>;
    fn links_mut(&mut self) -> &mut Links<H>;
}

/// Handle types that address a slot.
pub trait SlotHandle: Copy + Eq {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! slot_handle {
    ($($h:ty),*) => {$(
        impl SlotHandle for $h {
            fn from_index(index: usize) -> Self { <$h>::from_index(index) }
            fn index(self) -> usize { <$h>::index(self) }
        }
    )*};
}
slot_handle!(
    crate::topology::handle::ElementId,
    crate::topology::handle::NodeId,
    crate::topology::handle::VertexId
);

/// Arena of optional records addressed by handle.
#[derive(Clone, Debug)]
pub struct Slots<H, T> {
    items: Vec<Option<T>>,
    live: usize,
    _h: PhantomData<H>,
}

impl<H, T> Default for Slots<H, T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            live: 0,
            _h: PhantomData,
        }
    }
}

impl<H: SlotHandle, T> Slots<H, T> {
    /// Store `item` in a fresh slot.
    pub fn insert(&mut self, item: T) -> H {
        let h = H::from_index(self.items.len());
        self.items.push(Some(item));
        self.live += 1;
        h
    }

    pub fn get(&self, h: H) -> Option<&T> {
        self.items.get(h.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, h: H) -> Option<&mut T> {
        self.items.get_mut(h.index()).and_then(Option::as_mut)
    }

    /// Vacate the slot of `h`, returning its record.
    pub fn remove(&mut self, h: H) -> Option<T> {
        let taken = self.items.get_mut(h.index()).and_then(Option::take);
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (H::from_index(i), t)))
    }
}

/// Head of a doubly linked list threaded through records of a [`Slots`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListHead<H> {
    first: Option<H>,
    last: Option<H>,
    len: usize,
}

impl<H> Default for ListHead<H> {
    fn default() -> Self {
        Self {
            first: None,
            last: None,
            len: 0,
        }
    }
}

impl<H: SlotHandle> ListHead<H> {
    pub fn first(&self) -> Option<H> {
        self.first
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `h` at the tail. `h` must be live and not linked elsewhere.
    pub fn push_back<T: Linked<H>>(&mut self, slots: &mut Slots<H, T>, h: H) {
        let prev = self.last;
        if let Some(rec) = slots.get_mut(h) {
            *rec.links_mut() = Links { prev, next: None };
        }
        match prev.and_then(|p| slots.get_mut(p)) {
            Some(rec) => rec.links_mut().next = Some(h),
            None => self.first = Some(h),
        }
        self.last = Some(h);
        self.len += 1;
    }

    /// Remove `h` from the list in O(1). The record stays in its slot.
    pub fn unlink<T: Linked<H>>(&mut self, slots: &mut Slots<H, T>, h: H) {
        let Links { prev, next } = match slots.get_mut(h) {
            Some(rec) => std::mem::take(rec.links_mut()),
            None => return,
        };
        match prev.and_then(|p| slots.get_mut(p)) {
            Some(rec) => rec.links_mut().next = next,
            None => self.first = next,
        }
        match next.and_then(|n| slots.get_mut(n)) {
            Some(rec) => rec.links_mut().prev = prev,
            None => self.last = prev,
        }
        self.len -= 1;
    }

    /// Iterate handles from head to tail.
    pub fn iter<'a, T: Linked<H>>(&self, slots: &'a Slots<H, T>) -> ListIter<'a, H, T> {
        ListIter {
            cur: self.first,
            slots,
        }
    }
}

/// Iterator over a [`ListHead`].
pub struct ListIter<'a, H, T> {
    cur: Option<H>,
    slots: &'a Slots<H, T>,
}

impl<H: SlotHandle, T: Linked<H>> Iterator for ListIter<'_, H, T> {
    type Item = H;

    fn next(&mut self) -> Option<H> {
        let h = self.cur?;
        self.cur = self.slots.get(h).and_then(|r| r.links().next);
        Some(h)
    }
}

/// Element and node lists of one refinement level.
#[derive(Clone, Debug)]
pub struct Grid<E, N> {
    pub(crate) level: usize,
    pub(crate) elements: ListHead<E>,
    pub(crate) nodes: ListHead<N>,
}

impl<E: SlotHandle, N: SlotHandle> Grid<E, N> {
    pub fn new(level: usize) -> Self {
        Self {
            level,
            elements: ListHead::default(),
            nodes: ListHead::default(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of elements on this level.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of nodes on this level.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::handle::ElementId;

    #[derive(Default)]
    struct Rec {
        links: Links<ElementId>,
        tag: u8,
    }

    impl Linked<ElementId> for Rec {
        fn links(&self) -> &Links<ElementId> {
            &self.links
        }
        fn links_mut(&mut self) -> &mut Links<ElementId> {
            &mut self.links
        }
    }

    fn build(n: u8) -> (Slots<ElementId, Rec>, ListHead<ElementId>, Vec<ElementId>) {
        let mut slots = Slots::default();
        let mut head = ListHead::default();
        let mut hs = Vec::new();
        for tag in 0..n {
            let h = slots.insert(Rec {
                tag,
                ..Default::default()
            });
            head.push_back(&mut slots, h);
            hs.push(h);
        }
        (slots, head, hs)
    }

    #[test]
    fn unlinked_record_has_empty_links() {
        let (mut slots, mut head, hs) = build(3);
        head.unlink(&mut slots, hs[1]);
        assert_eq!(slots.get(hs[1]).unwrap().links, Links::<ElementId>::default());
        assert_eq!(
            slots.get(hs[0]).unwrap().links,
            Links {
                prev: None,
                next: Some(hs[2])
            }
        );
    }

    #[test]
    fn push_back_preserves_order() {
        let (slots, head, hs) = build(4);
        assert_eq!(head.iter(&slots).collect::<Vec<_>>(), hs);
        assert_eq!(head.len(), 4);
    }

    #[test]
    fn unlink_middle_head_and_tail() {
        let (mut slots, mut head, hs) = build(5);
        head.unlink(&mut slots, hs[2]);
        head.unlink(&mut slots, hs[0]);
        head.unlink(&mut slots, hs[4]);
        let tags: Vec<u8> = head
            .iter(&slots)
            .map(|h| slots.get(h).unwrap().tag)
            .collect();
        assert_eq!(tags, vec![1, 3]);
        assert_eq!(head.len(), 2);
        // unlinked records keep their slot
        assert!(slots.get(hs[2]).is_some());
    }

    #[test]
    fn unlink_all_then_reuse() {
        let (mut slots, mut head, hs) = build(2);
        for h in &hs {
            head.unlink(&mut slots, *h);
        }
        assert!(head.is_empty());
        assert_eq!(head.first(), None);
        head.push_back(&mut slots, hs[1]);
        assert_eq!(head.iter(&slots).collect::<Vec<_>>(), vec![hs[1]]);
    }

    #[test]
    fn slot_removal_counts() {
        let (mut slots, _, hs) = build(3);
        assert_eq!(slots.remove(hs[1]).map(|r| r.tag), Some(1));
        assert!(slots.remove(hs[1]).is_none());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.iter().count(), 2);
    }
}
