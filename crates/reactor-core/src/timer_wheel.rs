//! Hashed-ring timer wheel with intrusive, slot-indexed linkage.
//!
//! The classic C implementation (see `event-timeout.h` in the prior art this
//! module is modeled on) stores a `prev` pointer-to-pointer in each node so
//! unlinking never needs to know which bucket the node lives in: `prev`
//! holds the address of whatever link field points at this node, whether
//! that's a bucket head or another node's `next`. [`Anchor`] is the same
//! trick re-expressed without raw pointers: it names either the owning
//! bucket or the owning slot, and [`TimerWheel::unlink`] dereferences
//! through it.

use crate::clock::Tick;

/// Number of buckets; must stay a power of two so `% N` is a bitmask.
pub const WHEEL_BUCKETS: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    Bucket(usize),
    Slot(usize),
}

/// Intrusive timer node, meant to be embedded in the record it times out.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimerLink {
    timestamp: Tick,
    next: Option<usize>,
    anchor: Option<Anchor>,
}

impl TimerLink {
    pub const fn new() -> Self {
        Self { timestamp: 0, next: None, anchor: None }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.anchor.is_some()
    }

    #[inline]
    pub fn timestamp(&self) -> Tick {
        self.timestamp
    }
}

/// Gives a [`TimerWheel`] mutable access to the link embedded at a given
/// slot, without the wheel needing to own the records it times out.
///
/// Implementations are expected to be cheap newtype wrappers over `&mut
/// Vec<Record>` selecting one of several timer fields on `Record` (a
/// connection may sit in the inactivity, sleep, and receive wheels
/// simultaneously, each via its own [`TimerLink`]).
pub trait TimerLinks {
    fn link_mut(&mut self, slot: usize) -> &mut TimerLink;
}

/// A hashed-ring timeout queue keyed by `expiry mod WHEEL_BUCKETS`.
pub struct TimerWheel {
    buckets: Vec<Option<usize>>,
    last: Tick,
}

impl TimerWheel {
    pub fn create(now: Tick) -> Self {
        Self { buckets: vec![None; WHEEL_BUCKETS], last: now }
    }

    #[inline]
    fn bucket_of(expires: Tick) -> usize {
        (expires as usize) & (WHEEL_BUCKETS - 1)
    }

    /// Links `slot` to expire at `expires`. Unlinks it first if already
    /// linked (elsewhere in this wheel or not), so `add` after `add` acts
    /// like a reschedule rather than a duplicate insert. `O(1)`.
    pub fn add(&mut self, links: &mut impl TimerLinks, slot: usize, expires: Tick) {
        self.unlink(links, slot);
        debug_assert!(expires > self.last, "timer linked in the past relative to the wheel cursor");

        let bucket = Self::bucket_of(expires);
        let old_head = self.buckets[bucket];
        {
            let link = links.link_mut(slot);
            link.timestamp = expires;
            link.next = old_head;
            link.anchor = Some(Anchor::Bucket(bucket));
        }
        if let Some(head) = old_head {
            links.link_mut(head).anchor = Some(Anchor::Slot(slot));
        }
        self.buckets[bucket] = Some(slot);
    }

    /// Detaches `slot` from whatever list it's in. Safe (and a no-op) to
    /// call on an already-unlinked slot.
    pub fn unlink(&mut self, links: &mut impl TimerLinks, slot: usize) {
        let (anchor, next) = {
            let link = links.link_mut(slot);
            let anchor = link.anchor.take();
            let next = link.next.take();
            link.timestamp = 0;
            (anchor, next)
        };
        let Some(anchor) = anchor else { return };

        match anchor {
            Anchor::Bucket(b) => self.buckets[b] = next,
            Anchor::Slot(prev_slot) => links.link_mut(prev_slot).next = next,
        }
        if let Some(next_slot) = next {
            links.link_mut(next_slot).anchor = Some(anchor);
        }
    }

    /// Returns the slot of one entry whose timestamp is `<= now`, or `None`
    /// if everything due up to `now` has already been drained. Call
    /// repeatedly until `None` to fully drain. Walks buckets from `last + 1`
    /// up to `now` inclusive; a bucket with nothing due advances the cursor
    /// past it.
    pub fn remove_expired(&mut self, links: &mut impl TimerLinks, now: Tick) -> Option<usize> {
        while self.last < now {
            let probe = self.last + 1;
            let bucket = Self::bucket_of(probe);

            let mut cur = self.buckets[bucket];
            while let Some(slot) = cur {
                let due = links.link_mut(slot).timestamp <= now;
                if due {
                    self.unlink(links, slot);
                    return Some(slot);
                }
                cur = links.link_mut(slot).next;
            }

            // Nothing in this bucket was due; every remaining entry here (if
            // any) belongs to a future wrap and stays untouched.
            self.last = probe;
        }
        None
    }

    pub fn last(&self) -> Tick {
        self.last
    }
}
