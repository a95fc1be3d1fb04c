// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Arena-backed recency list.
//!
//! Nodes live in a slot vector and link to each other by index, so moving an
//! entry to the front or unlinking it never reallocates. Freed slots are
//! recycled through a free list. The `index` map resolves a key to its slot.

use std::collections::HashMap;

use tierstore_tier::EntityKey;
use tokio::time::Instant;

#[derive(Debug)]
struct Node<V> {
    key: EntityKey,
    value: V,
    expires_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Entries ordered from most (`head`) to least (`tail`) recently used.
#[derive(Debug)]
pub(crate) struct LruList<V> {
    capacity: usize,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    index: HashMap<EntityKey, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<V> LruList<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns the live value under `key` and marks it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    pub(crate) fn get(&mut self, key: &EntityKey, now: Instant) -> Option<&V> {
        let slot = *self.index.get(key)?;
        if self.node(slot).expires_at <= now {
            self.remove_slot(slot);
            return None;
        }

        self.detach(slot);
        self.push_front(slot);
        Some(&self.node(slot).value)
    }

    /// Returns `true` if `key` holds a live entry. Recency is left untouched.
    pub(crate) fn peek(&self, key: &EntityKey, now: Instant) -> bool {
        self.index
            .get(key)
            .is_some_and(|&slot| self.node(slot).expires_at > now)
    }

    /// Inserts or refreshes `key`, returning the key evicted to make room.
    pub(crate) fn insert(&mut self, key: EntityKey, value: V, expires_at: Instant) -> Option<EntityKey> {
        if let Some(&slot) = self.index.get(&key) {
            let node = self.node_mut(slot);
            node.value = value;
            node.expires_at = expires_at;
            self.detach(slot);
            self.push_front(slot);
            return None;
        }

        let evicted = match self.tail {
            Some(tail) if self.index.len() >= self.capacity => Some(self.remove_slot(tail).0),
            _ => None,
        };

        let node = Node {
            key: key.clone(),
            value,
            expires_at,
            prev: None,
            next: None,
        };
        let slot = if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(node);
            slot
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        };
        self.index.insert(key, slot);
        self.push_front(slot);

        evicted
    }

    pub(crate) fn remove(&mut self, key: &EntityKey) -> Option<V> {
        let slot = *self.index.get(key)?;
        Some(self.remove_slot(slot).1)
    }

    /// Removes every entry whose expiry is at or before `now`.
    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<usize> = self
            .index
            .values()
            .copied()
            .filter(|&slot| self.node(slot).expires_at <= now)
            .collect();

        for &slot in &expired {
            self.remove_slot(slot);
        }
        expired.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    pub(crate) fn keys(&self) -> Vec<EntityKey> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let node = self.node(slot);
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }

    fn node(&self, slot: usize) -> &Node<V> {
        self.slots[slot].as_ref().unwrap_or_else(|| unreachable!("slot {slot} is linked but vacant"))
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node<V> {
        self.slots[slot].as_mut().unwrap_or_else(|| unreachable!("slot {slot} is linked but vacant"))
    }

    fn remove_slot(&mut self, slot: usize) -> (EntityKey, V) {
        self.detach(slot);
        let node = self.slots[slot].take().unwrap_or_else(|| unreachable!("slot {slot} is linked but vacant"));
        self.index.remove(&node.key);
        self.free.push(slot);
        (node.key, node.value)
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.node(slot);
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }

        let node = self.node_mut(slot);
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(slot);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => self.node_mut(head).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn key(id: i64) -> EntityKey {
        EntityKey::Integer(id)
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[test]
    fn insert_orders_most_recent_first() {
        let mut list = LruList::new(3);
        list.insert(key(1), "a", far());
        list.insert(key(2), "b", far());
        list.insert(key(3), "c", far());
        assert_eq!(list.keys(), vec![key(3), key(2), key(1)]);
    }

    #[test]
    fn full_list_evicts_tail() {
        let mut list = LruList::new(2);
        list.insert(key(1), "a", far());
        list.insert(key(2), "b", far());
        assert_eq!(list.insert(key(3), "c", far()), Some(key(1)));
        assert_eq!(list.keys(), vec![key(3), key(2)]);
    }

    #[test]
    fn refresh_moves_to_front_without_eviction() {
        let mut list = LruList::new(2);
        list.insert(key(1), "a", far());
        list.insert(key(2), "b", far());
        assert_eq!(list.insert(key(1), "z", far()), None);
        assert_eq!(list.keys(), vec![key(1), key(2)]);
        assert_eq!(list.get(&key(1), Instant::now()), Some(&"z"));
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut list = LruList::new(2);
        list.insert(key(1), 1, far());
        list.insert(key(2), 2, far());
        assert_eq!(list.remove(&key(1)), Some(1));
        list.insert(key(3), 3, far());
        assert_eq!(list.slots.len(), 2);
        assert_eq!(list.keys(), vec![key(3), key(2)]);
    }

    #[test]
    fn get_of_expired_entry_removes_it() {
        let now = Instant::now();
        let mut list = LruList::new(2);
        list.insert(key(1), 1, now);
        assert!(!list.peek(&key(1), now));
        assert_eq!(list.get(&key(1), now), None);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn purge_keeps_live_entries_linked() {
        let now = Instant::now();
        let mut list = LruList::new(4);
        list.insert(key(1), 1, now);
        list.insert(key(2), 2, far());
        list.insert(key(3), 3, now);
        list.insert(key(4), 4, far());

        assert_eq!(list.purge_expired(now), 2);
        assert_eq!(list.keys(), vec![key(4), key(2)]);
        assert_eq!(list.tail, list.index.get(&key(2)).copied());
    }

    #[test]
    fn clear_empties_everything() {
        let mut list = LruList::new(2);
        list.insert(key(1), 1, far());
        list.clear();
        assert_eq!(list.len(), 0);
        assert!(list.keys().is_empty());
    }
}
