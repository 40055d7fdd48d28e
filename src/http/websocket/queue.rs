//! Bounded FIFO holding client messages until the upstream opens.

use std::collections::VecDeque;

use crate::config::OverflowPolicy;

/// Result of offering a message to a full or non-full queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Enqueued<T> {
    /// The message was appended.
    Accepted,
    /// The message was appended after evicting the returned oldest one.
    Evicted(T),
    /// The queue was full and the message was discarded.
    Dropped(T),
    /// The queue was full and the session must close.
    Overflow,
}

#[derive(Debug)]
pub struct PendingQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> PendingQueue<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            policy,
        }
    }

    pub fn push(&mut self, item: T) -> Enqueued<T> {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return Enqueued::Accepted;
        }
        match self.policy {
            OverflowPolicy::Close => Enqueued::Overflow,
            OverflowPolicy::DropNewest => Enqueued::Dropped(item),
            OverflowPolicy::DropOldest => {
                let evicted = self.items.pop_front();
                self.items.push_back(item);
                match evicted {
                    Some(evicted) => Enqueued::Evicted(evicted),
                    None => Enqueued::Accepted,
                }
            }
        }
    }

    /// Remove every pending message, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}
