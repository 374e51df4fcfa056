// Copyright  (C) 2020, Kisio Digital and/or its affiliates. All rights reserved.
//
// This file is part of Navitia,
// the software to build cool stuff with public transport.
//
// Hope you'll enjoy and contribute to this project,
// powered by Kisio Digital (www.kisio.com).
// Help us simplify mobility and open public transport:
// a non ending quest to the responsive locomotion way of traveling!
//
// This contribution is a part of the research and development work of the
// IVA Project which aims to enhance traveler information and is carried out
// under the leadership of the Technological Research Institute SystemX,
// with the partnership and support of the transport organization authority
// Ile-De-France Mobilités (IDFM), SNCF, and public funds
// under the scope of the French Program "Investissements d’Avenir".
//
// LICENCE: This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.
//
// Stay tuned using
// twitter @navitia
// channel `#navitia` on riot https://riot.im/app/#/room/#navitia:matrix.org
// https://groups.google.com/d/forum/navitia
// www.navitia.io

//! Min-priority queue over `(label, stop)` where each stop has at most
//! one *valid* entry at any time.
//!
//! A push with a smaller label does not sift the old entry out of the
//! heap; it inserts a second entry and remembers that only the smaller
//! label is valid. Stale entries are discarded lazily when popped. This
//! gives Dijkstra's decrease-key by reinsertion without touching heap
//! internals.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use tracing::trace;

use crate::network::StopId;

#[derive(Debug, Clone, Copy)]
pub struct LabelStop {
    pub label: f64,
    pub stop: StopId,
}

// The heap must behave as a min-heap on labels, stop id as tie break.
impl Ord for LabelStop {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .label
            .total_cmp(&self.label)
            .then_with(|| other.stop.cmp(&self.stop))
    }
}

impl PartialOrd for LabelStop {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LabelStop {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LabelStop {}

/// Per-stop bookkeeping: the only valid label for this stop, whether the
/// stop currently has a valid entry, and how many entries (valid and
/// stale) the heap holds for it.
#[derive(Debug, Clone, Copy)]
struct LabelCount {
    label: f64,
    valid: bool,
    count: u32,
}

#[derive(Debug)]
pub enum LabelQueueError {
    /// A popped stop has no bookkeeping entry.
    MissingBookkeeping(StopId),
    /// Bookkeeping claims fewer heap entries than the heap holds, or a
    /// valid stop survived heap exhaustion.
    CorruptCount(StopId),
}

impl std::fmt::Display for LabelQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelQueueError::MissingBookkeeping(stop) => {
                write!(f, "No bookkeeping entry for stop {} in label queue", stop)
            }
            LabelQueueError::CorruptCount(stop) => {
                write!(f, "Corrupt entry count for stop {} in label queue", stop)
            }
        }
    }
}

impl std::error::Error for LabelQueueError {}

#[derive(Debug, Default)]
pub struct LabelStopQueue {
    heap: BinaryHeap<LabelStop>,
    bookkeeping: BTreeMap<StopId, LabelCount>,
    valid_count: usize,
}

impl LabelStopQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label_stop: LabelStop) {
        match self.bookkeeping.get_mut(&label_stop.stop) {
            None => {
                self.heap.push(label_stop);
                self.bookkeeping.insert(
                    label_stop.stop,
                    LabelCount {
                        label: label_stop.label,
                        valid: true,
                        count: 1,
                    },
                );
                self.valid_count += 1;
            }
            // every valid instance has been popped already, so this is a
            // plain re-activation
            Some(label_count) if !label_count.valid => {
                self.heap.push(label_stop);
                label_count.label = label_stop.label;
                label_count.valid = true;
                label_count.count += 1;
                self.valid_count += 1;
            }
            Some(label_count) => {
                // a smaller label supersedes the remembered one; the old
                // heap entry goes stale and will be skipped on pop
                if label_stop.label < label_count.label {
                    self.heap.push(label_stop);
                    label_count.label = label_stop.label;
                    label_count.count += 1;
                }
                // a bigger label would be popped after the remembered one
                // anyway, so dropping it loses nothing
            }
        }
    }

    /// Pop the valid entry with the lowest label, discarding stale
    /// entries along the way. The popped stop becomes invalid; a later
    /// push with a fresh label re-activates it.
    pub fn pop_top(&mut self) -> Result<LabelStop, LabelQueueError> {
        loop {
            let label_stop = match self.heap.pop() {
                Some(label_stop) => label_stop,
                None => {
                    // a heap drained while valid entries remain means the
                    // counters went out of sync somewhere
                    let stop = self.bookkeeping.keys().next().copied().unwrap_or(0);
                    return Err(LabelQueueError::CorruptCount(stop));
                }
            };
            let label_count = self
                .bookkeeping
                .get_mut(&label_stop.stop)
                .ok_or(LabelQueueError::MissingBookkeeping(label_stop.stop))?;
            if label_count.count == 0 {
                return Err(LabelQueueError::CorruptCount(label_stop.stop));
            }
            if !label_count.valid {
                trace!(
                    "Skipping invalidated stop {} with label {}",
                    label_stop.stop,
                    label_stop.label
                );
                label_count.count -= 1;
                continue;
            }
            // valid stop, but only the remembered label is the live one
            if label_count.label != label_stop.label {
                trace!(
                    "Skipping stale label {} for stop {} (valid label {})",
                    label_stop.label,
                    label_stop.stop,
                    label_count.label
                );
                label_count.count -= 1;
                continue;
            }
            label_count.valid = false;
            label_count.count -= 1;
            self.valid_count -= 1;
            return Ok(label_stop);
        }
    }

    /// Number of *valid* entries; stale heap entries do not count.
    pub fn len(&self) -> usize {
        self.valid_count
    }

    pub fn is_empty(&self) -> bool {
        self.valid_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_stop(label: f64, stop: StopId) -> LabelStop {
        LabelStop { label, stop }
    }

    #[test]
    fn pops_in_label_order_with_stop_tie_break() {
        let mut queue = LabelStopQueue::new();
        queue.push(label_stop(3.0, 7));
        queue.push(label_stop(1.0, 9));
        queue.push(label_stop(1.0, 2));

        let first = queue.pop_top().unwrap();
        assert_eq!((first.stop, first.label), (2, 1.0));
        let second = queue.pop_top().unwrap();
        assert_eq!((second.stop, second.label), (9, 1.0));
        let third = queue.pop_top().unwrap();
        assert_eq!((third.stop, third.label), (7, 3.0));
        assert!(queue.is_empty());
    }

    #[test]
    fn smaller_label_supersedes_and_stale_entry_is_skipped() {
        let mut queue = LabelStopQueue::new();
        queue.push(label_stop(5.0, 1));
        queue.push(label_stop(2.0, 1));
        // one valid entry only, even though the heap holds two
        assert_eq!(queue.len(), 1);

        let popped = queue.pop_top().unwrap();
        assert_eq!(popped.label, 2.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn bigger_label_is_dropped() {
        let mut queue = LabelStopQueue::new();
        queue.push(label_stop(2.0, 1));
        queue.push(label_stop(5.0, 1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_top().unwrap().label, 2.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn popped_stop_can_be_reactivated() {
        let mut queue = LabelStopQueue::new();
        queue.push(label_stop(2.0, 1));
        queue.pop_top().unwrap();
        assert!(queue.is_empty());

        queue.push(label_stop(7.0, 1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_top().unwrap().label, 7.0);
    }

    #[test]
    fn valid_count_tracks_distinct_pending_stops() {
        let mut queue = LabelStopQueue::new();
        for (label, stop) in [(4.0, 1), (3.0, 1), (2.0, 1), (9.0, 2), (1.0, 3)] {
            queue.push(label_stop(label, stop));
        }
        // three distinct stops pending, five heap entries
        assert_eq!(queue.len(), 3);
        queue.pop_top().unwrap();
        queue.pop_top().unwrap();
        queue.pop_top().unwrap();
        assert!(queue.is_empty());
    }
}
