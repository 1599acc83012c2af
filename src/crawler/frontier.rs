//! Crawl frontier
//!
//! The frontier is the only crawl state shared between concurrent workers. It
//! tracks three disjoint sets of addresses:
//! - pending: admitted and waiting to be claimed, in admission order
//! - in flight: claimed by a worker, not yet marked visited
//! - visited: fetched (successfully or not), never fetched again
//!
//! Every operation takes a single lock, so each one is atomic with respect to
//! the others.

use crate::url::{Address, Origin};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where an address currently sits in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressState {
    Pending,
    InFlight,
    Visited,
}

#[derive(Debug, Default)]
struct FrontierState {
    visited: HashSet<Address>,
    pending: VecDeque<Address>,
    queued: HashSet<Address>,
    in_flight: HashSet<Address>,
}

impl FrontierState {
    fn known(&self) -> usize {
        self.visited.len() + self.queued.len() + self.in_flight.len()
    }

    fn contains(&self, address: &Address) -> bool {
        self.visited.contains(address)
            || self.queued.contains(address)
            || self.in_flight.contains(address)
    }
}

/// Thread-safe set of visited addresses plus the queue of addresses to visit
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::Frontier;
/// use sumi_harvest::url::Address;
///
/// let seed = Address::parse("https://example.com/").unwrap();
/// let frontier = Frontier::new(seed.clone(), 10);
///
/// let batch = frontier.claim_batch(4);
/// assert_eq!(batch, vec![seed.clone()]);
///
/// frontier.mark_visited(&seed);
/// assert!(frontier.is_exhausted());
/// ```
#[derive(Debug)]
pub struct Frontier {
    origin: Origin,
    max_pages: usize,
    state: Mutex<FrontierState>,
}

impl Frontier {
    /// Creates a frontier holding only the seed
    ///
    /// The seed's origin becomes the crawl origin. The seed counts towards the
    /// page ceiling like any other address.
    pub fn new(seed: Address, max_pages: usize) -> Self {
        let origin = seed.origin();
        let mut state = FrontierState::default();

        if max_pages > 0 {
            state.queued.insert(seed.clone());
            state.pending.push_back(seed);
        }

        Self {
            origin,
            max_pages,
            state: Mutex::new(state),
        }
    }

    /// The origin every admitted address must belong to
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Moves up to `max_size` pending addresses into flight and returns them
    ///
    /// Concurrent claimers never receive the same address. Fewer than
    /// `max_size` addresses (possibly none) are returned once the pending
    /// queue runs dry.
    pub fn claim_batch(&self, max_size: usize) -> Vec<Address> {
        let mut state = self.lock();
        let mut batch = Vec::with_capacity(max_size.min(state.pending.len()));

        while batch.len() < max_size {
            let Some(address) = state.pending.pop_front() else {
                break;
            };
            state.queued.remove(&address);

            if state.visited.contains(&address) {
                continue;
            }

            state.in_flight.insert(address.clone());
            batch.push(address);
        }

        batch
    }

    /// Records that an address has been fetched
    ///
    /// Idempotent. Marking an address that was never claimed also records it
    /// as visited and removes it from the pending queue.
    pub fn mark_visited(&self, address: &Address) {
        let mut state = self.lock();

        state.in_flight.remove(address);
        if state.queued.remove(address) {
            state.pending.retain(|pending| pending != address);
        }
        state.visited.insert(address.clone());
    }

    /// Offers discovered addresses for admission
    ///
    /// An address is admitted into the pending queue iff it is in the crawl
    /// origin, the frontier has never seen it, and the number of visited,
    /// pending and in-flight addresses is still below the page ceiling.
    /// Anything else is dropped silently.
    ///
    /// # Returns
    ///
    /// The number of addresses admitted
    pub fn offer<I>(&self, addresses: I) -> usize
    where
        I: IntoIterator<Item = Address>,
    {
        let mut state = self.lock();
        let mut admitted = 0;

        for address in addresses {
            if state.known() >= self.max_pages {
                tracing::trace!("Page ceiling reached, dropping {}", address);
                continue;
            }

            if !self.origin.contains(&address) {
                tracing::trace!("Dropping off-origin address {}", address);
                continue;
            }

            if state.contains(&address) {
                continue;
            }

            tracing::trace!("Admitting {}", address);
            state.queued.insert(address.clone());
            state.pending.push_back(address);
            admitted += 1;
        }

        admitted
    }

    /// Returns true when no further work can be claimed
    ///
    /// That is the case when nothing is in flight and either nothing is
    /// pending or the ceiling has already been reached by visited addresses.
    pub fn is_exhausted(&self) -> bool {
        let state = self.lock();
        state.in_flight.is_empty()
            && (state.pending.is_empty() || state.visited.len() >= self.max_pages)
    }

    /// Reports where an address sits, or `None` if it was never admitted
    pub fn state_of(&self, address: &Address) -> Option<AddressState> {
        let state = self.lock();

        if state.visited.contains(address) {
            Some(AddressState::Visited)
        } else if state.in_flight.contains(address) {
            Some(AddressState::InFlight)
        } else if state.queued.contains(address) {
            Some(AddressState::Pending)
        } else {
            None
        }
    }

    /// Returns the visited addresses, sorted
    pub fn visited(&self) -> Vec<Address> {
        let mut visited: Vec<_> = self.lock().visited.iter().cloned().collect();
        visited.sort();
        visited
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().queued.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    // Every critical section leaves the sets consistent, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
