//! Per-key coalescing of concurrent work
//!
//! The first caller to [`SingleFlight::claim`] a key becomes its leader and
//! does the work; everyone who claims the same key while the leader is busy
//! gets a follower that resolves with the leader's value. A leader dropped
//! before completing frees the key and wakes its followers empty-handed, so
//! one of them can claim again.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

struct Flight<V> {
    id: u64,
    receiver: watch::Receiver<Option<V>>,
}

struct Flights<K, V> {
    active: HashMap<K, Flight<V>>,
    next_id: u64,
}

pub struct SingleFlight<K, V> {
    flights: Mutex<Flights<K, V>>,
}

pub enum Claim<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    Leader(Leader<'a, K, V>),
    Follower(Follower<V>),
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(Flights {
                active: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    pub fn claim(&self, key: &K) -> Claim<'_, K, V> {
        let mut flights = self.lock();

        if let Some(flight) = flights.active.get(key) {
            return Claim::Follower(Follower {
                receiver: flight.receiver.clone(),
            });
        }

        let (sender, receiver) = watch::channel(None);
        let id = flights.next_id;
        flights.next_id = flights.next_id.wrapping_add(1);
        flights.active.insert(key.clone(), Flight { id, receiver });

        Claim::Leader(Leader {
            owner: self,
            key: key.clone(),
            id,
            sender,
            completed: false,
        })
    }

    /// Number of keys with a leader at work
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
{
    fn lock(&self) -> MutexGuard<'_, Flights<K, V>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Only the flight that `id` started is removed; a later leader for the
    /// same key keeps its slot
    fn release(&self, key: &K, id: u64) {
        let mut flights = self.lock();
        if flights.active.get(key).is_some_and(|flight| flight.id == id) {
            flights.active.remove(key);
        }
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

pub struct Leader<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    owner: &'a SingleFlight<K, V>,
    key: K,
    id: u64,
    sender: watch::Sender<Option<V>>,
    completed: bool,
}

impl<K, V> Leader<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Free the key and hand `value` to every follower
    pub fn complete(mut self, value: V) {
        self.owner.release(&self.key, self.id);
        self.sender.send_replace(Some(value));
        self.completed = true;
    }
}

impl<K, V> Drop for Leader<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if !self.completed {
            self.owner.release(&self.key, self.id);
        }
    }
}

pub struct Follower<V> {
    receiver: watch::Receiver<Option<V>>,
}

impl<V: Clone> Follower<V> {
    /// The leader's value, or `None` if the leader went away without one
    pub async fn wait(mut self) -> Option<V> {
        let value = match self.receiver.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        value
    }
}
