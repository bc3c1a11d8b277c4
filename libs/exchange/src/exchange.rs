use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

type Guard<T> = ArcMutexGuard<RawMutex, T>;

struct Shared<T> {
    value: T,
    update_available: bool,
    producer_attached: bool,
}

pub struct StateExchange<T> {
    name: &'static str,
    data: Arc<Mutex<Shared<T>>>,
    producer: Arc<Mutex<()>>,
    consumer: Arc<Mutex<()>>,
    producer_taken: Arc<AtomicBool>,
    consumer_taken: Arc<AtomicBool>,
}

impl<T> Clone for StateExchange<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            data: Arc::clone(&self.data),
            producer: Arc::clone(&self.producer),
            consumer: Arc::clone(&self.consumer),
            producer_taken: Arc::clone(&self.producer_taken),
            consumer_taken: Arc::clone(&self.consumer_taken),
        }
    }
}

impl<T: Clone + PartialEq + Send> StateExchange<T> {
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            data: Arc::new(Mutex::new(Shared {
                value: initial,
                update_available: false,
                producer_attached: false,
            })),
            producer: Arc::new(Mutex::new(())),
            consumer: Arc::new(Mutex::new(())),
            producer_taken: Arc::new(AtomicBool::new(false)),
            consumer_taken: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Takes the producer role. `None` while another producer is alive.
    pub fn producer(&self) -> Option<Producer<T>> {
        if self.producer_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        let held = self.producer.lock_arc();
        let shadow = {
            let mut data = self.data.lock();
            data.producer_attached = true;
            data.value.clone()
        };
        Some(Producer {
            exchange: self.clone(),
            held: Some(held),
            shadow,
        })
    }

    /// Takes the consumer role. `None` while another consumer is alive.
    pub fn consumer(&self) -> Option<Consumer<T>> {
        if self.consumer_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        let held = self.consumer.lock_arc();
        let shadow = self.data.lock().value.clone();
        Some(Consumer {
            exchange: self.clone(),
            held: Some(held),
            shadow,
        })
    }

    /// Copies the last committed value without consuming the update.
    pub fn snapshot(&self, timeout: Duration) -> Option<T> {
        self.data
            .try_lock_for(timeout)
            .map(|data| data.value.clone())
    }

    /// Whether a commit is waiting for the consumer
    pub fn update_available(&self) -> bool {
        self.data.lock().update_available
    }
}

/// Single writer handle; holds the *producer* lock for its lifetime
pub struct Producer<T: Clone + PartialEq + Send> {
    exchange: StateExchange<T>,
    held: Option<Guard<()>>,
    shadow: T,
}

impl<T: Clone + PartialEq + Send> Producer<T> {
    /// Locks *data* and speculates the write shadow from the shared value.
    pub fn produce(&mut self) -> ProduceGuard<'_, T> {
        let data = self.exchange.data.lock_arc();
        self.shadow.clone_from(&data.value);
        ProduceGuard {
            data: Some(data),
            producer: self,
        }
    }

    /// Replaces the whole value in one produce/commit cycle.
    pub fn publish(&mut self, value: T) -> bool {
        let mut guard = self.produce();
        *guard = value;
        guard.commit()
    }

    /// Hands the *producer* lock to a consumer parked on it, if any.
    fn hand_off(&mut self) {
        let Some(consumer) = self.exchange.consumer.try_lock_arc() else {
            return;
        };
        match self.held.as_mut() {
            Some(held) => ArcMutexGuard::unlocked_fair(held, move || drop(consumer)),
            None => drop(consumer),
        }
    }
}

impl<T: Clone + PartialEq + Send> Drop for Producer<T> {
    fn drop(&mut self) {
        self.exchange.data.lock().producer_attached = false;
        self.held = None;
        self.exchange.producer_taken.store(false, Ordering::Release);
    }
}

/// Open produce cycle; derefs to the write shadow
///
/// Dropping the guard without [`commit`](Self::commit) discards the shadow.
pub struct ProduceGuard<'a, T: Clone + PartialEq + Send> {
    producer: &'a mut Producer<T>,
    data: Option<Guard<Shared<T>>>,
}

impl<T: Clone + PartialEq + Send> ProduceGuard<'_, T> {
    /// Sets one field of the shadow; returns whether it changed.
    pub fn set_field<F: PartialEq>(&mut self, field: impl FnOnce(&mut T) -> &mut F, value: F) -> bool {
        let slot = field(&mut self.producer.shadow);
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }

    /// Publishes the shadow if it differs from the shared value.
    ///
    /// Returns whether an update was published.
    pub fn commit(mut self) -> bool {
        let Some(mut data) = self.data.take() else {
            return false;
        };
        let changed = data.value != self.producer.shadow;
        if changed {
            data.value.clone_from(&self.producer.shadow);
            data.update_available = true;
        }
        drop(data);
        if changed {
            trace!("{} committed", self.producer.exchange.name);
            self.producer.hand_off();
        }
        changed
    }
}

impl<T: Clone + PartialEq + Send> Deref for ProduceGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.producer.shadow
    }
}

impl<T: Clone + PartialEq + Send> DerefMut for ProduceGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.producer.shadow
    }
}

/// Single reader handle; holds the *consumer* lock for its lifetime
pub struct Consumer<T: Clone + PartialEq + Send> {
    exchange: StateExchange<T>,
    held: Option<Guard<()>>,
    shadow: T,
}

impl<T: Clone + PartialEq + Send> Consumer<T> {
    /// Waits up to `timeout` for an update and copies it into the read shadow.
    ///
    /// Returns the read shadow, or `None` if nothing new was committed in time.
    pub fn consume(&mut self, timeout: Duration) -> Option<&T> {
        let deadline = Instant::now() + timeout;
        let mut data = self.pre_consume(deadline)?;
        self.shadow.clone_from(&data.value);
        data.update_available = false;
        drop(data);
        Some(&self.shadow)
    }

    /// Last value copied out by [`consume`](Self::consume)
    pub fn latest(&self) -> &T {
        &self.shadow
    }

    fn pre_consume(&mut self, deadline: Instant) -> Option<Guard<Shared<T>>> {
        let data = self.exchange.data.try_lock_arc_until(deadline)?;
        if data.update_available {
            return Some(data);
        }
        let producer_attached = data.producer_attached;

        // Rendezvous: let the producer find *consumer* free on its next commit.
        self.held = None;
        drop(data);
        if !producer_attached {
            // nobody to hand off; wait out the deadline rather than spin
            std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
            self.held = Some(self.exchange.consumer.lock_arc());
            return None;
        }
        let producer = self.exchange.producer.try_lock_arc_until(deadline);
        self.held = Some(self.exchange.consumer.lock_arc());
        let Some(producer) = producer else {
            // a commit between releasing *consumer* and parking hands off to nobody
            return self
                .exchange
                .data
                .try_lock_arc()
                .filter(|data| data.update_available);
        };
        let data = self.exchange.data.try_lock_arc_until(deadline);
        drop(producer);
        let data = data?;
        if data.update_available {
            Some(data)
        } else {
            None
        }
    }
}

impl<T: Clone + PartialEq + Send> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.held = None;
        self.exchange.consumer_taken.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Status {
        clock_offset: i64,
        synced: bool,
    }

    #[test]
    fn later_commit_wins() {
        let exchange = StateExchange::new("status", Status::default());
        let mut producer = exchange.producer().unwrap();
        let mut consumer = exchange.consumer().unwrap();

        let mut guard = producer.produce();
        guard.clock_offset = 100;
        guard.synced = true;
        assert!(guard.commit());

        let mut guard = producer.produce();
        guard.clock_offset = -100;
        assert!(guard.commit());

        let seen = consumer.consume(Duration::from_millis(10)).unwrap();
        assert_eq!(
            *seen,
            Status {
                clock_offset: -100,
                synced: true
            }
        );
    }

    #[test]
    fn consume_without_update_times_out() {
        let exchange = StateExchange::new("status", Status::default());
        let _producer = exchange.producer().unwrap();
        let mut consumer = exchange.consumer().unwrap();

        let started = Instant::now();
        assert!(consumer.consume(Duration::from_millis(30)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn update_is_consumed_once() {
        let exchange = StateExchange::new("status", Status::default());
        let mut producer = exchange.producer().unwrap();
        let mut consumer = exchange.consumer().unwrap();
        producer.publish(Status {
            clock_offset: 1,
            synced: false,
        });
        assert!(consumer.consume(Duration::ZERO).is_some());
        assert!(consumer.consume(Duration::ZERO).is_none());
        assert_eq!(consumer.latest().clock_offset, 1);
    }

    #[test]
    fn unchanged_commit_publishes_nothing() {
        let exchange = StateExchange::new("status", Status::default());
        let mut producer = exchange.producer().unwrap();
        let mut guard = producer.produce();
        assert!(!guard.set_field(|s| &mut s.clock_offset, 0));
        assert!(!guard.commit());
        assert!(!exchange.update_available());
    }

    #[test]
    fn dropped_guard_discards_shadow() {
        let exchange = StateExchange::new("status", Status::default());
        let mut producer = exchange.producer().unwrap();
        {
            let mut guard = producer.produce();
            guard.clock_offset = 42;
        }
        assert_eq!(
            exchange.snapshot(Duration::from_millis(10)).unwrap(),
            Status::default()
        );
    }

    #[test]
    fn roles_are_exclusive_while_alive() {
        let exchange = StateExchange::new("status", Status::default());
        let producer = exchange.producer().unwrap();
        assert!(exchange.producer().is_none());
        drop(producer);
        assert!(exchange.producer().is_some());

        let consumer = exchange.consumer().unwrap();
        assert!(exchange.consumer().is_none());
        drop(consumer);
        assert!(exchange.consumer().is_some());
    }

    #[test]
    fn waiting_consumer_wakes_on_commit() {
        let exchange = StateExchange::new("status", Status::default());
        let mut producer = exchange.producer().unwrap();
        let mut consumer = exchange.consumer().unwrap();

        let reader = thread::spawn(move || {
            let started = Instant::now();
            let seen = consumer.consume(Duration::from_secs(2)).cloned();
            (seen, started.elapsed())
        });
        thread::sleep(Duration::from_millis(50));
        producer.publish(Status {
            clock_offset: 7,
            synced: true,
        });

        let (seen, waited) = reader.join().unwrap();
        assert_eq!(seen.map(|s| s.clock_offset), Some(7));
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn consume_without_producer_waits_out_deadline() {
        let exchange = StateExchange::new("status", Status::default());
        let mut consumer = exchange.consumer().unwrap();
        let started = Instant::now();
        assert!(consumer.consume(Duration::from_millis(20)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn snapshot_leaves_update_pending() {
        let exchange = StateExchange::new("status", Status::default());
        let mut producer = exchange.producer().unwrap();
        let mut consumer = exchange.consumer().unwrap();
        producer.publish(Status {
            clock_offset: 3,
            synced: false,
        });
        assert_eq!(
            exchange.snapshot(Duration::from_millis(10)).map(|s| s.clock_offset),
            Some(3)
        );
        assert!(consumer.consume(Duration::ZERO).is_some());
    }
}
