//! Protocol bus: in-process, ordered, multi-subscriber dispatch.
//!
//! Delivery semantics:
//!
//! - The subscriber set is snapshotted at the start of each dispatch:
//!   subscribers added during a dispatch miss the in-flight emission,
//!   subscribers removed during it still receive it.
//! - A message emitted from inside a subscriber callback is queued and
//!   dispatched after the in-flight dispatch completes, so emissions are
//!   totally ordered and dispatch never nests. When two threads emit
//!   concurrently, one of them drains both messages; ordering is still
//!   the order the queue accepted them.
//! - A panicking callback is isolated and logged; the remaining callbacks
//!   in the same emission always run.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::message::SlavkoMessage;

type Callback = dyn Fn(&SlavkoMessage) + Send + Sync;

struct SubscriberEntry {
    id: u64,
    callback: Arc<Callback>,
}

struct EmitQueue {
    pending: VecDeque<SlavkoMessage>,
    last_stamp: Option<DateTime<Utc>>,
}

/// The pub/sub bus protocol messages travel on.
pub struct ProtocolBus {
    subscribers: Mutex<Vec<SubscriberEntry>>,
    queue: Mutex<EmitQueue>,
    drain: Mutex<()>,
    next_id: AtomicU64,
}

impl ProtocolBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(Vec::new()),
            queue: Mutex::new(EmitQueue {
                pending: VecDeque::new(),
                last_stamp: None,
            }),
            drain: Mutex::new(()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Register a callback. Delivery order is registration order.
    ///
    /// The returned handle removes the subscription exactly once via
    /// [`Subscription::unsubscribe`]; dropping the handle leaves the
    /// subscription in place.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&SlavkoMessage) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber list lock")
            .push(SubscriberEntry {
                id,
                callback: Arc::new(callback),
            });
        Subscription {
            bus: Arc::downgrade(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("subscriber list lock").len()
    }

    /// Emit a message to every currently subscribed callback, in
    /// registration order.
    ///
    /// The emission timestamp is stamped here, clamped so stamps never
    /// decrease in emission order even if the wall clock steps backwards.
    /// Synchronous callbacks complete before `emit` returns; callbacks
    /// that spawn asynchronous work return immediately and their later
    /// effects arrive as independent emissions.
    pub fn emit(&self, message: SlavkoMessage) {
        {
            let mut queue = self.queue.lock().expect("emit queue lock");
            let now = Utc::now();
            let stamp = match queue.last_stamp {
                Some(prev) if prev > now => prev,
                _ => now,
            };
            queue.last_stamp = Some(stamp);
            let mut stamped = message;
            stamped.timestamp = Some(stamp);
            queue.pending.push_back(stamped);
        }
        self.drain_queue();
    }

    fn drain_queue(&self) {
        loop {
            {
                // Only one drainer at a time. A nested emit from inside a
                // callback, or a concurrent emit on another thread, leaves
                // its message for the active drainer.
                let Ok(_guard) = self.drain.try_lock() else {
                    return;
                };
                loop {
                    let next = {
                        let mut queue = self.queue.lock().expect("emit queue lock");
                        queue.pending.pop_front()
                    };
                    let Some(message) = next else { break };
                    self.dispatch(&message);
                }
            }
            // The guard is released; if another emitter enqueued in the
            // window where it could not take over, pick the message up.
            let empty = self
                .queue
                .lock()
                .expect("emit queue lock")
                .pending
                .is_empty();
            if empty {
                return;
            }
        }
    }

    fn dispatch(&self, message: &SlavkoMessage) {
        let snapshot: Vec<Arc<Callback>> = self
            .subscribers
            .lock()
            .expect("subscriber list lock")
            .iter()
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(message))) {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".to_string());
                tracing::error!(
                    module = %message.module,
                    status = %message.status,
                    "subscriber callback panicked: {detail}"
                );
            }
        }
    }

    fn remove(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("subscriber list lock")
            .retain(|entry| entry.id != id);
    }
}

/// Handle pairing a subscribed callback with a stable identity.
#[must_use = "dropping the handle keeps the subscription alive; call unsubscribe to remove it"]
pub struct Subscription {
    bus: Weak<ProtocolBus>,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the subscription. Idempotent: a second call is a no-op.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(bus) = self.bus.upgrade() {
                bus.remove(self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Module, Status};
    use std::sync::Mutex as StdMutex;

    fn msg(module: Module, status: Status) -> SlavkoMessage {
        SlavkoMessage::new(module, status)
    }

    fn collector(
        bus: &Arc<ProtocolBus>,
        log: Arc<StdMutex<Vec<String>>>,
        tag: &'static str,
    ) -> Subscription {
        bus.subscribe(move |m| {
            log.lock().unwrap().push(format!("{tag}:{}", m.module));
        })
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = ProtocolBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let s1 = collector(&bus, Arc::clone(&log), "a");
        let s2 = collector(&bus, Arc::clone(&log), "b");
        let s3 = collector(&bus, Arc::clone(&log), "c");

        bus.emit(msg(Module::Session, Status::Done));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:SESSION", "b:SESSION", "c:SESSION"]
        );
        s1.unsubscribe();
        s2.unsubscribe();
        s3.unsubscribe();
    }

    #[test]
    fn test_panicking_callback_does_not_stop_later_ones() {
        let bus = ProtocolBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let _s1 = collector(&bus, Arc::clone(&log), "1");
        let _s2 = collector(&bus, Arc::clone(&log), "2");
        let _s3 = bus.subscribe(|_| panic!("callback exploded"));
        let _s4 = collector(&bus, Arc::clone(&log), "4");
        let _s5 = collector(&bus, Arc::clone(&log), "5");

        bus.emit(msg(Module::Kernel, Status::Error));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["1:KERNEL", "2:KERNEL", "4:KERNEL", "5:KERNEL"]
        );
    }

    #[test]
    fn test_timestamp_stamped_and_monotonic() {
        let bus = ProtocolBus::new();
        let stamps = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&stamps);
        let _s = bus.subscribe(move |m| {
            sink.lock().unwrap().push(m.timestamp.expect("stamped"));
        });

        for _ in 0..50 {
            bus.emit(msg(Module::Deploy, Status::Init));
        }

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 50);
        for pair in stamps.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_subscriber_added_during_dispatch_misses_emission() {
        let bus = ProtocolBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let late_log = Arc::clone(&log);
        let late_bus = Arc::downgrade(&bus);
        let added = Arc::new(AtomicBool::new(false));
        let added_flag = Arc::clone(&added);

        let _s1 = bus.subscribe(move |_| {
            if !added_flag.swap(true, Ordering::SeqCst) {
                let bus = late_bus.upgrade().unwrap();
                let log = Arc::clone(&late_log);
                // Leak the handle: the subscription should stay alive.
                std::mem::forget(bus.subscribe(move |m| {
                    log.lock().unwrap().push(format!("late:{}", m.status));
                }));
            }
        });

        bus.emit(msg(Module::Session, Status::Init));
        assert!(log.lock().unwrap().is_empty());

        bus.emit(msg(Module::Session, Status::Done));
        assert_eq!(*log.lock().unwrap(), vec!["late:DONE"]);
    }

    #[test]
    fn test_subscriber_removed_during_dispatch_still_receives_in_flight() {
        let bus = ProtocolBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let victim = Arc::new(StdMutex::new(None::<Subscription>));
        let victim_slot = Arc::clone(&victim);
        let _s1 = bus.subscribe(move |_| {
            if let Some(sub) = victim_slot.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        let s2 = collector(&bus, Arc::clone(&log), "victim");
        *victim.lock().unwrap() = Some(s2);

        bus.emit(msg(Module::Cleanup, Status::Done));
        // Snapshot was taken before removal: the in-flight emission lands.
        assert_eq!(*log.lock().unwrap(), vec!["victim:CLEANUP"]);

        bus.emit(msg(Module::Cleanup, Status::Done));
        // But nothing after.
        assert_eq!(*log.lock().unwrap(), vec!["victim:CLEANUP"]);
    }

    #[test]
    fn test_reentrant_emit_is_deferred_until_dispatch_completes() {
        let bus = ProtocolBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let emitter_bus = Arc::downgrade(&bus);
        let emitter_log = Arc::clone(&log);
        let _s1 = bus.subscribe(move |m| {
            emitter_log.lock().unwrap().push(format!("first:{}", m.module));
            if m.module == Module::Deploy {
                // Emitting from inside a dispatch must not deliver before
                // the remaining subscribers see the current message.
                emitter_bus
                    .upgrade()
                    .unwrap()
                    .emit(SlavkoMessage::new(Module::HealthCheck, Status::Waiting));
            }
        });
        let _s2 = collector(&bus, Arc::clone(&log), "second");

        bus.emit(msg(Module::Deploy, Status::Done));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:DEPLOY",
                "second:DEPLOY",
                "first:HEALTH_CHECK",
                "second:HEALTH_CHECK",
            ]
        );
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = ProtocolBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let s1 = collector(&bus, Arc::clone(&log), "a");
        let _s2 = collector(&bus, Arc::clone(&log), "b");

        s1.unsubscribe();
        s1.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(msg(Module::Session, Status::Done));
        assert_eq!(*log.lock().unwrap(), vec!["b:SESSION"]);
    }

    #[test]
    fn test_same_message_instance_reaches_every_subscriber() {
        let bus = ProtocolBus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            std::mem::forget(bus.subscribe(move |m| {
                seen.lock().unwrap().push(m.clone());
            }));
        }

        bus.emit(
            msg(Module::Deploy, Status::Done).with_action("REPORT"),
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[1], seen[2]);
        assert!(seen[0].timestamp.is_some());
    }
}
