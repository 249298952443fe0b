use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::domain::NoticeNumber;

/// Per-notice mutual exclusion so concurrent batches never interleave on one notice.
#[derive(Default)]
pub struct NoticeLocks {
    slots: Mutex<HashMap<NoticeNumber, Arc<Mutex<()>>>>,
}

/// Held for the duration of one notice's check/mutate/audit sequence.
pub struct NoticeLock {
    slot: Arc<Mutex<()>>,
}

impl NoticeLock {
    pub fn hold(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NoticeLocks {
    pub fn for_notice(&self, notice_no: &NoticeNumber) -> NoticeLock {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop slots nobody else is holding so the map does not grow without bound.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        let slot = slots
            .entry(notice_no.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        NoticeLock { slot }
    }

    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_notice_is_serialized() {
        let locks = Arc::new(NoticeLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let overlaps = overlaps.clone();
                thread::spawn(move || {
                    let lock = locks.for_notice(&NoticeNumber::new("N-1"));
                    let _guard = lock.hold();
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(std::time::Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread");
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn released_slots_are_pruned() {
        let locks = NoticeLocks::default();
        {
            let lock = locks.for_notice(&NoticeNumber::new("N-1"));
            let _guard = lock.hold();
        }
        let _other = locks.for_notice(&NoticeNumber::new("N-2"));
        assert_eq!(locks.tracked(), 1);
    }
}
