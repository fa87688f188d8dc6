//! Bounded single-owner/multi-thief work-stealing deque (Chase–Lev).
//!
//! Only the owner thread may [`WorkStealDeque::push`]/[`WorkStealDeque::pop`];
//! any thread may [`WorkStealDeque::take`] (steal). At most one thread ever
//! claims a given pushed element.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

/// A bounded Chase–Lev deque of capacity `S`, which must be a power of two.
pub struct WorkStealDeque<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    // `bot`: owner-only push/pop end. `top`: shared steal end. Both are
    // monotonically increasing and wrap via the mask on slot access.
    bot: AtomicUsize,
    top: AtomicUsize,
}

unsafe impl<T: Send> Send for WorkStealDeque<T> {}
unsafe impl<T: Send> Sync for WorkStealDeque<T> {}

impl<T> WorkStealDeque<T> {
    /// Create a deque of the given capacity. Panics if `capacity` is not a
    /// power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "WorkStealDeque::new: capacity must be a nonzero power of two"
        );
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            bot: AtomicUsize::new(0),
            top: AtomicUsize::new(0),
        }
    }

    fn slot(&self, index: usize) -> *mut MaybeUninit<T> {
        self.slots[index & self.mask].get()
    }

    /// Owner-only. Push `item` at the bottom of the deque. Returns
    /// `Err(item)` if the deque is full.
    pub fn push(&self, item: T) -> Result<(), T> {
        let bot = self.bot.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Acquire);
        if bot.wrapping_sub(top) >= self.slots.len() {
            return Err(item);
        }
        unsafe {
            (*self.slot(bot)).write(item);
        }
        // The slot store must be visible before `bot` is published, so a
        // thief that observes the new `bot` also observes the slot.
        fence(Ordering::Release);
        self.bot.store(bot.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Owner-only. Pop the most recently pushed element (LIFO from the
    /// owner's side). Returns `None` if empty.
    pub fn pop(&self) -> Option<T> {
        let bot = self.bot.load(Ordering::Relaxed);
        let new_bot = bot.wrapping_sub(1);
        self.bot.store(new_bot, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let top = self.top.load(Ordering::Relaxed);

        if top.wrapping_sub(new_bot).wrapping_sub(1) < isize::MAX as usize
            && (top as isize).wrapping_sub(new_bot as isize) > 0
        {
            // top > new_bot: deque was already empty before this pop.
            self.bot.store(bot, Ordering::Relaxed);
            return None;
        }

        let item = unsafe { (*self.slot(new_bot)).assume_init_read() };

        if top == new_bot {
            // Last element: contested with concurrent thieves.
            let won = self
                .top
                .compare_exchange(top, top.wrapping_add(1), Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();
            self.bot.store(bot, Ordering::Relaxed);
            if !won {
                // A thief won the race; we must not also return it.
                std::mem::forget(item);
                return None;
            }
            return Some(item);
        }

        // top < new_bot: uncontested claim.
        Some(item)
    }

    /// Any thread. Steal the oldest element from the top of the deque.
    /// Returns `None` if empty or if a concurrent claim won the race.
    pub fn take(&self) -> Option<T> {
        let top = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bot = self.bot.load(Ordering::Acquire);

        if (top as isize).wrapping_sub(bot as isize) >= 0 {
            return None;
        }

        let item = unsafe { (*self.slot(top)).assume_init_read() };
        match self.top.compare_exchange(
            top,
            top.wrapping_add(1),
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => Some(item),
            Err(_) => {
                std::mem::forget(item);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        let bot = self.bot.load(Ordering::Acquire);
        let top = self.top.load(Ordering::Acquire);
        bot.wrapping_sub(top).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for WorkStealDeque<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::sync::Arc;
    use std::thread;

    #[test]
    #[should_panic]
    fn non_power_of_two_panics() {
        WorkStealDeque::<i32>::new(3);
    }

    #[test]
    fn owner_pops_lifo() {
        let deque = WorkStealDeque::new(8);
        deque.push(1).unwrap();
        deque.push(2).unwrap();
        deque.push(3).unwrap();
        assert_eq!(deque.pop(), Some(3));
        assert_eq!(deque.pop(), Some(2));
        assert_eq!(deque.pop(), Some(1));
        assert_eq!(deque.pop(), None);
    }

    #[test]
    fn thief_steals_from_opposite_end() {
        let deque = WorkStealDeque::new(8);
        deque.push(1).unwrap();
        deque.push(2).unwrap();
        deque.push(3).unwrap();
        assert_eq!(deque.take(), Some(1));
        assert_eq!(deque.pop(), Some(3));
        assert_eq!(deque.take(), Some(2));
        assert_eq!(deque.take(), None);
    }

    #[test]
    fn concurrent_steal_claims_each_item_once() {
        let deque = Arc::new(WorkStealDeque::new(128));
        let total = 100usize;
        for i in 0..total {
            deque.push(i).unwrap();
        }

        let claimed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for _ in 0..7 {
            let d = Arc::clone(&deque);
            let c = Arc::clone(&claimed);
            handles.push(thread::spawn(move || {
                let mut local = Vec::new();
                while let Some(v) = d.take() {
                    local.push(v);
                }
                c.lock().unwrap().extend(local);
            }));
        }
        // Owner also drains concurrently.
        let mut owner_claimed = Vec::new();
        while let Some(v) = deque.pop() {
            owner_claimed.push(v);
        }
        for h in handles {
            h.join().unwrap();
        }

        let mut all: Vec<usize> = claimed.lock().unwrap().clone();
        all.extend(owner_claimed);
        assert_eq!(all.len(), total);
        let set: HashSet<_> = all.iter().copied().collect();
        assert_eq!(set.len(), total);
        assert_eq!(set, (0..total).collect::<HashSet<_>>());
    }

    #[test]
    fn two_thieves_race_last_element_exactly_one_wins() {
        for _ in 0..200 {
            let deque = Arc::new(WorkStealDeque::new(2));
            deque.push(42).unwrap();
            let wins = Arc::new(Counter::new(0));
            let mut handles = Vec::new();
            for _ in 0..2 {
                let d = Arc::clone(&deque);
                let w = Arc::clone(&wins);
                handles.push(thread::spawn(move || {
                    if d.take().is_some() {
                        w.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(wins.load(Ordering::SeqCst), 1);
        }
    }
}
