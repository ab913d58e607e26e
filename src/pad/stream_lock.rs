//! Reentrant stream lock.
//!
//! A monitor that records which thread owns it and how many times that
//! thread has entered. The owning thread may lock again without blocking,
//! which lets a task body pause its own task or a chain function push
//! into the same pad's list path.

use parking_lot::{Condvar, Mutex};
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// Reentrant lock serializing streaming on one pad.
#[derive(Debug, Default)]
pub struct StreamLock {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl StreamLock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, blocking while another thread holds it.
    pub fn lock(&self) -> StreamLockGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        loop {
            match owner.thread {
                None => {
                    owner.thread = Some(me);
                    owner.depth = 1;
                    break;
                }
                Some(t) if t == me => {
                    owner.depth += 1;
                    break;
                }
                Some(_) => self.released.wait(&mut owner),
            }
        }
        StreamLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire the lock only if it is free or already held by this thread.
    pub fn try_lock(&self) -> Option<StreamLockGuard<'_>> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        match owner.thread {
            None => {
                owner.thread = Some(me);
                owner.depth = 1;
            }
            Some(t) if t == me => owner.depth += 1,
            Some(_) => return None,
        }
        Some(StreamLockGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Whether the calling thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.lock().thread == Some(thread::current().id())
    }

    /// Nesting depth of the current owner, 0 when free.
    pub fn depth(&self) -> usize {
        self.owner.lock().depth
    }

    fn release(&self) {
        let mut owner = self.owner.lock();
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            self.released.notify_one();
        }
    }
}

/// Held stream lock. Released on drop, on the thread that acquired it.
#[must_use = "the stream lock is released when the guard is dropped"]
pub struct StreamLockGuard<'a> {
    lock: &'a StreamLock,
    // Ownership is per thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for StreamLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_reentrant_on_same_thread() {
        let lock = StreamLock::new();
        let a = lock.lock();
        let b = lock.lock();
        assert_eq!(lock.depth(), 2);
        assert!(lock.is_held_by_current_thread());
        drop(b);
        assert_eq!(lock.depth(), 1);
        drop(a);
        assert_eq!(lock.depth(), 0);
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn test_excludes_other_threads() {
        let lock = Arc::new(StreamLock::new());
        let guard = lock.lock();

        let entered = Arc::new(AtomicBool::new(false));
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = {
            let lock = lock.clone();
            let entered = entered.clone();
            std::thread::spawn(move || {
                tx.send(lock.try_lock().is_none()).unwrap();
                let _g = lock.lock();
                entered.store(true, Ordering::SeqCst);
            })
        };

        assert!(rx.recv().unwrap());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }
}
