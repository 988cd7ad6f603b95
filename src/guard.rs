use std::{
    fmt::Debug,
    ops::Deref,
    sync::{Mutex, MutexGuard, PoisonError, TryLockError},
};

// -------------------------------------------------------------------------------------------------

/// Mutual exclusion wrapper for state which is shared between the audio and a control thread.
///
/// The audio thread locks the guarded value for short, bounded sections only. Control threads
/// get scoped, read-only access via [`ConcurrencyGuard::read`]. A poisoned lock is recovered,
/// as the guarded state is always left in a consistent state between operations.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard<T> {
    inner: Mutex<T>,
}

impl<T> ConcurrencyGuard<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Scoped, read-only access to the guarded value. Blocks until the lock is available.
    /// Hold the returned guard as briefly as possible: the audio thread waits for it to be
    /// released before it can process the next block.
    pub fn read(&self) -> ReadGuard<'_, T> {
        ReadGuard {
            guard: self.lock(),
        }
    }

    /// Exclusive access, blocking until the lock is available.
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access without blocking. Returns `None` when the lock currently is held
    /// by some other thread.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Read only, scoped view of a [`ConcurrencyGuard`]'s value. Releases the lock when dropped.
pub struct ReadGuard<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T: Debug> Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadGuard").field(&*self.guard).finish()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn scoped_reads() {
        let guard = ConcurrencyGuard::new(vec![1, 2, 3]);
        {
            let values = guard.read();
            assert_eq!(values.len(), 3);
            // locked while reading
            assert!(guard.try_lock().is_none());
        }
        guard.lock().push(4);
        assert_eq!(*guard.read(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn readers_hold_off_exclusive_access() {
        let guard = Arc::new(ConcurrencyGuard::new(0));
        let values = guard.read();
        let writer = thread::spawn({
            let guard = Arc::clone(&guard);
            move || *guard.lock() += 1
        });
        thread::sleep(std::time::Duration::from_millis(50));
        // the writer waits for the reader
        assert!(!writer.is_finished());
        assert_eq!(*values, 0);
        drop(values);
        writer.join().unwrap();
        assert_eq!(*guard.read(), 1);
    }

    #[test]
    fn poisoned_locks_recover() {
        let guard = Arc::new(ConcurrencyGuard::new(1));
        let result = thread::spawn({
            let guard = Arc::clone(&guard);
            move || {
                let _lock = guard.lock();
                panic!("poison the lock");
            }
        })
        .join();
        assert!(result.is_err());
        assert_eq!(*guard.read(), 1);
        assert!(guard.try_lock().is_some());
    }
}
