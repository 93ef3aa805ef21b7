//! Lock manager: one exclusive lock per component.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::graph::ComponentId;

use super::types::LockResult;

/// Serializes mutations per component within one process. Different
/// components never contend.
pub struct LockManager {
    /// Component -> operation id of the current holder.
    locks: Mutex<HashMap<ComponentId, u64>>,
    lock_released: Condvar,
    next_operation: AtomicU64,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            lock_released: Condvar::new(),
            next_operation: AtomicU64::new(1),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ComponentId, u64>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the component lock, waiting up to `timeout` if blocked.
    pub fn acquire_with_wait(&self, component: &ComponentId, timeout: Duration) -> LockResult {
        let start = Instant::now();
        let mut locks = self.table();

        loop {
            let held_by = match locks.get(component) {
                None => {
                    let operation_id = self.next_operation.fetch_add(1, Ordering::Relaxed);
                    locks.insert(component.clone(), operation_id);

                    let wait_time = start.elapsed();
                    if wait_time.as_millis() > 0 {
                        return LockResult::AcquiredAfterWait {
                            component: component.clone(),
                            operation_id,
                            wait_time_ms: wait_time.as_millis() as u64,
                        };
                    }
                    return LockResult::Acquired {
                        component: component.clone(),
                        operation_id,
                    };
                }
                Some(operation_id) => *operation_id,
            };

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return LockResult::Blocked {
                    component: component.clone(),
                    held_by,
                };
            }

            let remaining = timeout - elapsed;
            let (new_locks, _) = self
                .lock_released
                .wait_timeout(locks, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            locks = new_locks;
        }
    }

    /// Release a component lock, if `operation_id` still holds it.
    pub fn release(&self, component: &ComponentId, operation_id: u64) {
        let mut locks = self.table();
        if locks.get(component) == Some(&operation_id) {
            locks.remove(component);
        }
        drop(locks);
        self.lock_released.notify_all();
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    const NO_WAIT: Duration = Duration::ZERO;

    fn cid(id: &str) -> ComponentId {
        ComponentId::new(id).unwrap()
    }

    fn operation(result: &LockResult) -> u64 {
        match result {
            LockResult::Acquired { operation_id, .. }
            | LockResult::AcquiredAfterWait { operation_id, .. } => *operation_id,
            LockResult::Blocked { .. } => panic!("expected lock to be acquired"),
        }
    }

    #[test]
    fn test_basic_lock_unlock() {
        let manager = LockManager::new();
        let result = manager.acquire_with_wait(&cid("a"), NO_WAIT);
        assert!(matches!(result, LockResult::Acquired { .. }));

        manager.release(&cid("a"), operation(&result));
        assert!(matches!(
            manager.acquire_with_wait(&cid("a"), NO_WAIT),
            LockResult::Acquired { .. }
        ));
    }

    #[test]
    fn test_second_acquire_is_blocked() {
        let manager = LockManager::new();
        let first = manager.acquire_with_wait(&cid("a"), NO_WAIT);
        let second = manager.acquire_with_wait(&cid("a"), NO_WAIT);
        assert!(matches!(second, LockResult::Blocked { held_by, .. } if held_by == operation(&first)));
    }

    #[test]
    fn test_different_components_ok() {
        let manager = LockManager::new();
        let a = manager.acquire_with_wait(&cid("a"), NO_WAIT);
        let b = manager.acquire_with_wait(&cid("b"), NO_WAIT);
        assert!(matches!(a, LockResult::Acquired { .. }));
        assert!(matches!(b, LockResult::Acquired { .. }));
    }

    #[test]
    fn test_stale_release_is_ignored() {
        let manager = LockManager::new();
        let first = manager.acquire_with_wait(&cid("a"), NO_WAIT);
        manager.release(&cid("a"), operation(&first));
        let second = manager.acquire_with_wait(&cid("a"), NO_WAIT);

        manager.release(&cid("a"), operation(&first));
        assert!(matches!(
            manager.acquire_with_wait(&cid("a"), NO_WAIT),
            LockResult::Blocked { .. }
        ));
        manager.release(&cid("a"), operation(&second));
        assert!(matches!(
            manager.acquire_with_wait(&cid("a"), NO_WAIT),
            LockResult::Acquired { .. }
        ));
    }

    #[test]
    fn test_wait_times_out() {
        let manager = LockManager::new();
        let _held = manager.acquire_with_wait(&cid("a"), NO_WAIT);
        let result = manager.acquire_with_wait(&cid("a"), Duration::from_millis(30));
        assert!(matches!(result, LockResult::Blocked { .. }));
    }

    #[test]
    fn test_wait_for_lock() {
        let manager = Arc::new(LockManager::new());
        let lock_acquired = Arc::new(AtomicBool::new(false));

        // Thread 1: acquire lock, signal, hold for 100ms, release
        let m1 = manager.clone();
        let acquired1 = lock_acquired.clone();
        let t1 = thread::spawn(move || {
            let result = m1.acquire_with_wait(&cid("waited"), NO_WAIT);
            acquired1.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            m1.release(&cid("waited"), operation(&result));
        });

        while !lock_acquired.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }

        let result = manager.acquire_with_wait(&cid("waited"), Duration::from_millis(2000));
        t1.join().unwrap();

        assert!(
            matches!(result, LockResult::AcquiredAfterWait { .. }),
            "Should have acquired lock after waiting"
        );
    }
}
