//! Component locking for serializing catalog mutations.
//!
//! Every mutation of a component's graphs runs while holding that
//! component's lock, so sequence reads and the shifts computed from them
//! never race with another writer. Locks on different components are
//! independent.
//!
//! [`LockManager`] serializes threads of one process. Stores whose data is
//! shared between processes add a [`FileLock`] on a per-component lock file.
//!
//! # Example
//! ```ignore
//! let manager = LockManager::new();
//!
//! let guard = LockGuard::acquire(&manager, &component, Duration::from_secs(30))?
//!     .with_file(FileLock::acquire(&lock_path, remaining)?.ok_or(timeout)?);
//! // ... read sequences, shift, write ...
//! drop(guard);
//! ```

pub mod file;
pub mod guard;
pub mod manager;
pub mod types;

pub use file::FileLock;
pub use guard::LockGuard;
pub use manager::LockManager;
pub use types::LockResult;
