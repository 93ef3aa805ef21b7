//
//  guard.rs
//  Component Graphs
//
//  Created by hak (tharun)
//

use std::time::Duration;

use tracing::debug;

use crate::error::StoreError;
use crate::graph::ComponentId;

use super::file::FileLock;
use super::manager::LockManager;
use super::types::LockResult;

/// RAII guard that releases the component lock when dropped.
///
/// Stores shared between processes also attach a [`FileLock`]; it is
/// released before the in-process lock.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    component: ComponentId,
    operation_id: u64,
    file: Option<FileLock>,
}

impl<'a> LockGuard<'a> {
    /// Lock a component, waiting up to `timeout`.
    pub fn acquire(
        manager: &'a LockManager,
        component: &ComponentId,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        match manager.acquire_with_wait(component, timeout) {
            LockResult::Acquired {
                component,
                operation_id,
            } => Ok(Self {
                manager,
                component,
                operation_id,
                file: None,
            }),
            LockResult::AcquiredAfterWait {
                component,
                operation_id,
                wait_time_ms,
            } => {
                debug!(component = %component, wait_time_ms, "component lock acquired after wait");
                Ok(Self {
                    manager,
                    component,
                    operation_id,
                    file: None,
                })
            }
            LockResult::Blocked { component, held_by } => {
                debug!(component = %component, held_by, "component lock wait timed out");
                Err(StoreError::LockTimeout {
                    component_id: component,
                    waited: timeout,
                })
            }
        }
    }

    /// Hold `file` for as long as this guard lives.
    pub fn with_file(mut self, file: FileLock) -> Self {
        self.file = Some(file);
        self
    }

    pub fn component(&self) -> &ComponentId {
        &self.component
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        drop(self.file.take());
        self.manager.release(&self.component, self.operation_id);
    }
}
