//
//  types.rs
//  Component Graphs
//
//  Created by hak (tharun)
//

use crate::graph::ComponentId;

/// Lock acquisition result.
#[derive(Debug)]
pub enum LockResult {
    /// Lock acquired immediately.
    Acquired { component: ComponentId, operation_id: u64 },
    /// Lock is still held by another operation after the wait.
    Blocked { component: ComponentId, held_by: u64 },
    /// Lock acquired after waiting.
    AcquiredAfterWait {
        component: ComponentId,
        operation_id: u64,
        wait_time_ms: u64,
    },
}
