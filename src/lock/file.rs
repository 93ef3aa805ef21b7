//
//  file.rs
//  Component Graphs
//
//  Created by hak (tharun)
//

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// OS-level exclusive lock on a lock file, shared by every process and every
/// store handle on the same root. Released on drop.
///
/// Each acquisition opens its own file handle, so two handles in one process
/// exclude each other just like two processes do.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Lock `path`, polling until `timeout`. `Ok(None)` means someone else
    /// still holds it.
    pub fn acquire(path: &Path, timeout: Duration) -> io::Result<Option<Self>> {
        let file = open(path)?;
        let start = Instant::now();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Some(Self { file })),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    /// Lock `path`, blocking until it is free.
    pub fn acquire_blocking(path: &Path) -> io::Result<Self> {
        let file = open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}
