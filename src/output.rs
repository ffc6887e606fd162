//! Captured output of a job.
//!
//! [`OutputBuffer`] is an append-only byte sink shared between the capture
//! tasks that feed it and any number of readers taking snapshots. Once sealed
//! it never changes again.

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Inner {
    bytes: Vec<u8>,
    sealed: bool,
}

/// Thread-safe, append-only, sealable byte buffer.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    inner: Mutex<Inner>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Returns `false` (and drops the chunk) once sealed.
    pub fn append(&self, chunk: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return false;
        }
        inner.bytes.extend_from_slice(chunk);
        true
    }

    /// Freeze the buffer. Idempotent.
    pub fn seal(&self) {
        self.inner.lock().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Copy of everything appended so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn appends_accumulate_in_order() {
        let buf = OutputBuffer::new();
        assert!(buf.is_empty());
        assert!(buf.append(b"hel"));
        assert!(buf.append(b"lo\n"));
        assert_eq!(buf.snapshot(), b"hello\n");
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn sealed_buffer_rejects_writes() {
        let buf = OutputBuffer::new();
        buf.append(b"kept");
        buf.seal();
        buf.seal();

        assert!(buf.is_sealed());
        assert!(!buf.append(b" dropped"));
        assert_eq!(buf.snapshot(), b"kept");
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let buf = OutputBuffer::new();
        buf.append(b"a");
        let snap = buf.snapshot();
        buf.append(b"b");
        assert_eq!(snap, b"a");
        assert_eq!(buf.snapshot(), b"ab");
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let buf = Arc::new(OutputBuffer::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buf = Arc::clone(&buf);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        buf.append(b"x");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(buf.len(), 1000);
    }
}
