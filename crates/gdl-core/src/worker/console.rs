//! Shared line-oriented output for worker tasks.
//!
//! Episode tasks run on parallel threads and their lines must not shear
//! mid-line; every write takes the lock for exactly one full line. Tests
//! swap the sink for a buffer and assert on the emitted protocol.

use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
        }
    }

    /// Buffer-backed console for tests; read the buffer back via the handle.
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer = SharedBuf(Arc::clone(&buf));
        (
            Self {
                sink: Arc::new(Mutex::new(Box::new(writer))),
            },
            buf,
        )
    }

    /// Emit one line, flushed immediately (the supervisor reads live).
    pub fn line(&self, msg: impl AsRef<str>) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}", msg.as_ref());
            let _ = sink.flush();
        }
    }
}

struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
