//! `sink_to_file`: scoped acquisition of a file handle that writes
//! `str(x) + "\n"` per element, in emission order, guaranteed to release on
//! every exit path (§4.F, §6).
//!
//! The Rust rendering of "guaranteed release on all exit paths" is a `Drop`
//! guard rather than a context-manager block.

use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use flowline_core::{NodeHandle, Sink, StreamError};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{Result, SourceError};

struct WriteLineOp<T> {
    file: Mutex<File>,
    _marker: std::marker::PhantomData<fn(T)>,
}

#[async_trait]
impl<T: Display + Send + Sync + 'static> Sink<T> for WriteLineOp<T> {
    async fn push(&self, x: T) -> flowline_core::Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{x}").map_err(StreamError::Io)?;
        file.flush().map_err(StreamError::Io)?;
        Ok(())
    }
}

/// RAII guard returned by `sink_to_file`: on drop, unsubscribes the sink and
/// flushes/closes the underlying file.
pub struct FileSinkGuard<T> {
    handle: NodeHandle<T>,
    sink: Arc<dyn Sink<T>>,
}

impl<T: Clone + Display + Send + Sync + 'static> FileSinkGuard<T> {
    pub fn new(path: impl AsRef<Path>, source: &NodeHandle<T>) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(|e| {
            warn!(path = %path.as_ref().display(), error = %e, "sink_to_file: failed to open file");
            SourceError::Io(e)
        })?;
        info!(path = %path.as_ref().display(), "sink_to_file: opened");

        let sink: Arc<dyn Sink<T>> = Arc::new(WriteLineOp {
            file: Mutex::new(file),
            _marker: std::marker::PhantomData,
        });
        source.subscribe(sink.clone());

        Ok(Self {
            handle: source.clone(),
            sink,
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for FileSinkGuard<T> {
    fn drop(&mut self) {
        self.handle.unsubscribe(&self.sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::NodeHandle;

    #[tokio::test]
    async fn sink_to_file_writes_one_line_per_element_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let source = NodeHandle::<i32>::new();
        {
            let _guard = FileSinkGuard::new(&path, &source).unwrap();
            source.emit(1).await.unwrap();
            source.emit(2).await.unwrap();
            source.emit(3).await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1\n2\n3\n");
    }

    #[tokio::test]
    async fn dropping_the_guard_unsubscribes_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let source = NodeHandle::<i32>::new();
        let guard = FileSinkGuard::new(&path, &source).unwrap();
        assert_eq!(source.child_count(), 1);
        drop(guard);
        assert_eq!(source.child_count(), 0);
    }
}
