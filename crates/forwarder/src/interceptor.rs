//! Output stream interception.
//!
//! [`StreamInterceptor`] mirrors every write to the wrapped writer and
//! enqueues the text into the [`MessageBuffer`]. Failures of the wrapped
//! writer are swallowed and the full input length is always reported, so a
//! producer never observes a broken stream because forwarding is active.
//!
//! [`InterceptableStream`] is the handle a host writes through. It starts
//! as a plain passthrough; [`install`](InterceptableStream::install) swaps the
//! writer into an interceptor and [`uninstall`](InterceptableStream::uninstall)
//! hands the exact original writer back. Clones share one slot, so every
//! clone observes install and uninstall.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use logtap_core::types::{LogMessage, StreamKind};

use crate::buffer::MessageBuffer;

/// Mirrors writes to `W` and captures them into a buffer.
pub struct StreamInterceptor<W: Write> {
    /// Held across mirror write and buffer push so concurrent writes never interleave.
    original: Mutex<W>,
    buffer: Arc<MessageBuffer>,
    stream: StreamKind,
}

impl<W: Write> StreamInterceptor<W> {
    pub fn new(original: W, buffer: Arc<MessageBuffer>, stream: StreamKind) -> Self {
        Self {
            original: Mutex::new(original),
            buffer,
            stream,
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Writes `text` through and captures it. Always returns `text.len()`.
    pub fn write_str(&self, text: &str) -> usize {
        self.write_bytes(text.as_bytes())
    }

    /// Byte form of [`write_str`](Self::write_str). Invalid UTF-8 is captured lossily
    /// but mirrored unmodified.
    pub fn write_bytes(&self, bytes: &[u8]) -> usize {
        let mut original = self.lock();
        let _ = original.write_all(bytes);
        let text = String::from_utf8_lossy(bytes);
        if !text.trim().is_empty() {
            self.buffer.push(LogMessage::new(self.stream, text));
        }
        bytes.len()
    }

    /// Flushes the wrapped writer, ignoring failures.
    pub fn flush(&self) {
        let _ = self.lock().flush();
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.original
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.original.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> fmt::Debug for StreamInterceptor<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamInterceptor")
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

type BoxWriter = Box<dyn Write + Send>;

enum Slot {
    Passthrough(BoxWriter),
    Intercepted(StreamInterceptor<BoxWriter>),
}

/// A clonable output handle that can be intercepted and restored.
#[derive(Clone)]
pub struct InterceptableStream {
    kind: StreamKind,
    slot: Arc<Mutex<Slot>>,
}

impl InterceptableStream {
    pub fn new(kind: StreamKind, writer: impl Write + Send + 'static) -> Self {
        Self {
            kind,
            slot: Arc::new(Mutex::new(Slot::Passthrough(Box::new(writer)))),
        }
    }

    /// Handle over the process's standard output.
    pub fn stdout() -> Self {
        Self::new(StreamKind::Stdout, io::stdout())
    }

    /// Handle over the process's standard error.
    pub fn stderr() -> Self {
        Self::new(StreamKind::Stderr, io::stderr())
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Starts capturing into `buffer`. Returns `false` if already installed.
    pub fn install(&self, buffer: Arc<MessageBuffer>) -> bool {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Intercepted(_)) {
            return false;
        }
        let Slot::Passthrough(writer) =
            std::mem::replace(&mut *slot, Slot::Passthrough(Box::new(io::sink())))
        else {
            return false;
        };
        *slot = Slot::Intercepted(StreamInterceptor::new(writer, buffer, self.kind));
        true
    }

    /// Restores the original writer. Returns `false` if not installed.
    pub fn uninstall(&self) -> bool {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Passthrough(_)) {
            return false;
        }
        let Slot::Intercepted(interceptor) =
            std::mem::replace(&mut *slot, Slot::Passthrough(Box::new(io::sink())))
        else {
            return false;
        };
        interceptor.flush();
        *slot = Slot::Passthrough(interceptor.into_inner());
        true
    }

    pub fn is_intercepted(&self) -> bool {
        matches!(*self.lock(), Slot::Intercepted(_))
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InterceptableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptableStream")
            .field("kind", &self.kind)
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}

impl Write for InterceptableStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.lock() {
            Slot::Passthrough(writer) => writer.write(buf),
            Slot::Intercepted(interceptor) => Ok(interceptor.write_bytes(buf)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.lock() {
            Slot::Passthrough(writer) => writer.flush(),
            Slot::Intercepted(interceptor) => {
                interceptor.flush();
                Ok(())
            }
        }
    }

    // One formatted write becomes one captured message.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(text) => self.write_all(text.as_bytes()),
            None => self.write_all(args.to_string().as_bytes()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fake writers for interception tests.

    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Collects everything written to it.
    #[derive(Clone, Default)]
    pub struct SharedWriter(pub Arc<Mutex<Vec<u8>>>);

    impl SharedWriter {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Fails every write and flush.
    pub struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }
}
