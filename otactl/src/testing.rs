//! Scripted in-memory transport for exercising the protocol layer in tests.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// Serialize tests that depend on the global interrupt checker.
///
/// Clears the flag on acquisition; tests that set it are responsible for
/// clearing it again before releasing the guard.
pub(crate) fn interrupt_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    let guard = LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    crate::test_set_interrupted(false);
    guard
}

/// A scripted serial port.
///
/// Input is modelled as an ordered queue of chunks. `bytes_to_read` exposes
/// the front chunk's length; an explicitly scripted empty chunk is consumed
/// by `bytes_to_read` and reported as one observation of silence. Once the
/// queue is exhausted, silence is reported forever.
///
/// Note that the drain loop in `send_command` terminates on a zero
/// `bytes_to_read`, so a script must place one silence after each response
/// that is followed by more data, or the next response gets drained early.
pub(crate) struct ScriptedPort {
    name: String,
    chunks: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    /// Everything written to the port, one entry per `write` call.
    pub writes: Vec<Vec<u8>>,
    /// Number of `read` calls that returned data.
    pub reads: usize,
    /// Number of `bytes_to_read` calls.
    pub btr_calls: usize,
    /// Fail every write with `BrokenPipe`.
    pub fail_writes: bool,
    /// Fail every read with `BrokenPipe`.
    pub fail_reads: bool,
}

impl ScriptedPort {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            chunks: VecDeque::new(),
            current: Vec::new(),
            writes: Vec::new(),
            reads: 0,
            btr_calls: 0,
            fail_writes: false,
            fail_reads: false,
        }
    }

    /// Queue a chunk of raw response bytes.
    pub fn push_chunk(mut self, bytes: &[u8]) -> Self {
        self.chunks.push_back(bytes.to_vec());
        self
    }

    /// Queue a text response chunk.
    pub fn push_text(self, text: &str) -> Self {
        self.push_chunk(text.as_bytes())
    }

    /// Queue one observation of silence.
    pub fn push_silence(self) -> Self {
        self.push_chunk(&[])
    }

    /// Queue `n` observations of silence.
    pub fn push_silences(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.chunks.push_back(Vec::new());
        }
        self
    }

    /// Concatenated text of everything written so far.
    pub fn written_text(&self) -> String {
        let joined: Vec<u8> = self.writes.iter().flatten().copied().collect();
        String::from_utf8_lossy(&joined).into_owned()
    }
}

impl Port for ScriptedPort {
    fn set_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    fn baud_rate(&self) -> u32 {
        115200
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        self.btr_calls += 1;
        if self.current.is_empty() {
            match self.chunks.pop_front() {
                Some(chunk) => self.current = chunk,
                None => return Ok(0),
            }
        }
        Ok(self.current.len())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.current.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.fail_reads {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted read failure",
            ));
        }
        if self.current.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.drain(..n);
        self.reads += 1;
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.fail_writes {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            ));
        }
        self.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
