//! Per-worker CPU time.
//!
//! A worker is a task, and a task can hop between runtime threads at every
//! await point, so the thread CPU clock cannot simply be sampled at the start
//! and the end. Instead [`CpuMeter::measure`] wraps the worker's future and
//! sums the thread CPU time spent inside each of its polls.
//!
//! File system work runs on the blocking pool rather than inside those polls.
//! [`CpuMeter::blocking`] and [`MeteredRead`] run it there and charge the
//! blocking thread's CPU time to the same meter.

use std::future::Future;
use std::io::{self, Read};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::task::JoinHandle;

/// CPU time consumed so far by the calling thread.
///
/// Returns zero on platforms without a per-thread CPU clock.
pub fn thread_cpu_time() -> Duration {
    #[cfg(unix)]
    {
        // SAFETY: timespec is plain old data; all-zero is a valid value, and
        // `ts` stays writable for the duration of the call.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
        if rc == 0 {
            return Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32);
        }
    }

    Duration::ZERO
}

#[derive(Debug, Default)]
struct MeterState {
    /// Nanoseconds accumulated over completed polls
    spent: AtomicU64,
    /// Thread CPU clock reading at the start of the poll in progress
    poll_started: AtomicU64,
    polling: AtomicBool,
}

/// Accumulates the CPU time of one future across all threads that poll it.
#[derive(Debug, Clone, Default)]
pub struct CpuMeter {
    state: Arc<MeterState>,
}

impl CpuMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `fut` so that every poll of it is charged to this meter.
    pub fn measure<F: Future>(&self, fut: F) -> Measured<F> {
        Measured {
            fut: Box::pin(fut),
            meter: self.clone(),
        }
    }

    /// CPU time charged so far.
    ///
    /// Called from inside the measured future, this includes the poll
    /// currently running.
    pub fn elapsed(&self) -> Duration {
        let mut nanos = self.state.spent.load(Ordering::Acquire);

        if self.state.polling.load(Ordering::Acquire) {
            let started = self.state.poll_started.load(Ordering::Acquire);
            nanos += as_nanos(thread_cpu_time()).saturating_sub(started);
        }

        Duration::from_nanos(nanos)
    }

    /// Runs `f` on the blocking pool and charges the CPU time it used.
    pub async fn blocking<F, T>(&self, f: F) -> io::Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || charged(&state, f))
            .await
            .map_err(io::Error::other)
    }

    fn enter(&self) -> u64 {
        let started = as_nanos(thread_cpu_time());
        self.state.poll_started.store(started, Ordering::Release);
        self.state.polling.store(true, Ordering::Release);
        started
    }

    fn exit(&self, started: u64) {
        let spent = as_nanos(thread_cpu_time()).saturating_sub(started);
        self.state.polling.store(false, Ordering::Release);
        self.state.spent.fetch_add(spent, Ordering::AcqRel);
    }
}

/// Future returned by [`CpuMeter::measure`].
pub struct Measured<F> {
    fut: Pin<Box<F>>,
    meter: CpuMeter,
}

impl<F: Future> Future for Measured<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let started = this.meter.enter();
        let out = this.fut.as_mut().poll(cx);
        this.meter.exit(started);
        out
    }
}

/// Async adapter over a blocking reader. Each read runs on the blocking pool
/// and its CPU time is charged to the meter.
pub struct MeteredRead<R> {
    meter: CpuMeter,
    chunk_size: usize,
    state: ReadState<R>,
}

enum ReadState<R> {
    /// `buf[pos..]` is data read but not yet handed out
    Idle { inner: R, buf: Vec<u8>, pos: usize },
    Busy(JoinHandle<(R, Vec<u8>, io::Result<usize>)>),
    /// The reader was lost with a failed blocking task
    Broken,
}

impl<R> MeteredRead<R>
where
    R: Read + Send + Unpin + 'static,
{
    pub fn new(inner: R, meter: CpuMeter, chunk_size: usize) -> Self {
        Self {
            meter,
            chunk_size: chunk_size.max(1),
            state: ReadState::Idle {
                inner,
                buf: Vec::new(),
                pos: 0,
            },
        }
    }
}

impl<R> AsyncRead for MeteredRead<R>
where
    R: Read + Send + Unpin + 'static,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, out: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if out.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            match std::mem::replace(&mut this.state, ReadState::Broken) {
                ReadState::Idle { inner, buf, pos } if pos < buf.len() => {
                    let n = out.remaining().min(buf.len() - pos);
                    out.put_slice(&buf[pos..pos + n]);
                    this.state = ReadState::Idle {
                        inner,
                        buf,
                        pos: pos + n,
                    };
                    return Poll::Ready(Ok(()));
                }
                ReadState::Idle { mut inner, mut buf, .. } => {
                    let state = Arc::clone(&this.meter.state);
                    buf.resize(this.chunk_size, 0);
                    this.state = ReadState::Busy(tokio::task::spawn_blocking(move || {
                        let res = charged(&state, || inner.read(&mut buf));
                        (inner, buf, res)
                    }));
                }
                ReadState::Busy(mut handle) => {
                    let joined = match Pin::new(&mut handle).poll(cx) {
                        Poll::Pending => {
                            this.state = ReadState::Busy(handle);
                            return Poll::Pending;
                        }
                        Poll::Ready(joined) => joined,
                    };
                    let (inner, mut buf, res) = joined.map_err(io::Error::other)?;

                    let n = match res {
                        Ok(n) => n,
                        Err(e) => {
                            buf.clear();
                            this.state = ReadState::Idle { inner, buf, pos: 0 };
                            return Poll::Ready(Err(e));
                        }
                    };
                    buf.truncate(n);
                    this.state = ReadState::Idle { inner, buf, pos: 0 };

                    // Zero bytes read is end of file.
                    if n == 0 {
                        return Poll::Ready(Ok(()));
                    }
                }
                ReadState::Broken => {
                    return Poll::Ready(Err(io::Error::other("blocking read task failed")));
                }
            }
        }
    }
}

/// Runs `f` on the current thread and adds the thread CPU time it used.
fn charged<T>(state: &MeterState, f: impl FnOnce() -> T) -> T {
    let started = as_nanos(thread_cpu_time());
    let out = f();
    let spent = as_nanos(thread_cpu_time()).saturating_sub(started);
    state.spent.fetch_add(spent, Ordering::AcqRel);
    out
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
