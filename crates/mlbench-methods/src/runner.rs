//! Bounded benchmark execution.
//!
//! A benchmark function never returns its result. It is handed a single-use
//! [`ResultSender`] and reports through it, while the caller waits on the
//! receiving end for at most the configured timeout. Anything that goes wrong
//! on the benchmark side (an error, a panic, a timeout, a sender dropped
//! without a send) reaches the caller as the negative sentinel.
//!
//! Two execution contexts are available:
//!
//! * [`run_bounded`] / [`run_timed`] run the function on a worker thread. A
//!   worker that misses the deadline is detached, not killed: the native
//!   computation inside it keeps running until it finishes on its own, and
//!   whatever it sends afterwards is dropped.
//! * [`run_isolated`] runs a child process and kills it when the deadline
//!   passes, which guarantees the work stops.
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::{Command, Stdio};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How often [`run_isolated`] checks on the child process.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Elapsed seconds of one benchmark run, or the failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timing(f64);

impl Timing {
    /// Out-of-band value for every failure mode. Valid timings are never negative.
    pub const FAILED: Timing = Timing(-1.0);

    /// Wrap a duration in seconds. Negative or non-finite input maps to the sentinel.
    pub fn from_secs(secs: f64) -> Self {
        if secs.is_finite() && secs >= 0.0 {
            Timing(secs)
        } else {
            Timing::FAILED
        }
    }

    pub fn secs(self) -> f64 {
        self.0
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0.0
    }
}

impl From<Duration> for Timing {
    fn from(duration: Duration) -> Self {
        Timing(duration.as_secs_f64())
    }
}

/// What a benchmark function reports: its timing and, when it got that far,
/// the model it fitted.
#[derive(Debug)]
pub struct Measurement<M> {
    pub timing: Timing,
    pub model: Option<M>,
}

impl<M> Measurement<M> {
    pub fn completed(timing: Timing, model: M) -> Self {
        Self {
            timing,
            model: Some(model),
        }
    }

    pub fn failed() -> Self {
        Self {
            timing: Timing::FAILED,
            model: None,
        }
    }
}

/// Sending half of the one-slot result channel. `send` consumes the sender,
/// so a benchmark function can report at most once and the channel closes
/// right after.
pub struct ResultSender<T> {
    inner: SyncSender<T>,
}

impl<T> ResultSender<T> {
    pub fn send(self, value: T) {
        // The receiver is gone once the caller gave up on a timed-out run.
        if self.inner.send(value).is_err() {
            log::trace!("Result arrived after the runner stopped waiting; dropping it");
        }
    }
}

fn result_channel<T>() -> (ResultSender<T>, Receiver<T>) {
    let (tx, rx) = sync_channel(1);
    (ResultSender { inner: tx }, rx)
}

fn effective_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|limit| !limit.is_zero())
}

/// Run `bench` and return what it reported, or `None` if it timed out or
/// finished without reporting.
///
/// A `timeout` of `None` or zero runs `bench` on the calling thread until it
/// completes. Otherwise `bench` runs on a fresh thread and the caller waits
/// at most `timeout` for its report.
pub fn run_bounded<T, F>(timeout: Option<Duration>, bench: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(ResultSender<T>) + Send + 'static,
{
    let (sender, receiver) = result_channel();

    let Some(limit) = effective_timeout(timeout) else {
        if catch_unwind(AssertUnwindSafe(move || bench(sender))).is_err() {
            log::debug!("Benchmark function panicked");
        }
        return receiver.try_recv().ok();
    };

    let spawned = thread::Builder::new()
        .name("mlbench-worker".to_string())
        .spawn(move || bench(sender));
    if let Err(e) = spawned {
        log::error!("Failed to start benchmark worker thread: {}", e);
        return None;
    }

    match receiver.recv_timeout(limit) {
        Ok(value) => Some(value),
        Err(RecvTimeoutError::Timeout) => {
            log::info!(
                "Benchmark exceeded the timeout of {:.3}s; abandoning the worker thread",
                limit.as_secs_f64()
            );
            None
        }
        Err(RecvTimeoutError::Disconnected) => {
            log::debug!("Benchmark function exited without reporting a result");
            None
        }
    }
}

/// [`run_bounded`] specialised to measurements, with every failure mode
/// collapsed into [`Measurement::failed`].
pub fn run_timed<M, F>(timeout: Option<Duration>, bench: F) -> Measurement<M>
where
    M: Send + 'static,
    F: FnOnce(ResultSender<Measurement<M>>) + Send + 'static,
{
    run_bounded(timeout, bench).unwrap_or_else(Measurement::failed)
}

/// Run `command` as a child process and read its timing from the last
/// non-empty line of its standard output.
///
/// The child is killed once `timeout` elapses. A non-zero exit status, output
/// that does not parse as seconds, or a timeout all give [`Timing::FAILED`].
pub fn run_isolated(mut command: Command, timeout: Option<Duration>) -> Timing {
    command.stdin(Stdio::null()).stdout(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::error!("Failed to start benchmark process {:?}: {}", command, e);
            return Timing::FAILED;
        }
    };

    // Drain stdout on the side so a chatty child cannot block on a full pipe.
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut output = String::new();
            let _ = stdout.read_to_string(&mut output);
            output
        })
    });

    let deadline = effective_timeout(timeout).map(|limit| Instant::now() + limit);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    log::info!("Benchmark process exceeded the timeout; killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Timing::FAILED;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("Failed to poll benchmark process: {}", e);
                let _ = child.kill();
                let _ = child.wait();
                return Timing::FAILED;
            }
        }
    };

    let output = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        log::debug!("Benchmark process exited with {}", status);
        return Timing::FAILED;
    }

    match output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().parse::<f64>())
    {
        Some(Ok(secs)) => Timing::from_secs(secs),
        Some(Err(e)) => {
            log::debug!("Benchmark process printed an unreadable timing: {}", e);
            Timing::FAILED
        }
        None => {
            log::debug!("Benchmark process printed no timing");
            Timing::FAILED
        }
    }
}
