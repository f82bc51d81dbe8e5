//! Display refresh signal sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Invoked once with the vsync timestamp in nanoseconds.
pub type VsyncCallback = Box<dyn FnOnce(u64) + Send>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VsyncError {
    #[error("vsync source is no longer available")]
    SourceLost,
    #[error("a vsync request is already outstanding")]
    AlreadyRequested,
}

/// A source of display refresh signals.
pub trait VsyncSource: Send + Sync {
    /// Arm a one-shot callback for the next refresh.
    fn request_next_vsync(&self, callback: VsyncCallback) -> Result<(), VsyncError>;
}

/// Nanoseconds on a process-wide monotonic clock.
pub fn monotonic_now_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Wraps a [`VsyncSource`] so at most one request is outstanding at a time.
pub struct VsyncReceiver {
    source: Arc<dyn VsyncSource>,
    requested: Arc<AtomicBool>,
}

impl VsyncReceiver {
    pub fn new(source: Arc<dyn VsyncSource>) -> Self {
        Self {
            source,
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a request is armed and has not fired yet.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Arm `callback` on the source. The outstanding request is released
    /// when the callback fires and also when the source drops it unfired,
    /// so a lost source is asked again instead of being waited on forever.
    pub fn request_next_vsync(&self, callback: VsyncCallback) -> Result<(), VsyncError> {
        if self.requested.swap(true, Ordering::AcqRel) {
            return Err(VsyncError::AlreadyRequested);
        }
        let guard = RequestGuard(Arc::clone(&self.requested));
        let result = self.source.request_next_vsync(Box::new(move |timestamp| {
            drop(guard);
            callback(timestamp);
        }));
        if result.is_err() {
            self.requested.store(false, Ordering::Release);
        }
        result
    }
}

/// Clears the receiver's outstanding-request flag when dropped.
struct RequestGuard(Arc<AtomicBool>);

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct SoftwareVsyncState {
    pending: Option<VsyncCallback>,
    running: bool,
}

struct SoftwareVsyncInner {
    period_ns: u64,
    state: Mutex<SoftwareVsyncState>,
    cond: Condvar,
}

/// Vsync generator driven by a timer thread, aligned to multiples of the
/// refresh period on [`monotonic_now_ns`]. Used where no display hardware
/// provides the signal.
pub struct SoftwareVsync {
    inner: Arc<SoftwareVsyncInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SoftwareVsync {
    pub fn new(period_ns: u64) -> std::io::Result<Self> {
        let inner = Arc::new(SoftwareVsyncInner {
            period_ns: period_ns.max(1),
            state: Mutex::new(SoftwareVsyncState {
                pending: None,
                running: true,
            }),
            cond: Condvar::new(),
        });
        let thread_inner = Arc::clone(&inner);
        let thread = std::thread::Builder::new()
            .name("strata-vsync".into())
            .spawn(move || run_software_vsync(&thread_inner))?;
        Ok(Self {
            inner,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop the generator. Requests made afterwards fail with
    /// [`VsyncError::SourceLost`]; a pending callback is dropped unfired.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.running = false;
            state.pending = None;
        }
        self.inner.cond.notify_all();
        let thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                log::error!("software vsync thread panicked");
            }
        }
    }
}

impl VsyncSource for SoftwareVsync {
    fn request_next_vsync(&self, callback: VsyncCallback) -> Result<(), VsyncError> {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.running {
            return Err(VsyncError::SourceLost);
        }
        if state.pending.is_some() {
            return Err(VsyncError::AlreadyRequested);
        }
        state.pending = Some(callback);
        self.inner.cond.notify_all();
        Ok(())
    }
}

impl Drop for SoftwareVsync {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_software_vsync(inner: &SoftwareVsyncInner) {
    loop {
        let callback = {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            while state.running && state.pending.is_none() {
                state = inner.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            if !state.running {
                return;
            }
            state.pending.take()
        };
        let Some(callback) = callback else {
            continue;
        };
        let now = monotonic_now_ns();
        let next = (now / inner.period_ns + 1) * inner.period_ns;
        std::thread::sleep(Duration::from_nanos(next - now));
        if !inner.state.lock().unwrap_or_else(PoisonError::into_inner).running {
            return;
        }
        callback(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct ManualSource {
        pending: Mutex<Option<VsyncCallback>>,
    }

    impl VsyncSource for ManualSource {
        fn request_next_vsync(&self, callback: VsyncCallback) -> Result<(), VsyncError> {
            *self.pending.lock().unwrap() = Some(callback);
            Ok(())
        }
    }

    #[test]
    fn test_receiver_allows_one_outstanding_request() {
        let source = Arc::new(ManualSource {
            pending: Mutex::new(None),
        });
        let receiver = VsyncReceiver::new(source.clone());
        assert!(receiver.request_next_vsync(Box::new(|_| {})).is_ok());
        assert_eq!(
            receiver.request_next_vsync(Box::new(|_| {})),
            Err(VsyncError::AlreadyRequested)
        );

        let callback = source.pending.lock().unwrap().take().unwrap();
        callback(16);
        assert!(!receiver.is_requested());
        assert!(receiver.request_next_vsync(Box::new(|_| {})).is_ok());
    }

    #[test]
    fn test_software_vsync_fires_on_period_boundary() {
        let vsync = SoftwareVsync::new(1_000_000).unwrap();
        let (tx, rx) = mpsc::channel();
        vsync
            .request_next_vsync(Box::new(move |ts| tx.send(ts).unwrap()))
            .unwrap();
        let ts = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(ts % 1_000_000, 0);

        vsync.stop();
        assert_eq!(
            vsync.request_next_vsync(Box::new(|_| {})),
            Err(VsyncError::SourceLost)
        );
    }

    #[test]
    fn test_receiver_is_released_when_source_drops_request() {
        let vsync = Arc::new(SoftwareVsync::new(50_000_000).unwrap());
        let receiver = VsyncReceiver::new(vsync.clone());
        receiver.request_next_vsync(Box::new(|_| {})).unwrap();
        assert!(receiver.is_requested());

        vsync.stop();
        assert!(!receiver.is_requested());
        assert_eq!(
            receiver.request_next_vsync(Box::new(|_| {})),
            Err(VsyncError::SourceLost)
        );
        assert!(!receiver.is_requested());
    }
}
