use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

// Cross-platform signal handling
#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Signal number that cancelled the run (0 if none)
static CANCELLED_BY_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Shared, cooperative cancellation flag
///
/// Clones observe the same state. Besides polling `is_cancelled()`, threads
/// blocked in `select!` can wait on `watch()`: the receiver disconnects (and
/// so becomes ready for every clone at once) when the signal fires.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    watch: Receiver<()>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (trigger, watch) = bounded(0);
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                watch,
            }),
        }
    }

    /// Request cancellation; calling it again is a no-op
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let mut trigger = match self.inner.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that never yields a message and disconnects on cancellation
    pub fn watch(&self) -> &Receiver<()> {
        &self.inner.watch
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Signal handler that turns SIGINT/SIGTERM into cancellation
///
/// The first signal cancels the merge so it can stop cleanly; a second one
/// exits immediately.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    /// Initialize signal handling - cross-platform
    pub fn new(cancel: CancelSignal) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGTERM])?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    shutdown_count += 1;
                    let exit_code = match sig {
                        SIGTERM => ExitCode::SignalTerm,
                        _ => ExitCode::SignalInt,
                    };
                    if shutdown_count > 1 {
                        exit_code.exit();
                    }
                    tracing::warn!(signal = sig, "received signal, stopping merge");
                    CANCELLED_BY_SIGNAL.store(sig, Ordering::SeqCst);
                    cancel.cancel();
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            // Windows signal handling using flag-based approach
            let term_flag = Arc::new(AtomicBool::new(false));
            flag::register(SIGINT, Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || loop {
                thread::sleep(std::time::Duration::from_millis(100));
                if term_flag.swap(false, Ordering::Relaxed) {
                    if cancel.is_cancelled() {
                        ExitCode::SignalInt.exit();
                    }
                    CANCELLED_BY_SIGNAL.store(SIGINT, Ordering::SeqCst);
                    cancel.cancel();
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }

    /// Exit code matching the signal that cancelled the run, if any
    pub fn exit_code() -> Option<ExitCode> {
        match CANCELLED_BY_SIGNAL.load(Ordering::SeqCst) {
            0 => None,
            #[cfg(unix)]
            SIGTERM => Some(ExitCode::SignalTerm),
            _ => Some(ExitCode::SignalInt),
        }
    }
}
