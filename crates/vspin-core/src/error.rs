//! Error types for the arbitration core
//!
//! There is one class of runtime failure: the scheduler (or a caller of the
//! administrative API) broke its contract, or the arbiter found its own
//! metadata inconsistent. None of these are recoverable. Handlers return
//! them as `SpinError` so they surface at the point of detection, and the
//! substrate-facing entry points pass them to [`fatal`].

use core::fmt;

use crate::id::ThreadId;
use crate::state::ThreadState;
use crate::unit::IPoint;

/// Result type for arbiter operations
pub type SpinResult<T> = Result<T, SpinError>;

/// Errors that can occur in arbiter operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinError {
    /// The scheduler collaborator broke its contract
    ContractViolation(Violation),

    /// Internal expected-state check failed
    InvariantBroken(&'static str),

    /// Thread id beyond the configured capacity
    CapacityExceeded { tid: ThreadId, max: usize },

    /// Administrative operation on a thread in the wrong state
    InvalidState {
        tid: ThreadId,
        state: ThreadState,
        op: &'static str,
    },

    /// Blocking would leave no runnable captured thread
    ///
    /// Reported by `block_idle_thread` when the captured count is at most
    /// one. While the table is consistent an `Idle` thread implies a
    /// `Running` one, so this only fires on corrupted bookkeeping.
    LastRunnable(ThreadId),

    /// Arbiter already attached to this substrate
    AlreadyInitialized,

    /// Substrate has no register slots left
    RegisterExhausted,

    /// Configuration rejected
    Config(&'static str),
}

/// Ways a scheduler can break its contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Returned tid is outside `[0, max)`
    TidOutOfRange { tid: ThreadId, max: usize },

    /// Returned tid is not `Idle`
    NotIdle { tid: ThreadId, state: ThreadState },

    /// `arm_block_after_switch` called twice before a switch
    AlreadyArmed,

    /// Switch decision kept the current thread while a block was armed
    SameThreadWhileArmed(ThreadId),

    /// Switch hook fired on a context that is not the executor's
    NotExecutor { tid: ThreadId, executor: ThreadId },

    /// Switch point requested at an unsupported position
    UnsupportedPlacement(IPoint),

    /// Switch point requested past the end of the unit
    PlacementOutOfRange { index: usize, len: usize },
}

impl fmt::Display for SpinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpinError::ContractViolation(v) => write!(f, "scheduler contract violation: {}", v),
            SpinError::InvariantBroken(what) => write!(f, "invariant broken: {}", what),
            SpinError::CapacityExceeded { tid, max } => {
                write!(f, "thread {} exceeds capacity of {} threads", tid, max)
            }
            SpinError::InvalidState { tid, state, op } => {
                write!(f, "{} on thread {} in state {}", op, tid, state)
            }
            SpinError::LastRunnable(tid) => {
                write!(f, "cannot block thread {}: it is the last runnable thread", tid)
            }
            SpinError::AlreadyInitialized => write!(f, "arbiter already initialized"),
            SpinError::RegisterExhausted => write!(f, "no scheduler register slots available"),
            SpinError::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TidOutOfRange { tid, max } => {
                write!(f, "returned invalid tid {} (max {})", tid, max)
            }
            Violation::NotIdle { tid, state } => {
                write!(f, "returned tid {}, which is not IDLE (state {})", tid, state)
            }
            Violation::AlreadyArmed => write!(f, "block-after-switch already armed"),
            Violation::SameThreadWhileArmed(tid) => write!(
                f,
                "switch decision from thread {} armed block-after-switch but returned the same thread",
                tid
            ),
            Violation::NotExecutor { tid, executor } => write!(
                f,
                "thread {} hit a switch point but the executor is {}",
                tid, executor
            ),
            Violation::UnsupportedPlacement(point) => {
                write!(f, "switch points only support Before, got {:?}", point)
            }
            Violation::PlacementOutOfRange { index, len } => {
                write!(f, "switch point at op {} in a unit of {} ops", index, len)
            }
        }
    }
}

impl std::error::Error for SpinError {}

impl From<Violation> for SpinError {
    fn from(v: Violation) -> Self {
        SpinError::ContractViolation(v)
    }
}

/// Report a fatal error and terminate the process
///
/// Printed unconditionally (regardless of log level), then the process
/// exits with status 1.
#[cold]
pub fn fatal(err: &SpinError) -> ! {
    crate::kprintln!("[vspin] Panic: {}", err);
    std::process::exit(1)
}

/// Return `InvariantBroken` from the enclosing function when `cond` is false
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $what:literal) => {
        if !($cond) {
            return Err($crate::error::SpinError::InvariantBroken($what));
        }
    };
}
