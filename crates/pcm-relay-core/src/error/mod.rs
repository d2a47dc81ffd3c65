use error_location::ErrorLocation;
use thiserror::Error;

/// Pipeline errors with source location tracking.
///
/// The variant set is closed: every failure the pipeline can surface maps
/// onto exactly one [`ErrorKind`] counter in the ledger.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A component failed to initialize.
    #[error("Init failed: {what} {location}")]
    InitFailed {
        /// Which component failed and why.
        what: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An allocation or memory reservation failed.
    #[error("Out of memory: {what} {location}")]
    OutOfMemory {
        /// What was being allocated.
        what: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The network link is down or could not be brought up.
    #[error("Network failed: {reason} {location}")]
    NetworkFailed {
        /// Description of the link failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid config: {reason} {location}")]
    InvalidConfig {
        /// Which value and why it was rejected.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The capture peripheral failed to deliver samples.
    #[error("Capture failure: {reason} {location}")]
    CaptureFailure {
        /// Description of the capture failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A transport send or connect failed.
    #[error("Transport failure: {reason} {location}")]
    TransportFailure {
        /// Description of the transport failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The ring buffer dropped samples.
    #[error("Buffer overflow: dropped {dropped} samples {location}")]
    BufferOverflow {
        /// Number of samples that did not fit.
        dropped: usize,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A bounded wait expired. An expired lock deadline is treated as a
    /// suspected deadlock and escalates to FATAL.
    #[error("Timeout: {what} {location}")]
    Timeout {
        /// Which wait expired.
        what: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl PipelineError {
    /// The ledger counter this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InitFailed { .. } => ErrorKind::InitFailed,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::NetworkFailed { .. } => ErrorKind::NetworkFailed,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::CaptureFailure { .. } => ErrorKind::CaptureFailure,
            Self::TransportFailure { .. } => ErrorKind::TransportFailure,
            Self::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Closed set of error kinds tracked by the ledger, one counter each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Component initialization failed.
    InitFailed,
    /// Allocation failed.
    OutOfMemory,
    /// Link down / unreachable.
    NetworkFailed,
    /// Rejected configuration value.
    InvalidConfig,
    /// Capture peripheral failure.
    CaptureFailure,
    /// Transport send/connect failure.
    TransportFailure,
    /// Ring buffer dropped samples.
    BufferOverflow,
    /// Bounded wait expired.
    Timeout,
}

impl ErrorKind {
    /// Number of kinds; sizes the ledger's counter array.
    pub const COUNT: usize = 8;

    /// Stable index into the ledger's counter array.
    pub fn index(self) -> usize {
        match self {
            Self::InitFailed => 0,
            Self::OutOfMemory => 1,
            Self::NetworkFailed => 2,
            Self::InvalidConfig => 3,
            Self::CaptureFailure => 4,
            Self::TransportFailure => 5,
            Self::BufferOverflow => 6,
            Self::Timeout => 7,
        }
    }

    /// Short uppercase name used in log lines and the persisted record.
    pub fn name(self) -> &'static str {
        match self {
            Self::InitFailed => "INIT_FAILED",
            Self::OutOfMemory => "NO_MEMORY",
            Self::NetworkFailed => "NETWORK_FAILED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::CaptureFailure => "CAPTURE_FAILURE",
            Self::TransportFailure => "TRANSPORT_FAILURE",
            Self::BufferOverflow => "BUFFER_OVERFLOW",
            Self::Timeout => "TIMEOUT",
        }
    }

    /// Inverse of [`ErrorKind::index`], for decoding persisted records.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::InitFailed),
            1 => Some(Self::OutOfMemory),
            2 => Some(Self::NetworkFailed),
            3 => Some(Self::InvalidConfig),
            4 => Some(Self::CaptureFailure),
            5 => Some(Self::TransportFailure),
            6 => Some(Self::BufferOverflow),
            7 => Some(Self::Timeout),
            _ => None,
        }
    }
}

/// Severity attached to a ledger record. Ordered: `Info < Warning < Error <
/// Critical < Fatal`. `Critical` and above are persisted; `Fatal` reboots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational, no action needed.
    Info,
    /// Degraded operation.
    Warning,
    /// Functionality impaired.
    Error,
    /// Restart required soon.
    Critical,
    /// Immediate persisted rebooting exit.
    Fatal,
}

impl Severity {
    /// Short uppercase name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Fatal => "FATAL",
        }
    }
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;
