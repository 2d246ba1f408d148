//! rpc_cache error types.

use crate::Fingerprint;
use std::sync::Arc;
use std::time::Duration;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The rpc_cache error type.
///
/// Every waiter of a fingerprint receives a clone of the same outcome,
/// so this type is required to implement `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The caller did not supply an invocable fetch capability.
    /// Returned before any cache state is touched.
    #[error("invalid fetch function: a fetch capability is required")]
    InvalidFetchFunction,

    /// The fetch capability itself failed. Local waiters and sibling
    /// contexts all receive this same failure.
    #[error("upstream failure: {ctx} (src: {src})")]
    Upstream {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },

    /// A wait on a fetch running in another context did not settle in time.
    #[error("timed out after {after:?} waiting for {fingerprint} to settle")]
    Timeout {
        /// The fingerprint that never settled.
        fingerprint: Fingerprint,

        /// The configured wait window.
        after: Duration,
    },

    /// A value could not be serialized or deserialized.
    #[error("serialization failure: {ctx} (src: {src})")]
    Serialization {
        /// What was being (de)serialized.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },

    /// Generic internal error, e.g. a failing store.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

fn ctx<C: std::fmt::Display>(ctx: C) -> Arc<str> {
    ctx.to_string().into_boxed_str().into()
}

impl CacheError {
    /// Construct an "upstream" error.
    pub fn upstream<C: std::fmt::Display>(c: C) -> Self {
        Self::Upstream {
            ctx: ctx(c),
            src: DynInnerError::default(),
        }
    }

    /// Construct an "upstream" error with an inner source error.
    pub fn upstream_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        c: C,
        src: S,
    ) -> Self {
        Self::Upstream {
            ctx: ctx(c),
            src: DynInnerError::new(src),
        }
    }

    /// Construct a "serialization" error with an inner source error.
    pub fn serialization_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        c: C,
        src: S,
    ) -> Self {
        Self::Serialization {
            ctx: ctx(c),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        c: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx(c),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(c: C) -> Self {
        Self::Other {
            ctx: ctx(c),
            src: DynInnerError::default(),
        }
    }

    /// Returns true for [CacheError::Timeout].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The rpc_cache result type.
pub type CacheResult<T> = Result<T, CacheError>;

/// The variant of a reported [CacheError].
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// [CacheError::InvalidFetchFunction].
    InvalidFetchFunction,

    /// [CacheError::Upstream].
    #[default]
    Upstream,

    /// [CacheError::Timeout].
    Timeout,

    /// [CacheError::Serialization].
    Serialization,

    /// [CacheError::Other].
    Other,
}

/// The serializable form of a failure, as carried in a
/// [BroadcastMessage](crate::BroadcastMessage).
///
/// Converting a report back into a [CacheError] yields the variant it was
/// made from, with the inner source reduced to its display text.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Which variant failed.
    #[serde(default)]
    pub kind: ErrorKind,

    /// The error context, or the fingerprint for a timeout.
    pub message: String,

    /// Display text of the inner source error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// The wait window of a timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_ms: Option<u64>,
}

impl From<&CacheError> for ErrorReport {
    fn from(err: &CacheError) -> Self {
        let report = |kind, ctx: &Arc<str>, src: &DynInnerError| Self {
            kind,
            message: ctx.to_string(),
            source: src.0.as_ref().map(|s| s.to_string()),
            after_ms: None,
        };
        match err {
            CacheError::InvalidFetchFunction => Self {
                kind: ErrorKind::InvalidFetchFunction,
                message: err.to_string(),
                source: None,
                after_ms: None,
            },
            CacheError::Upstream { ctx, src } => {
                report(ErrorKind::Upstream, ctx, src)
            }
            CacheError::Timeout { fingerprint, after } => Self {
                kind: ErrorKind::Timeout,
                message: fingerprint.to_string(),
                source: None,
                after_ms: Some(
                    u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
                ),
            },
            CacheError::Serialization { ctx, src } => {
                report(ErrorKind::Serialization, ctx, src)
            }
            CacheError::Other { ctx, src } => {
                report(ErrorKind::Other, ctx, src)
            }
        }
    }
}

/// An inner error known only by its display text.
#[derive(Debug)]
struct ReportedSource(String);

impl std::fmt::Display for ReportedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ReportedSource {}

impl From<ErrorReport> for CacheError {
    fn from(report: ErrorReport) -> Self {
        let src = report
            .source
            .map(|s| DynInnerError::new(ReportedSource(s)))
            .unwrap_or_default();
        let ctx = ctx(report.message);
        match report.kind {
            ErrorKind::InvalidFetchFunction => Self::InvalidFetchFunction,
            ErrorKind::Upstream => Self::Upstream { ctx, src },
            ErrorKind::Timeout => Self::Timeout {
                fingerprint: Fingerprint::from(ctx.to_string()),
                after: Duration::from_millis(
                    report.after_ms.unwrap_or_default(),
                ),
            },
            ErrorKind::Serialization => Self::Serialization { ctx, src },
            ErrorKind::Other => Self::Other { ctx, src },
        }
    }
}
