//! Scoped error reporting for vex operations.
//!
//! Every fallible operation in the workspace returns [`Result<T>`]. An
//! [`Error`] carries a stable [`ErrorCode`], a formatted message, an ordered
//! list of propagation frames, and a snapshot of whichever graph/node/
//! transform identifiers were active when the error was created.
//!
//! Forwarding an error (the `?` operator through a function boundary that
//! calls [`Error::push_frame`]) appends a frame but never changes the root
//! code or message — see `spec.md` §4.A / §7.

use std::fmt;

use thiserror::Error;

/// Stable, closed set of error codes. Wire-visible subset is noted per variant.
///
/// `Display` (and thus [`ErrorCode::describe`]) is derived with `thiserror`,
/// the same way the rest of the workspace derives its leaf error messages —
/// the per-variant context-chain machinery in [`Error`] stays hand-rolled,
/// but the fixed code-to-string table below has no reason not to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    /// Unclassified failure.
    #[error("generic error")]
    Generic,
    /// Allocation failure (arena or heap).
    #[error("allocation failure")]
    Allocation,
    /// Frame or stream content failed a structural check.
    #[error("corrupted frame or stream")]
    Corruption,
    /// Source buffer shorter than the operation requires.
    #[error("source size too small")]
    SrcSizeTooSmall,
    /// Destination buffer too small to hold the result.
    #[error("destination capacity too small")]
    DstCapacityTooSmall,
    /// A node rejected its input (type, shape, or content).
    #[error("node rejected its input")]
    NodeInvalidInput,
    /// A graph failed type-compatibility or wiring validation.
    #[error("graph is not type-compatible or is miswired")]
    GraphInvalid,
    /// No format version has been set on a compressor instance.
    #[error("format version was not set")]
    FormatVersionNotSet,
    /// Format version is outside the negotiated `[MIN, MAX]`, or a node's
    /// floor exceeds the negotiated version.
    #[error("format version is unsupported")]
    FormatVersionUnsupported,
    /// Content checksum did not match decompressed output.
    #[error("content checksum mismatch")]
    ContentChecksumWrong,
    /// Compressed-stream checksum did not match the compressed payload.
    #[error("compressed-stream checksum mismatch")]
    CompressedChecksumWrong,
    /// Magic bytes matched neither this format nor a recognized foreign one.
    #[error("unrecognized magic header")]
    HeaderUnknown,
    /// A node or graph invocation failed during execution.
    #[error("transform execution failed")]
    TransformExecutionFailure,
    /// Programmer error: an invariant the caller is responsible for was violated.
    #[error("internal logic error")]
    LogicError,
    /// Internal scratch buffer was undersized for this attempt.
    #[error("internal scratch buffer too small")]
    InternalBufferTooSmall,
    /// A requested transform/graph wiring is structurally invalid.
    #[error("invalid transform wiring")]
    InvalidTransform,
    /// A caller-supplied request was malformed independent of any graph.
    #[error("invalid request")]
    InvalidRequest,
}

impl ErrorCode {
    /// Human-readable, stable description of this code (independent of
    /// any particular error's formatted message). Delegates to the
    /// `thiserror`-derived `Display` impl above.
    pub fn describe(self) -> String {
        self.to_string()
    }

    /// Whether this code's presence is meaningful to a decoder reading a
    /// frame (as opposed to being purely a caller-side programming error).
    pub fn is_wire_visible(self) -> bool {
        matches!(
            self,
            ErrorCode::FormatVersionNotSet
                | ErrorCode::FormatVersionUnsupported
                | ErrorCode::Corruption
                | ErrorCode::HeaderUnknown
                | ErrorCode::ContentChecksumWrong
                | ErrorCode::CompressedChecksumWrong
                | ErrorCode::NodeInvalidInput
        )
    }
}

/// A single propagation frame: where an error was created or forwarded.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Source file of the call site (`file!()`).
    pub file: &'static str,
    /// Line number of the call site.
    pub line: u32,
    /// Optional formatted note attached at this frame.
    pub note: Option<String>,
}

/// Snapshot of the active (node, graph, transform) identifiers at the
/// moment an error was created, taken from the ambient [`ScopeStack`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphContext {
    /// Active node identifier, if any.
    pub node_id: Option<u32>,
    /// Active graph identifier, if any.
    pub graph_id: Option<u32>,
    /// Active transform (trace entry) index, if any.
    pub transform_id: Option<u32>,
}

/// The error type returned by every fallible vex operation.
#[derive(Debug, Clone)]
pub struct Error {
    code: ErrorCode,
    message: String,
    frames: Vec<Frame>,
    context: GraphContext,
}

impl Error {
    /// Construct a new root error with the given code and message.
    #[track_caller]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            code,
            message: message.into(),
            frames: vec![Frame {
                file: loc.file(),
                line: loc.line(),
                note: None,
            }],
            context: ScopeStack::snapshot(),
        }
    }

    /// The root error code. Never changes across propagation.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The root message. Never changes across propagation.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The (node, graph, transform) context active when this error was created.
    pub fn graph_context(&self) -> GraphContext {
        self.context
    }

    /// Append a propagation frame without altering the root code/message.
    #[track_caller]
    pub fn push_frame(mut self, note: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        self.frames.push(Frame {
            file: loc.file(),
            line: loc.line(),
            note: Some(note.into()),
        });
        self
    }

    /// The full reverse stack trace of formatting sites, most recent first.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }

    /// A single string combining root code, root message, the reverse
    /// stack trace, and the active graph/node/transform identifiers.
    pub fn context_string(&self) -> String {
        let mut out = format!("[{}] {}", self.code.describe(), self.message);
        for frame in self.frames() {
            match &frame.note {
                Some(note) => out.push_str(&format!("\n  at {}:{} — {note}", frame.file, frame.line)),
                None => out.push_str(&format!("\n  at {}:{}", frame.file, frame.line)),
            }
        }
        if self.context.node_id.is_some()
            || self.context.graph_id.is_some()
            || self.context.transform_id.is_some()
        {
            out.push_str(&format!(
                "\n  context: node={:?} graph={:?} transform={:?}",
                self.context.node_id, self.context.graph_id, self.context.transform_id
            ));
        }
        out
    }

    /// Coerce this error to a last-resort code, as release builds do when
    /// a logic error would otherwise abort (`spec.md` §4.A).
    pub fn coerce_release(self) -> Self {
        if self.code == ErrorCode::LogicError {
            Self {
                code: ErrorCode::Generic,
                ..self
            }
        } else {
            self
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.context_string())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Error::new(ErrorCode::Generic, e.to_string())
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Raise a logic error: in debug builds this panics (the `spec.md` §4.A
/// "terminates the process in debug builds" policy); in release builds it
/// is coerced to a last-resort code and returned normally.
#[track_caller]
pub fn logic_error(message: impl Into<String>) -> Error {
    let err = Error::new(ErrorCode::LogicError, message);
    if cfg!(debug_assertions) {
        panic!("{}", err.context_string());
    }
    err.coerce_release()
}

/// A frame on the logical scope stack: augments every error created while
/// in scope with the active (node, graph, transform) identifiers.
///
/// Scopes nest via RAII: constructing a guard via [`ScopeStack::enter`]
/// pushes onto a thread-local stack, and dropping it pops. Because the
/// engine's execution model is single-threaded and cooperative within one
/// compress/decompress call (`spec.md` §5), a thread-local is sufficient
/// and avoids any locking.
pub struct ScopeStack;

thread_local! {
    static STACK: std::cell::RefCell<Vec<GraphContext>> = const { std::cell::RefCell::new(Vec::new()) };
}

impl ScopeStack {
    /// Push a new scope frame, returning a guard that pops it on drop.
    pub fn enter(ctx: GraphContext) -> ScopeGuard {
        STACK.with(|s| s.borrow_mut().push(ctx));
        ScopeGuard { _private: () }
    }

    /// The current top-of-stack context, or the default (all `None`) if
    /// no scope is active.
    pub fn snapshot() -> GraphContext {
        STACK.with(|s| s.borrow().last().copied().unwrap_or_default())
    }
}

/// RAII guard returned by [`ScopeStack::enter`].
pub struct ScopeGuard {
    _private: (),
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Per-operation error storage: one reusable, lazily-allocated [`Error`]
/// slot per [`ErrorCode`], so repeated errors of the same kind during a
/// single compress/decompress call reuse storage rather than allocating
/// afresh each time (`spec.md` §4.A).
#[derive(Debug, Default)]
pub struct OperationContext {
    slots: std::collections::HashMap<ErrorCode, Error>,
}

impl OperationContext {
    /// Create an empty operation context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) the error for `code`, returning a clone of the
    /// stored error for the caller to propagate.
    #[track_caller]
    pub fn raise(&mut self, code: ErrorCode, message: impl Into<String>) -> Error {
        let err = Error::new(code, message);
        self.slots.insert(code, err.clone());
        self.slots.get(&code).unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarding_preserves_root_code_and_message() {
        let err = Error::new(ErrorCode::Corruption, "bad chunk length");
        let forwarded = err.clone().push_frame("while decoding chunk 3");
        assert_eq!(forwarded.code(), ErrorCode::Corruption);
        assert_eq!(forwarded.message(), "bad chunk length");
        assert!(forwarded.context_string().contains("while decoding chunk 3"));
    }

    #[test]
    fn scope_stack_snapshots_into_new_errors() {
        let _guard = ScopeStack::enter(GraphContext {
            node_id: Some(7),
            graph_id: Some(2),
            transform_id: Some(1),
        });
        let err = Error::new(ErrorCode::NodeInvalidInput, "bad width");
        assert_eq!(err.graph_context().node_id, Some(7));
        assert_eq!(err.graph_context().graph_id, Some(2));
    }

    #[test]
    fn nested_scopes_restore_parent_on_drop() {
        assert_eq!(ScopeStack::snapshot(), GraphContext::default());
        {
            let _outer = ScopeStack::enter(GraphContext {
                node_id: Some(1),
                ..Default::default()
            });
            {
                let _inner = ScopeStack::enter(GraphContext {
                    node_id: Some(2),
                    ..Default::default()
                });
                assert_eq!(ScopeStack::snapshot().node_id, Some(2));
            }
            assert_eq!(ScopeStack::snapshot().node_id, Some(1));
        }
        assert_eq!(ScopeStack::snapshot(), GraphContext::default());
    }

    #[test]
    fn operation_context_reuses_slots_per_code() {
        let mut ctx = OperationContext::new();
        let e1 = ctx.raise(ErrorCode::Corruption, "first");
        let e2 = ctx.raise(ErrorCode::Corruption, "second");
        assert_eq!(e1.code(), e2.code());
        assert_eq!(e2.message(), "second");
    }

    #[test]
    fn every_code_has_a_distinct_description() {
        let codes = [
            ErrorCode::Generic,
            ErrorCode::Allocation,
            ErrorCode::Corruption,
            ErrorCode::SrcSizeTooSmall,
            ErrorCode::DstCapacityTooSmall,
            ErrorCode::NodeInvalidInput,
            ErrorCode::GraphInvalid,
            ErrorCode::FormatVersionNotSet,
            ErrorCode::FormatVersionUnsupported,
            ErrorCode::ContentChecksumWrong,
            ErrorCode::CompressedChecksumWrong,
            ErrorCode::HeaderUnknown,
            ErrorCode::TransformExecutionFailure,
            ErrorCode::LogicError,
            ErrorCode::InternalBufferTooSmall,
            ErrorCode::InvalidTransform,
            ErrorCode::InvalidRequest,
        ];
        let mut descriptions: Vec<String> = codes.iter().map(|c| c.describe()).collect();
        descriptions.sort();
        descriptions.dedup();
        assert_eq!(descriptions.len(), codes.len());
    }
}
