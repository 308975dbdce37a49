use std::ops::{Deref, DerefMut};

use crate::cancel::CancellationToken;
use crate::error::ApiError;
use crate::ids::RequestId;
use crate::security::Identity;
use crate::throttle::ThrottleDecision;

/// Nested internal calls deeper than this fail instead of recursing forever.
pub const MAX_CALL_DEPTH: usize = 32;

/// One in-flight internal call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// `"METHOD URI"` of the synthesized request.
    pub key: String,
    pub request_id: RequestId,
    pub version: String,
}

/// Identity pretense applied to internal calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Kept for the rest of the outer request.
    pub identity: Option<Identity>,
    /// Next internal call only. Takes precedence over `identity`.
    pub once: Option<Identity>,
}

/// State of one logical external request, shared by all of its internal
/// sub-requests and never by another external request.
#[derive(Debug)]
pub struct RequestScope {
    root: RequestId,
    stack: Vec<Frame>,
    overrides: Overrides,
    cancel: CancellationToken,
    identity: Option<Identity>,
    format: Option<String>,
    failed_stack: Vec<String>,
    throttle: Option<ThrottleDecision>,
}

impl RequestScope {
    pub fn new(root: RequestId, cancel: CancellationToken) -> Self {
        Self {
            root,
            stack: Vec::new(),
            overrides: Overrides::default(),
            cancel,
            identity: None,
            format: None,
            failed_stack: Vec::new(),
            throttle: None,
        }
    }

    /// Id of the external request this scope belongs to.
    #[must_use]
    pub fn root_request_id(&self) -> RequestId {
        self.root
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.stack
    }

    #[must_use]
    pub fn current(&self) -> Option<&Frame> {
        self.stack.last()
    }

    /// Frame keys, outermost first.
    #[must_use]
    pub fn call_stack(&self) -> Vec<String> {
        self.stack.iter().map(|f| f.key.clone()).collect()
    }

    /// Remember the current call stack as the site of a failed internal call.
    /// The deepest failure seen in this scope is kept.
    pub fn record_failure(&mut self) {
        if self.stack.len() > self.failed_stack.len() {
            self.failed_stack = self.call_stack();
        }
    }

    /// Call stack of the deepest failed internal call, if any.
    #[must_use]
    pub fn failed_call_stack(&self) -> &[String] {
        &self.failed_stack
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn pretend(&mut self, identity: Identity, once: bool) {
        if once {
            self.overrides.once = Some(identity);
        } else {
            self.overrides.identity = Some(identity);
        }
    }

    /// Turn the persistent pretense into a one-shot one for the next call.
    pub fn limit_pretense_to_next_call(&mut self) {
        if let Some(identity) = self.overrides.identity.take() {
            self.overrides.once = Some(identity);
        }
    }

    pub fn forget_pretense(&mut self) {
        self.overrides = Overrides::default();
    }

    /// Identity for the next internal call: the pretended one, else the
    /// identity of the outer request.
    #[must_use]
    pub fn effective_identity(&self) -> Option<&Identity> {
        self.overrides
            .once
            .as_ref()
            .or(self.overrides.identity.as_ref())
            .or(self.identity.as_ref())
    }

    /// Identity of the external request, recorded by the router.
    pub(crate) fn set_outer(&mut self, identity: Option<Identity>, format: Option<String>) {
        self.identity = identity;
        self.format = format;
    }

    /// Rate-limit outcome of the external request, kept so error responses
    /// carry the same headers as successful ones.
    pub(crate) fn record_throttle(&mut self, decision: ThrottleDecision) {
        self.throttle = Some(decision);
    }

    #[must_use]
    pub fn throttle_decision(&self) -> Option<&ThrottleDecision> {
        self.throttle.as_ref()
    }

    /// Negotiated format of the external request, if it targeted the API.
    #[must_use]
    pub fn outer_format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Push a frame. The returned guard pops it and restores the overrides
    /// when dropped, on success, error and panic alike.
    pub fn push(&mut self, frame: Frame) -> Result<FrameGuard<'_>, ApiError> {
        if self.stack.len() >= MAX_CALL_DEPTH {
            return Err(ApiError::Fatal(anyhow::anyhow!(
                "internal dispatch exceeded {MAX_CALL_DEPTH} nested calls at {}",
                frame.key
            )));
        }
        let depth = self.stack.len();
        let snapshot = self.overrides.clone();
        self.stack.push(frame);
        Ok(FrameGuard {
            scope: self,
            depth,
            snapshot,
        })
    }
}

/// Scoped ownership of one stack frame.
///
/// Derefs to the [`RequestScope`] so the router can be re-entered through
/// the guard while the frame is live.
pub struct FrameGuard<'a> {
    scope: &'a mut RequestScope,
    depth: usize,
    snapshot: Overrides,
}

impl Deref for FrameGuard<'_> {
    type Target = RequestScope;

    fn deref(&self) -> &RequestScope {
        self.scope
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut RequestScope {
        self.scope
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.scope.stack.truncate(self.depth);
        let mut snapshot = std::mem::take(&mut self.snapshot);
        snapshot.once = None;
        self.scope.overrides = snapshot;
    }
}
