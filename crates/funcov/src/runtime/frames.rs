//! Thread-Local Call Context
//!
//! Every invocation routed through a [`FunctionObject`](super::FunctionObject)
//! pushes a [`Frame`] onto the calling thread's stack and pops it when the
//! call returns or unwinds. The test runner pushes a [`FrameKind::Test`]
//! frame around each test. The immediate caller of a running callable is
//! therefore always the frame directly beneath its own, whatever the native
//! stack looks like.

use super::FunctionId;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static CALL_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// What pushed a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A test item entered by the runner
    Test,
    /// A function invocation
    Function,
}

/// One entry of the call-context stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identity of the invoked function (absent for runner-entered tests)
    pub function: Option<FunctionId>,
    /// Unqualified function or test name
    pub name: Arc<str>,
    /// Dotted module name
    pub module: Arc<str>,
    /// Frame origin
    pub kind: FrameKind,
}

impl Frame {
    /// Frame for a test item entered by the runner
    #[must_use]
    pub fn test(name: &str, module: &str) -> Self {
        Self {
            function: None,
            name: Arc::from(name),
            module: Arc::from(module),
            kind: FrameKind::Test,
        }
    }

    /// Frame for a function invocation
    #[must_use]
    pub fn function(id: FunctionId, name: Arc<str>, module: Arc<str>) -> Self {
        Self {
            function: Some(id),
            name,
            module,
            kind: FrameKind::Function,
        }
    }
}

/// Pops its frame (and anything left above it) when dropped
///
/// Not `Send`: the frame lives on the thread that pushed it.
#[derive(Debug)]
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    index: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let index = self.index;
        // try_with: the stack may already be gone during thread teardown
        let _ = CALL_STACK.try_with(|stack| stack.borrow_mut().truncate(index));
    }
}

/// Push a frame for the current thread
pub fn enter(frame: Frame) -> FrameGuard {
    let index = CALL_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(frame);
        stack.len() - 1
    });
    FrameGuard {
        index,
        _not_send: PhantomData,
    }
}

/// The innermost frame
#[must_use]
pub fn current() -> Option<Frame> {
    CALL_STACK.with(|stack| stack.borrow().last().cloned())
}

/// The frame directly beneath the innermost one
///
/// Called from inside a running function this is its immediate caller.
/// `None` when the function was invoked with nothing beneath it, e.g. from
/// plain host code outside any test.
#[must_use]
pub fn caller() -> Option<Frame> {
    CALL_STACK.with(|stack| {
        let stack = stack.borrow();
        stack.len().checked_sub(2).map(|i| stack[i].clone())
    })
}

/// Number of frames on this thread
#[must_use]
pub fn depth() -> usize {
    CALL_STACK.with(|stack| stack.borrow().len())
}
