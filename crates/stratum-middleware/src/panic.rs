//! Panic capture for the ingress handler.
//!
//! A process-wide panic hook records a backtrace for panics raised while a
//! [`Capturing`] future is being polled and keeps them off stderr; the
//! ingress handler logs them instead. Panics elsewhere go to the previous
//! hook unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use crate::middleware::BoxFuture;

/// Panic payload signalling that the client went away.
///
/// Raised with [`cancel`]; the ingress handler marks the request 418 and
/// writes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Aborts the current request because the client disconnected.
pub fn cancel() -> ! {
    std::panic::panic_any(Cancelled)
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Installs the capturing panic hook once per process.
pub(crate) fn install_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            if info.payload().is::<Cancelled>() {
                return;
            }
            let stack = Backtrace::force_capture().to_string();
            STACK.with(|slot| *slot.borrow_mut() = Some(stack));
        }));
    });
}

/// Takes the backtrace of the last captured panic on this thread.
pub(crate) fn take_stack() -> Option<String> {
    STACK.with(|slot| slot.borrow_mut().take())
}

/// Renders a panic payload.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Cuts `stack` to at most `limit` bytes on a character boundary.
pub(crate) fn truncate_stack(mut stack: String, limit: usize) -> String {
    if stack.len() > limit {
        let mut end = limit;
        while !stack.is_char_boundary(end) {
            end -= 1;
        }
        stack.truncate(end);
    }
    stack
}

/// Marks polls of the inner future as capture scope for the hook.
pub(crate) struct Capturing<'a> {
    inner: BoxFuture<'a, ()>,
}

impl<'a> Capturing<'a> {
    pub(crate) fn new(inner: BoxFuture<'a, ()>) -> Self {
        Self { inner }
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

impl Future for Capturing<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let _guard = DepthGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::panic::AssertUnwindSafe;

    #[test]
    fn test_payload_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(payload_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(payload_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(payload_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_truncate_stack() {
        assert_eq!(truncate_stack("abcdef".into(), 3), "abc");
        assert_eq!(truncate_stack("abc".into(), 8), "abc");
        // 'é' is two bytes; never split it
        assert_eq!(truncate_stack("aé".into(), 2), "a");
    }

    #[tokio::test]
    async fn test_capturing_records_stack() {
        install_hook();
        let _ = take_stack();

        let fut = Capturing::new(Box::pin(async { panic!("captured") }));
        let outcome = AssertUnwindSafe(fut).catch_unwind().await;

        let payload = outcome.unwrap_err();
        assert_eq!(payload_message(payload.as_ref()), "captured");
        assert!(take_stack().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_has_no_stack() {
        install_hook();
        let _ = take_stack();

        let fut = Capturing::new(Box::pin(async { cancel() }));
        let payload = AssertUnwindSafe(fut).catch_unwind().await.unwrap_err();

        assert!(payload.is::<Cancelled>());
        assert!(take_stack().is_none());
    }
}
