use crate::{ErrorKind, Result};
use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};
use tokio::{sync::watch, time::Instant};

/// Request scoped cancellation and deadline handle.
///
/// Cloning yields a handle to the same context. The `with_*` constructors derive a child:
/// cancelling the parent cancels every child, cancelling a child never reaches the parent
/// or its siblings. A child's deadline never outlives its parent's.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: watch::Sender<bool>,
    deadline: Option<Instant>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(deadline: Option<Instant>) -> Self {
        Self {
            cancelled: watch::Sender::new(false),
            deadline,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        if self.cancelled.send_replace(true) {
            return;
        }
        let children = match self.children.lock() {
            Ok(mut children) => std::mem::take(&mut *children),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

impl Context {
    /// Root context: no deadline, cancelled only through [`Context::cancel`].
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner::new(None)),
        }
    }

    /// Child context cancelled together with `self` or on its own.
    pub fn with_cancel(&self) -> Self {
        self.child(self.inner.deadline)
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.child(Some(deadline))
    }

    fn child(&self, deadline: Option<Instant>) -> Self {
        let child = Arc::new(Inner::new(deadline));
        {
            let mut children = match self.inner.children.lock() {
                Ok(children) => children,
                Err(poisoned) => poisoned.into_inner(),
            };
            children.retain(|v| v.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        if self.inner.is_cancelled() {
            child.cancel();
        }
        Self { inner: child }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Why this context is done, `None` while it is still live.
    pub fn error(&self) -> Option<ErrorKind> {
        if self.is_cancelled() {
            Some(ErrorKind::Cancelled)
        } else if self.inner.deadline.is_some_and(|v| v <= Instant::now()) {
            Some(ErrorKind::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Completes when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ErrorKind {
        let mut receiver = self.inner.cancelled.subscribe();
        let cancelled = receiver.wait_for(|v| *v);
        match self.inner.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => ErrorKind::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ErrorKind::DeadlineExceeded,
            },
            None => {
                let _ = cancelled.await;
                ErrorKind::Cancelled
            }
        }
    }

    /// Drive `future` unless the context finishes first, in which case `future` is dropped
    /// and the context error is returned.
    pub async fn run<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        if let Some(kind) = self.error() {
            return Err(kind.into_error());
        }
        tokio::select! {
            biased;
            kind = self.done() => Err(kind.into_error()),
            result = future => result,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use crate::{ErrorExt, ErrorKind};
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_reaches_children_only() {
        let root = Context::background();
        let a = root.with_cancel();
        let b = root.with_cancel();
        let a1 = a.with_cancel();
        a.cancel();
        assert!(a.is_cancelled());
        assert!(a1.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!root.is_cancelled());
        root.cancel();
        assert!(b.is_cancelled());
        assert!(root.with_cancel().is_cancelled());
    }

    #[tokio::test]
    async fn run_stops_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(result.is_kind(ErrorKind::DeadlineExceeded));
        assert_eq!(ctx.error(), Some(ErrorKind::DeadlineExceeded));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let ctx = Context::background().with_cancel();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        assert!(result.is_kind(ErrorKind::Cancelled));
        assert_eq!(
            Context::background().run(async { Ok(1) }).await.unwrap(),
            1
        );
    }

    #[test]
    fn child_deadline_is_bounded_by_parent() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
