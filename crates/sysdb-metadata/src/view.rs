//! Versioned metadata views with change notification
//!
//! A `SemilatticeView` holds one piece of cluster-wide metadata. Readers take
//! snapshots; writers mutate through `apply`, which bumps the version and wakes
//! every waiter. Waiters re-check their condition on each change
//! (poll-on-change), and abort when their interruptor fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use sysdb_common::{AdminResult, Interruptor};

/// Read-only access to a changing value
pub trait Watchable<T>: Send + Sync {
    /// Snapshot of the current value
    fn get(&self) -> T;

    /// Monotonic version; advances on every change
    fn version(&self) -> u64;

    /// Future that resolves on the next change
    fn notified(&self) -> Notified<'_>;
}

/// Suspend until the watchable's version moves past `seen`
///
/// Returns the new version. Fails with `Interrupted` if the interruptor fires first.
pub async fn wait_for_change<T, W>(
    watchable: &W,
    seen: u64,
    interruptor: &Interruptor,
) -> AdminResult<u64>
where
    W: Watchable<T> + ?Sized,
{
    loop {
        // Register interest before checking, so a change in between is not lost
        let notified = watchable.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let current = watchable.version();
        if current > seen {
            return Ok(current);
        }
        interruptor.check()?;
        interruptor.run(notified.as_mut()).await?;
    }
}

/// Suspend until `pred` holds for the current value
pub async fn run_until_satisfied<T, W, F>(
    watchable: &W,
    mut pred: F,
    interruptor: &Interruptor,
) -> AdminResult<()>
where
    W: Watchable<T> + ?Sized,
    F: FnMut(&T) -> bool,
{
    loop {
        let seen = watchable.version();
        if pred(&watchable.get()) {
            return Ok(());
        }
        wait_for_change(watchable, seen, interruptor).await?;
    }
}

struct Versioned<T> {
    version: u64,
    value: T,
}

/// Shared, read-write view of one metadata value
pub struct SemilatticeView<T> {
    state: RwLock<Versioned<T>>,
    version: AtomicU64,
    notify: Notify,
}

impl<T: Clone + Send + Sync> SemilatticeView<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: RwLock::new(Versioned { version: 0, value }),
            version: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub fn shared(value: T) -> Arc<Self> {
        Arc::new(Self::new(value))
    }

    /// Borrow the current value without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.read().value)
    }

    /// Mutate the value; the change is published to waiters once `f` returns
    pub fn apply<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let out = {
            let mut state = self.state.write();
            let out = f(&mut state.value);
            state.version += 1;
            self.version.store(state.version, Ordering::Release);
            out
        };
        self.notify.notify_waiters();
        out
    }

    /// Mutate a copy of the value and commit it only if `f` succeeds
    ///
    /// A failed call leaves both the value and the version untouched.
    pub fn try_apply<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let out = {
            let mut state = self.state.write();
            let mut staged = state.value.clone();
            let out = f(&mut staged)?;
            state.value = staged;
            state.version += 1;
            self.version.store(state.version, Ordering::Release);
            out
        };
        self.notify.notify_waiters();
        Ok(out)
    }
}

impl<T: Clone + Send + Sync> Watchable<T> for SemilatticeView<T> {
    fn get(&self) -> T {
        self.state.read().value.clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sysdb_common::AdminErrorKind;

    #[test]
    fn test_apply_bumps_version() {
        let view = SemilatticeView::new(1u32);
        assert_eq!(view.version(), 0);
        view.apply(|v| *v += 1);
        assert_eq!(view.get(), 2);
        assert_eq!(view.version(), 1);
    }

    #[test]
    fn test_try_apply_failure_leaves_state() {
        let view = SemilatticeView::new(vec![1, 2]);
        let result: Result<(), &str> = view.try_apply(|v| {
            v.push(3);
            Err("rejected")
        });
        assert!(result.is_err());
        assert_eq!(view.get(), vec![1, 2]);
        assert_eq!(view.version(), 0);

        let ok: Result<usize, &str> = view.try_apply(|v| {
            v.push(3);
            Ok(v.len())
        });
        assert_eq!(ok, Ok(3));
        assert_eq!(view.version(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_change_wakes() {
        let view = SemilatticeView::shared(0u32);
        let writer = view.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.apply(|v| *v = 7);
        });
        let interruptor = Interruptor::new();
        let version = wait_for_change(view.as_ref(), 0, &interruptor).await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(view.get(), 7);
    }

    #[tokio::test]
    async fn test_run_until_satisfied() {
        let view = SemilatticeView::shared(0u32);
        let writer = view.clone();
        tokio::spawn(async move {
            for i in 1..=5 {
                tokio::time::sleep(Duration::from_millis(2)).await;
                writer.apply(|v| *v = i);
            }
        });
        let interruptor = Interruptor::new();
        run_until_satisfied(view.as_ref(), |v| *v >= 5, &interruptor)
            .await
            .unwrap();
        assert_eq!(view.get(), 5);
    }

    #[tokio::test]
    async fn test_wait_interrupted() {
        let view = SemilatticeView::shared(0u32);
        let interruptor = Interruptor::new();
        let trigger = interruptor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.pulse();
        });
        let err = run_until_satisfied(view.as_ref(), |v| *v > 0, &interruptor)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::Interrupted);
        assert_eq!(view.version(), 0);
    }
}
