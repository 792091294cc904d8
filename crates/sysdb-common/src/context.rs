//! Per-call operation context
//!
//! Owned by the caller of an administrative verb and passed by reference
//! through every layer. Carries the caller's identity and the interruptor
//! that aborts suspended work.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::auth::UserContext;
use crate::error::{AdminError, AdminResult};

/// Cancellation signal for a single administrative call
#[derive(Clone, Debug, Default)]
pub struct Interruptor {
    token: CancellationToken,
}

impl Interruptor {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Raise the signal; every suspended operation observing it aborts
    pub fn pulse(&self) {
        self.token.cancel();
    }

    pub fn is_pulsed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with `Interrupted` if the signal has been raised
    pub fn check(&self) -> AdminResult<()> {
        if self.is_pulsed() {
            Err(AdminError::interrupted())
        } else {
            Ok(())
        }
    }

    /// Resolve once the signal is raised
    pub async fn pulsed(&self) {
        self.token.cancelled().await
    }

    /// Run `fut` unless the signal fires first
    pub async fn run<F, T>(&self, fut: F) -> AdminResult<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AdminError::interrupted()),
            out = fut => Ok(out),
        }
    }

    /// A child signal that fires when this one does, but can also fire alone
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}

/// Everything a verb needs besides its own parameters
#[derive(Clone, Debug)]
pub struct OperationContext {
    pub user: UserContext,
    pub interruptor: Interruptor,
}

impl OperationContext {
    pub fn new(user: UserContext, interruptor: Interruptor) -> Self {
        Self { user, interruptor }
    }

    /// Context for internal callers that bypass permission checks
    pub fn internal() -> Self {
        Self {
            user: UserContext::internal(),
            interruptor: Interruptor::new(),
        }
    }

    pub fn check_interrupted(&self) -> AdminResult<()> {
        self.interruptor.check()
    }
}
