// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Coarse progress of one session-creation attempt, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Resolving,
    SdkLoading,
    SdkLoaded,
    SdkInitializing,
    SdkInitialized,
    Creating,
    Ready,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Resolving => "resolving",
            SessionStatus::SdkLoading => "sdk-loading",
            SessionStatus::SdkLoaded => "sdk-loaded",
            SessionStatus::SdkInitializing => "sdk-initializing",
            SessionStatus::SdkInitialized => "sdk-initialized",
            SessionStatus::Creating => "creating",
            SessionStatus::Ready => "ready",
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type StatusCallback = Arc<dyn Fn(SessionStatus) + Send + Sync>;

/// Synchronous observer of `SessionStatus` transitions
///
/// Each status is delivered at most once, and never after a later status:
/// an out-of-order or repeated `notify` is dropped. Use one notifier per
/// session-creation attempt; clones share the emitted set.
#[derive(Clone, Default)]
pub struct StatusNotifier {
    callback: Option<StatusCallback>,
    emitted: Arc<AtomicU8>,
}

impl StatusNotifier {
    pub fn new(callback: impl Fn(SessionStatus) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            emitted: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Notifier that records nothing
    pub fn silent() -> Self {
        Self::default()
    }

    /// Notifier forwarding into an unbounded channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self::new(move |status| {
            let _ = tx.send(status);
        });
        (notifier, rx)
    }

    /// Emit `status`; returns false when it was dropped as repeated or out of order
    pub fn notify(&self, status: SessionStatus) -> bool {
        let bit = status.bit();
        // Any bit >= ours already set means this status (or a later one) went out
        let accepted = self
            .emitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |mask| {
                if mask >= bit {
                    None
                } else {
                    Some(mask | bit)
                }
            })
            .is_ok();

        if accepted {
            tracing::debug!("Session status: {}", status);
            if let Some(callback) = &self.callback {
                callback(status);
            }
        }
        accepted
    }
}

impl fmt::Debug for StatusNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusNotifier")
            .field("has_callback", &self.callback.is_some())
            .field("emitted", &self.emitted.load(Ordering::SeqCst))
            .finish()
    }
}
