// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Synchronization
//!
//! Keeps a [`SessionGate`] in step with an [`IdentityClient`].
//!
//! ## Lifecycle
//!
//! 1. Subscribe to the client's change stream.
//! 2. Resolve the current session once and apply it as `INITIAL_SESSION`.
//! 3. Apply every later change in emission order on a background task.
//!
//! Subscribing before the initial query means no change can slip between the
//! two steps.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. [`SessionSync::stop`] cancels
//! and joins the task, so the gate is never touched after it returns.
//! Dropping the handle cancels without waiting.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::gate::SessionGate;
use crate::identity::{AuthChange, AuthEvent, IdentityClient};

pub struct SessionSync {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionSync {
    /// Resolve the initial session and start following changes.
    pub async fn start(client: Arc<IdentityClient>, gate: Arc<SessionGate>) -> Self {
        let mut subscription = client.subscribe();

        let initial = client.get_session().await;
        info!(
            authenticated = initial.is_some(),
            "Initial session resolved"
        );
        gate.apply_auth_change(&AuthChange::new(AuthEvent::InitialSession, initial));

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    change = subscription.recv() => match change {
                        Some(change) => gate.apply_auth_change(&change),
                        None => break,
                    },
                }
            }
            subscription.unsubscribe();
            debug!("Session sync stopped");
        });

        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Unsubscribe and wait for the background task to finish.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionSync {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
