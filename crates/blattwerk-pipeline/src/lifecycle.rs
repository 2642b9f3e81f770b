// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-request state machine:
//
//   Received → Validated → Transformed → (Compressed) → Delivered
//
// Any non-terminal state may move to Failed. Delivered and Failed are
// terminal.

use std::fmt;

use blattwerk_core::error::BlattwerkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Validated,
    Transformed,
    Compressed,
    Delivered,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    /// Whether the state machine allows `self → next`.
    pub fn can_advance_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (Received, Validated) => true,
            (Validated, Transformed) => true,
            (Transformed, Compressed | Delivered) => true,
            (Compressed, Delivered) => true,
            (state, Failed) => !state.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Transformed => "transformed",
            Self::Compressed => "compressed",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cannot move from {from} to {to}")]
pub struct IllegalTransition {
    pub from: RequestState,
    pub to: RequestState,
}

/// Tracks one request through the pipeline.
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    request_id: Uuid,
    operation: &'static str,
    state: RequestState,
}

impl RequestLifecycle {
    pub fn new(operation: &'static str) -> Self {
        Self::with_id(Uuid::new_v4(), operation)
    }

    pub fn with_id(request_id: Uuid, operation: &'static str) -> Self {
        debug!(%request_id, operation, "Request received");
        Self {
            request_id,
            operation,
            state: RequestState::Received,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn advance(&mut self, next: RequestState) -> Result<(), IllegalTransition> {
        if !self.state.can_advance_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(
            request_id = %self.request_id,
            operation = self.operation,
            from = %self.state,
            to = %next,
            "Request state changed"
        );
        self.state = next;
        Ok(())
    }

    /// Record `error` and move to Failed. A request that already finished
    /// keeps its terminal state.
    pub fn fail(&mut self, error: &BlattwerkError) {
        warn!(
            request_id = %self.request_id,
            operation = self.operation,
            stage = %self.state,
            kind = ?error.kind(),
            %error,
            "Request failed"
        );
        if !self.state.is_terminal() {
            self.state = RequestState::Failed;
        }
    }
}
