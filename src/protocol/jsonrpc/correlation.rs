// Copyright (c) 2025 MCP Link Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! JSON-RPC 2.0 request/response correlation.
//!
//! The [`CorrelationTable`] tracks every request that is waiting for a response.
//! Each entry owns the sending half of a oneshot channel; the caller holds the
//! receiving half inside a [`PendingRequest`].
//!
//! An entry is completed by exactly one of [`resolve`](CorrelationTable::resolve),
//! [`expire`](CorrelationTable::expire), [`cancel_local`](CorrelationTable::cancel_local)
//! or [`fail_all`](CorrelationTable::fail_all): whichever removes it from the map
//! under the lock. The lock is only held for map operations, never while a
//! completion is delivered and never across an `.await`.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::error::JsonRpcError;
use super::methods::ClientMethod;
use crate::error::{McpError, McpResult, TransportError};

/// Value delivered to the caller waiting on a request.
pub type Completion = McpResult<Value>;

#[derive(Debug)]
struct PendingEntry {
    method: ClientMethod,
    /// Identifies the `PendingRequest` that owns the receiver.
    token: u64,
    registered_at: Instant,
    completion: oneshot::Sender<Completion>,
}

#[derive(Debug, Default)]
struct TableState {
    pending: HashMap<i64, PendingEntry>,
    closed: bool,
}

#[derive(Debug)]
struct TableInner {
    state: Mutex<TableState>,
    next_id: AtomicI64,
    next_token: AtomicU64,
}

/// Registry of outstanding requests keyed by numeric id.
///
/// Cloning is cheap; all clones share the same table.
#[derive(Debug, Clone)]
pub struct CorrelationTable {
    inner: Arc<TableInner>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    /// Creates an empty table whose id counter starts at 1.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TableInner {
                state: Mutex::new(TableState::default()),
                next_id: AtomicI64::new(1),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the next request id.
    ///
    /// Ids strictly increase. An id that is still pending (registered explicitly by
    /// a caller) is skipped.
    pub fn allocate_id(&self) -> i64 {
        loop {
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            if !self.contains(id) {
                return id;
            }
        }
    }

    /// Registers a pending request that must complete before `deadline`.
    ///
    /// Fails with [`McpError::DuplicateId`] if `id` is still pending, and with a
    /// closed transport error once [`fail_all`](Self::fail_all) has run.
    pub fn register(
        &self,
        id: i64,
        method: ClientMethod,
        deadline: Instant,
    ) -> McpResult<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(TransportError::Closed.into());
            }
            if state.pending.contains_key(&id) {
                return Err(McpError::DuplicateId(id));
            }
            state.pending.insert(
                id,
                PendingEntry {
                    method,
                    token,
                    registered_at: Instant::now(),
                    completion: tx,
                },
            );
        }

        trace!(request_id = id, method = %method, "Registered pending request");

        Ok(PendingRequest {
            id,
            method,
            deadline,
            token,
            receiver: rx,
            table: self.clone(),
        })
    }

    /// Completes a pending request with the outcome carried by a response.
    ///
    /// Error objects are delivered as [`McpError::Remote`]. Returns `false` when no
    /// request with that id is pending, e.g. a late response after a timeout.
    pub fn resolve(&self, id: i64, outcome: Result<Value, JsonRpcError>) -> bool {
        let completion = outcome.map_err(McpError::Remote);
        self.complete(id, "resolved", move |_| completion)
    }

    /// Completes a pending request with [`McpError::Timeout`].
    ///
    /// The reported duration is the time elapsed since registration.
    pub fn expire(&self, id: i64) -> bool {
        self.complete(id, "expired", |entry| {
            Err(McpError::Timeout {
                id,
                after_ms: entry.registered_at.elapsed().as_millis() as u64,
            })
        })
    }

    /// Completes a pending request with [`McpError::Cancelled`].
    pub fn cancel_local(&self, id: i64, reason: Option<String>) -> bool {
        self.complete(id, "cancelled", move |_| Err(McpError::Cancelled { id, reason }))
    }

    /// Closes the table and fails every pending request with a disconnect error.
    ///
    /// Later registrations are rejected. Returns the number of requests failed.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<(i64, PendingEntry)> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.pending.drain().collect()
        };

        let count = drained.len();
        for (id, entry) in drained {
            debug!(request_id = id, method = %entry.method, reason, "Failing pending request");
            let _ = entry
                .completion
                .send(Err(TransportError::Disconnected(reason.to_string()).into()));
        }
        count
    }

    /// Returns true if a request with `id` is pending.
    pub fn contains(&self, id: i64) -> bool {
        self.inner.state.lock().pending.contains_key(&id)
    }

    /// Returns the method of a pending request.
    pub fn method_of(&self, id: i64) -> Option<ClientMethod> {
        self.inner.state.lock().pending.get(&id).map(|entry| entry.method)
    }

    /// Returns the number of pending requests.
    pub fn len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Returns true if no request is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the ids of all pending requests in ascending order.
    pub fn pending_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.inner.state.lock().pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns true once the table has been closed by [`fail_all`](Self::fail_all).
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    fn complete<F>(&self, id: i64, outcome: &'static str, build: F) -> bool
    where
        F: FnOnce(&PendingEntry) -> Completion,
    {
        let entry = self.inner.state.lock().pending.remove(&id);

        match entry {
            Some(entry) => {
                debug!(request_id = id, method = %entry.method, outcome, "Pending request completed");
                let completion = build(&entry);
                // The caller may already have given up on the request
                let _ = entry.completion.send(completion);
                true
            }
            None => {
                trace!(request_id = id, outcome, "No pending request for id");
                false
            }
        }
    }

    /// Removes an entry without completing it, if it still belongs to `token`.
    fn discard(&self, id: i64, token: u64) {
        let mut state = self.inner.state.lock();
        if state.pending.get(&id).is_some_and(|entry| entry.token == token) {
            state.pending.remove(&id);
            trace!(request_id = id, "Discarded abandoned request");
        }
    }
}

/// The caller's side of one outstanding request.
///
/// Dropping it before completion removes the entry from the table.
#[derive(Debug)]
pub struct PendingRequest {
    id: i64,
    method: ClientMethod,
    deadline: Instant,
    token: u64,
    receiver: oneshot::Receiver<Completion>,
    table: CorrelationTable,
}

impl PendingRequest {
    /// Returns the request id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns the method of the request.
    pub fn method(&self) -> ClientMethod {
        self.method
    }

    /// Returns the instant after which the request is considered timed out.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Waits for the request to complete.
    ///
    /// Can be called again after the returned future was dropped, which is how a
    /// caller picks up the outcome after racing it against a deadline.
    pub async fn wait(&mut self) -> Completion {
        match (&mut self.receiver).await {
            Ok(completion) => completion,
            Err(_) => Err(TransportError::Closed.into()),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.table.discard(self.id, self.token);
    }
}
