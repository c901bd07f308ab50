//! Authenticated request path with single-flight token recovery.
//!
//! Outbound calls carry the current access token. When a call comes back
//! 401 the pipeline renews the token through the session authority and
//! replays the call once. Calls that hit 401 while a renewal is already in
//! flight wait for it instead of starting another one, so any number of
//! concurrent failures cost exactly one refresh grant. Once the renewal
//! lands, the queued calls replay one at a time in the order they queued,
//! and the call that triggered the renewal replays last.
//!
//! `refreshing` and the waiter queue live behind a synchronous mutex that
//! is never held across an await: checking and setting `refreshing` is one
//! uninterrupted step.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::{detail_messages, ApiError, SERVER_ERROR_NOTICE};
use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::auth::{AuthError, SessionAuthority};
use crate::hooks::Notifier;

/// Notice shown when reactive renewal fails and the session is dropped
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired, please log in again";

/// A request together with whether it has already been replayed after a 401.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub request: ApiRequest,
    pub retried: bool,
}

impl PipelineRequest {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// The one allowed replay of this request
    fn into_replay(self) -> Self {
        Self {
            request: self.request,
            retried: true,
        }
    }
}

/// A queued request's turn to replay. The leader hands it an ack sender and
/// waits for the ack before releasing the next turn.
type ReplayTurn = oneshot::Sender<oneshot::Sender<()>>;

#[derive(Default)]
struct RenewalState {
    refreshing: bool,
    // Released in enqueue order once the renewal settles
    pending: Vec<ReplayTurn>,
}

/// Held by the request performing a renewal. If that request is dropped
/// before the renewal settles, the flag is cleared and queued requests fail
/// instead of waiting forever.
struct RenewalLease<'a> {
    pipeline: &'a RequestPipeline,
    settled: bool,
}

impl RenewalLease<'_> {
    fn settle(mut self) -> ReplayQueue {
        self.settled = true;
        let mut state = self.pipeline.lock_state();
        state.refreshing = false;
        ReplayQueue(std::mem::take(&mut state.pending).into())
    }
}

impl Drop for RenewalLease<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.pipeline.lock_state();
        state.refreshing = false;
        let dropped = std::mem::take(&mut state.pending);
        warn!(queued = dropped.len(), "Renewal abandoned, failing queued requests");
    }
}

/// Queued requests still waiting for their replay turn.
///
/// Dropping the queue early releases the remaining turns without waiting
/// for their acks, so a renewal that succeeded is never reported as failed.
struct ReplayQueue(VecDeque<ReplayTurn>);

impl ReplayQueue {
    fn len(&self) -> usize {
        self.0.len()
    }

    /// Release each queued request in turn, waiting until its replay has
    /// gone out before releasing the next one.
    async fn drain(mut self) {
        while let Some(turn) = self.0.pop_front() {
            let (ack, replayed) = oneshot::channel();
            if turn.send(ack).is_ok() {
                // Err means the queued caller went away
                let _ = replayed.await;
            }
        }
    }

    /// Drop every turn, failing the queued requests.
    fn fail(mut self) {
        self.0.clear();
    }
}

impl Drop for ReplayQueue {
    fn drop(&mut self) {
        for turn in self.0.drain(..) {
            let (ack, _) = oneshot::channel();
            let _ = turn.send(ack);
        }
    }
}

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    authority: Arc<SessionAuthority>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<RenewalState>,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, authority: Arc<SessionAuthority>) -> Self {
        let notifier = authority.notifier();
        Self {
            transport,
            authority,
            notifier,
            state: Mutex::new(RenewalState::default()),
        }
    }

    pub fn authority(&self) -> &Arc<SessionAuthority> {
        &self.authority
    }

    fn lock_state(&self) -> MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The generic call contract used by the resource gateways.
    ///
    /// Empty bodies deserialize as JSON `null`, so `T = ()` works for
    /// endpoints that return nothing.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    /// Send a request, recovering from one expired-token 401.
    ///
    /// Requests queued behind a renewal replay in enqueue order, all before
    /// the request that triggered the renewal.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut call = PipelineRequest::new(request);
        let mut turn_done: Option<oneshot::Sender<()>> = None;
        loop {
            let token = self.authority.access_token();
            let sent = self.transport.send(&call.request, token.as_deref()).await;
            if let Some(ack) = turn_done.take() {
                let _ = ack.send(());
            }
            let response = sent?;

            if response.is_success() {
                return Ok(response);
            }

            if response.status == 401 && !call.retried {
                debug!(path = %call.request.path, "Got 401, recovering session");
                turn_done = self.recover().await?;
                call = call.into_replay();
                continue;
            }

            return Err(self.reject(&call, response));
        }
    }

    /// Wait for, or perform, the renewal that a 401 calls for.
    ///
    /// A queued request gets back the ack to fire once its replay is out.
    /// The request that performed the renewal gets `None` and only returns
    /// after every queued replay has gone out.
    async fn recover(&self) -> Result<Option<oneshot::Sender<()>>, ApiError> {
        let waiter = {
            let mut state = self.lock_state();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.pending.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("Renewal already in flight, queuing request");
            // A dropped turn means the renewal failed and the session is gone
            return rx
                .await
                .map(Some)
                .map_err(|_| ApiError::Auth(AuthError::SessionExpired));
        }

        let lease = RenewalLease {
            pipeline: self,
            settled: false,
        };
        let outcome = self.authority.renew().await;
        let queue = lease.settle();

        match outcome {
            Ok(_) => {
                info!(queued = queue.len(), "Session renewed, replaying requests");
                queue.drain().await;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, queued = queue.len(), "Renewal failed, dropping session");
                queue.fail();
                self.authority.logout(Some(SESSION_EXPIRED_NOTICE));
                Err(ApiError::Auth(e))
            }
        }
    }

    /// Report a failed response on the error channel and turn it into an error.
    fn reject(&self, call: &PipelineRequest, response: ApiResponse) -> ApiError {
        let status = response.status;
        warn!(
            path = %call.request.path,
            status,
            retried = call.retried,
            "Request failed"
        );

        match status {
            500..=599 => self.notifier.notify(SERVER_ERROR_NOTICE),
            400..=499 => {
                for message in detail_messages(&response.body) {
                    self.notifier.notify(&message);
                }
            }
            _ => {}
        }

        ApiError::from_status(status, &response.body)
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.lock_state().pending.len()
    }
}
