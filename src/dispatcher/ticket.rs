//! Handles to in-flight requests

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::transport::{RawResponse, TransportError};
use super::DispatchError;
use crate::shutdown::ShutdownCoordinator;

/// Final outcome of a submitted request
pub type TicketOutcome = Result<RawResponse, TransportError>;

/// Handle to one submitted request.
///
/// The request runs on the worker pool whether or not anyone waits on the
/// ticket. Waiting is idempotent: every call to [`RequestTicket::wait`], on
/// this ticket or any clone of it, yields the same outcome.
#[derive(Clone)]
pub struct RequestTicket {
    id: u64,
    url: Arc<str>,
    outcome: Shared<BoxFuture<'static, TicketOutcome>>,
}

impl RequestTicket {
    pub(crate) fn new(id: u64, url: impl Into<Arc<str>>, handle: JoinHandle<TicketOutcome>) -> Self {
        let outcome = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(TransportError::Worker(e.to_string())),
            }
        }
        .boxed()
        .shared();

        Self {
            id,
            url: url.into(),
            outcome,
        }
    }

    /// Sequence number assigned at admission
    pub fn id(&self) -> u64 {
        self.id
    }

    /// URL this ticket was submitted for
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the request to resolve
    pub async fn wait(&self) -> TicketOutcome {
        self.outcome.clone().await
    }

    /// Wait for the request, giving up if shutdown is requested first
    ///
    /// # Errors
    /// [`DispatchError::Cancelled`] if shutdown wins the race; the request
    /// itself keeps running and its result goes unobserved
    pub async fn wait_or_cancel(
        &self,
        shutdown: Option<&ShutdownCoordinator>,
    ) -> Result<TicketOutcome, DispatchError> {
        match shutdown {
            Some(shutdown) => tokio::select! {
                outcome = self.wait() => Ok(outcome),
                _ = shutdown.wait_for_shutdown() => Err(DispatchError::Cancelled),
            },
            None => Ok(self.wait().await),
        }
    }

    /// Outcome if a previous wait already observed it
    pub fn peek(&self) -> Option<TicketOutcome> {
        self.outcome.peek().cloned()
    }
}

impl std::fmt::Debug for RequestTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTicket")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("resolved", &self.peek().is_some())
            .finish()
    }
}
