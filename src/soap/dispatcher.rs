//! Asynchronous SOAP method dispatch with connection keep-alive.
//!
//! # Responsibilities
//! - Run the service method as its own task
//! - Emit one interim `100 Continue` per continue interval while it runs
//! - Cancel the method and give up on the response if the client goes away
//! - Send the final result or fault, gzip-encoded when negotiated
//!
//! # Design Decisions
//! - The method task owns its inputs; the message is only updated after
//!   the task has been joined
//! - A lost connection cancels the task's token and detaches the task;
//!   services that ignore the token run to completion
//! - Method errors are logged in full and reported as a generic fault

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::http::exchange::ExchangeError;
use crate::http::server::HttpTransaction;
use crate::observability::metrics;
use crate::soap::message::{SoapFault, SoapMessage, SoapPayload};
use crate::soap::service::{SoapCall, SoapWebService};
use crate::soap::servicer::NO_VALID_MESSAGE;
use crate::transform::gzip;

/// Default interval between keep-alives.
pub const CONTINUE_TIME: Duration = Duration::from_millis(20_000);

/// Fault string for any failure inside a service method.
pub const INVOCATION_FAILED: &str =
    "An exception was thrown by the server when calling the specified soap method.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Invoking,
    Completed,
    Faulted,
    Responded,
    /// The connection was lost before the response could be sent.
    Abandoned,
}

/// What happened to one dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub state: DispatchState,
    pub keepalives_sent: u32,
}

pub struct SoapAsyncDispatcher {
    service: Arc<dyn SoapWebService>,
    continue_interval: Duration,
}

impl SoapAsyncDispatcher {
    pub fn new(service: Arc<dyn SoapWebService>, continue_interval: Duration) -> Self {
        Self {
            service,
            continue_interval,
        }
    }

    /// Invoke the message's method (unless it already carries a fault) and
    /// answer on `transaction`.
    pub async fn dispatch(
        &self,
        transaction: &mut HttpTransaction<'_>,
        mut message: SoapMessage,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            state: DispatchState::Received,
            keepalives_sent: 0,
        };

        if message.is_fault() {
            report.state = DispatchState::Faulted;
        } else if let Some(method) = message.call.clone() {
            report.state = DispatchState::Invoking;
            let call = SoapCall {
                method,
                client_ip: message.client_ip,
            };
            match self.invoke(transaction, call, &mut report).await {
                Some(outcome) => {
                    report.state = self.settle(&mut message, outcome);
                }
                None => {
                    report.state = DispatchState::Abandoned;
                    metrics::record_invocation("abandoned");
                    return report;
                }
            }
        } else {
            message.fault = Some(SoapFault::client(NO_VALID_MESSAGE, self.service.uri()));
            report.state = DispatchState::Faulted;
        }

        match respond(transaction, &message).await {
            Ok(()) => report.state = DispatchState::Responded,
            Err(e) => {
                tracing::debug!(
                    remote_addr = %transaction.remote_addr(),
                    error = %e,
                    "Could not send SOAP response"
                );
                report.state = DispatchState::Abandoned;
            }
        }
        report
    }

    /// Run the method while keeping the connection alive. `None` when the
    /// connection was lost first.
    async fn invoke(
        &self,
        transaction: &mut HttpTransaction<'_>,
        call: SoapCall,
        report: &mut DispatchReport,
    ) -> Option<Result<SoapPayload, InvocationFailure>> {
        let method = call.method.name.clone();
        let cancel = CancellationToken::new();
        let service = Arc::clone(&self.service);
        let token = cancel.clone();
        let mut task = tokio::spawn(async move { service.call(call, token).await });

        let mut keepalive = tokio::time::interval_at(
            Instant::now() + self.continue_interval,
            self.continue_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let joined = loop {
            tokio::select! {
                biased;
                joined = &mut task => break joined,
                _ = keepalive.tick() => {
                    if let Err(e) = transaction.send_continue().await {
                        tracing::info!(
                            remote_addr = %transaction.remote_addr(),
                            method = %method,
                            error = %e,
                            "Connection lost during SOAP call, cancelling it"
                        );
                        cancel.cancel();
                        return None;
                    }
                    report.keepalives_sent += 1;
                    metrics::record_keepalive();
                    tracing::trace!(method = %method, sent = report.keepalives_sent, "Keep-alive sent");
                }
            }
        };

        Some(match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(InvocationFailure {
                method,
                detail: e.to_string(),
            }),
            Err(e) => Err(InvocationFailure {
                method,
                detail: format!("task failed: {e}"),
            }),
        })
    }

    fn settle(
        &self,
        message: &mut SoapMessage,
        outcome: Result<SoapPayload, InvocationFailure>,
    ) -> DispatchState {
        match outcome {
            Ok(result) => {
                message.result = Some(result);
                metrics::record_invocation("completed");
                DispatchState::Completed
            }
            Err(failure) => {
                tracing::warn!(
                    method = %failure.method,
                    error = %failure.detail,
                    "SOAP method failed, sending server fault"
                );
                message.fault = Some(SoapFault::server(INVOCATION_FAILED, self.service.uri()));
                metrics::record_invocation("faulted");
                DispatchState::Faulted
            }
        }
    }
}

struct InvocationFailure {
    method: String,
    detail: String,
}

/// Serialize `message` as the final `200 OK` response.
async fn respond(
    transaction: &mut HttpTransaction<'_>,
    message: &SoapMessage,
) -> Result<(), ExchangeError> {
    let mut body = message.to_xml().into_bytes();
    if transaction.response.fields.content_encoding_contains("gzip") {
        match gzip::encode(&body) {
            Ok(packed) => body = packed,
            Err(e) => {
                tracing::warn!(error = %e, "gzip failed, sending identity body");
                transaction.response.fields.set_content_encoding(None);
            }
        }
    }
    transaction.response.set_status(200);
    transaction
        .response
        .fields
        .set_content_type("text/xml; charset=utf-8");
    transaction.send_response(body).await
}
