//! HTTP entry point for a SOAP web service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::http::request::{GET, POST};
use crate::http::response::CannedResponse;
use crate::http::server::{HttpTransaction, RequestServicer};
use crate::soap::dispatcher::SoapAsyncDispatcher;
use crate::soap::message::{SoapFault, SoapMessage};
use crate::soap::service::SoapWebService;
use crate::transform::gzip;

pub const INVALID_ACTION: &str = "Soap action is invalid.";
pub const NO_VALID_MESSAGE: &str = "No valid soap message found.";

/// Serves a [`SoapWebService`]: its description on GET, method calls on POST.
pub struct SoapHttpServicer {
    service: Arc<dyn SoapWebService>,
    dispatcher: SoapAsyncDispatcher,
}

impl SoapHttpServicer {
    pub fn new(service: Arc<dyn SoapWebService>, continue_interval: Duration) -> Self {
        Self {
            dispatcher: SoapAsyncDispatcher::new(Arc::clone(&service), continue_interval),
            service,
        }
    }

    async fn service_get(&self, transaction: &mut HttpTransaction<'_>) {
        if transaction.request.path != self.service.wsdl_path() {
            send_canned(transaction, CannedResponse::NotFound).await;
            return;
        }
        let wsdl = match self.service.wsdl() {
            Ok(wsdl) => wsdl,
            Err(e) => {
                tracing::debug!(error = %e, "Service description unavailable");
                send_canned(transaction, CannedResponse::NotFound).await;
                return;
            }
        };

        let mut body = wsdl.into_bytes();
        if transaction.response.fields.content_encoding_contains("gzip") {
            match gzip::encode(&body) {
                Ok(packed) => body = packed,
                Err(e) => {
                    tracing::debug!(error = %e, "gzip failed, sending identity body");
                    transaction.response.fields.set_content_encoding(None);
                }
            }
        }
        transaction.response.set_status(200);
        transaction
            .response
            .fields
            .set_content_type("text/xml; charset=utf-8");
        if let Err(e) = transaction.send_response(body).await {
            tracing::debug!(error = %e, "Could not send service description");
        }
    }

    async fn service_post(&self, transaction: &mut HttpTransaction<'_>) {
        if transaction.request.media_type().as_deref() != Some("text/xml") {
            send_canned(transaction, CannedResponse::BadRequest).await;
            return;
        }

        let mut message = if transaction.request.expects_continue() {
            let action = transaction.request.soap_action().unwrap_or_default();
            if self.service.is_soap_action_valid(&action) {
                if let Err(e) = transaction.send_continue().await {
                    tracing::debug!(error = %e, "Could not send 100 Continue");
                    return;
                }
                self.read_message(transaction).await
            } else {
                tracing::debug!(action = %action, "Rejecting invalid SOAP action");
                SoapMessage::from_fault(SoapFault::client(INVALID_ACTION, self.service.uri()))
            }
        } else {
            self.read_message(transaction).await
        };
        message.client_ip = Some(transaction.remote_ip());

        let report = self.dispatcher.dispatch(transaction, message).await;
        tracing::debug!(
            remote_addr = %transaction.remote_addr(),
            state = ?report.state,
            keepalives = report.keepalives_sent,
            "SOAP request finished"
        );
    }

    /// The request body as a message, or a client fault when it is not one.
    async fn read_message(&self, transaction: &mut HttpTransaction<'_>) -> SoapMessage {
        let parsed = match transaction.receive_body_string().await {
            Ok(xml) => SoapMessage::parse(&xml).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        parsed.unwrap_or_else(|reason| {
            tracing::debug!(reason = %reason, "No valid SOAP message found, sending fault");
            SoapMessage::from_fault(SoapFault::client(NO_VALID_MESSAGE, self.service.uri()))
        })
    }
}

async fn send_canned(transaction: &mut HttpTransaction<'_>, canned: CannedResponse) {
    if let Err(e) = transaction.send_canned(canned).await {
        tracing::debug!(status = canned.status(), error = %e, "Could not send response");
    }
}

#[async_trait]
impl RequestServicer for SoapHttpServicer {
    async fn service(&self, transaction: &mut HttpTransaction<'_>) {
        // Responses depend on the whole request, not just the URL.
        if let Err(e) = transaction.response.fields.set("Vary", "*") {
            tracing::debug!(error = %e, "Could not set Vary");
        }
        if transaction.request.fields.accepts_encoding("gzip") {
            transaction
                .response
                .fields
                .set_content_encoding(Some("gzip".to_string()));
        }

        if transaction.request.is_method(GET) {
            self.service_get(transaction).await;
        } else if transaction.request.is_method(POST) {
            self.service_post(transaction).await;
        } else {
            send_canned(transaction, CannedResponse::MethodNotAllowed).await;
        }
    }
}
