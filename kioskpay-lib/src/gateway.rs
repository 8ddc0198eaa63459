//! Request dispatch with reply correlation.
//!
//! Every request sent through the gateway is registered in
//! [`RequestContexts`] for as long as it is in flight. A reply is only
//! handed back to the caller if its context is still registered when it
//! arrives; replies whose context was cancelled (a poll for a payment that
//! stopped being tracked) are dropped here.

use serde_json::Value;
use std::sync::Arc;

use crate::mapper;
use crate::request::{ApiRequest, PaymentRequestBuilder};
use crate::tracker::{ContextToken, RequestContext, RequestContexts};
use crate::transport::{ApiResponse, HttpTransport};
use crate::{KioskPayError, Result};

pub(crate) struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
    builder: PaymentRequestBuilder,
    contexts: RequestContexts,
}

/// Unregisters its context if the request future is dropped mid-flight.
struct InFlight<'a> {
    contexts: &'a RequestContexts,
    token: ContextToken,
}

impl InFlight<'_> {
    fn complete(&self) -> Option<RequestContext> {
        self.contexts.consume(self.token)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.contexts.consume(self.token);
    }
}

impl ApiGateway {
    pub(crate) fn new(transport: Arc<dyn HttpTransport>, builder: PaymentRequestBuilder) -> Self {
        Self {
            transport,
            builder,
            contexts: RequestContexts::default(),
        }
    }

    pub(crate) fn builder(&self) -> &PaymentRequestBuilder {
        &self.builder
    }

    pub(crate) fn contexts(&self) -> &RequestContexts {
        &self.contexts
    }

    /// Send a request and return its successful reply.
    ///
    /// `Ok(None)` means the reply arrived after its context was cancelled
    /// and was discarded.
    pub(crate) async fn send(
        &self,
        request: ApiRequest,
        context: RequestContext,
    ) -> Result<Option<ApiResponse>> {
        let in_flight = InFlight {
            contexts: &self.contexts,
            token: self.contexts.issue(context),
        };

        let outcome = self.transport.send(request).await;

        let Some(context) = in_flight.complete() else {
            tracing::debug!(token = ?in_flight.token, "discarding reply with no request context");
            return Ok(None);
        };

        let response = outcome?;
        if !response.is_success() {
            let err = error_from_response(&response);
            tracing::debug!(kind = ?context.kind, status = response.status, "provider rejected request");
            return Err(err);
        }
        Ok(Some(response))
    }

    /// Like [`send`](Self::send), parsing the reply as a JSON object.
    pub(crate) async fn send_json(
        &self,
        request: ApiRequest,
        context: RequestContext,
    ) -> Result<Option<Value>> {
        match self.send(request, context).await? {
            Some(response) => Ok(Some(Value::Object(mapper::parse_object(&response.body)?))),
            None => Ok(None),
        }
    }
}

/// Turn a non-2xx reply into a transport error, preferring the provider's message.
fn error_from_response(response: &ApiResponse) -> KioskPayError {
    let from_json = serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        });

    let message = from_json.unwrap_or_else(|| {
        let text = response.text();
        let text = text.trim();
        if text.is_empty() {
            format!("HTTP {}", response.status)
        } else {
            text.to_string()
        }
    });

    KioskPayError::transport(response.status, message)
}
