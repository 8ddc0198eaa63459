//! The merchant-facing client.
//!
//! Every public operation both returns its result and pushes a
//! [`PaymentEvent`] (success or [`PaymentEvent::Error`]) to the event
//! stream, so hosts can either await calls or react to events.
//!
//! # Example
//!
//! ```rust,ignore
//! use kioskpay_lib::{Amount, ClientConfig, Jurisdiction, PaymentClient, PaymentDetails};
//!
//! let config = ClientConfig::new("sk_live_...", "merchant_42", Jurisdiction::Singapore);
//! let (client, mut events) = PaymentClient::connect(config)?;
//!
//! let details = PaymentDetails::builder(Amount::from_units(25), "SGD", "USDT")
//!     .description("Kiosk top-up")
//!     .build()?;
//! let payment = client.create_payment(&details).await?;
//! println!("pay to {}", payment.address);
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use serde_json::Value;
use std::sync::Arc;

use crate::compliance::{ComplianceOutcome, ComplianceRule};
use crate::config::ClientConfig;
use crate::events::{self, EventSink, PaymentEvent, PaymentEvents};
use crate::gateway::ApiGateway;
use crate::mapper;
use crate::models::{ExchangeRates, Payment, PaymentDetails, PaymentFilters, PaymentList};
use crate::request::{ApiRequest, PaymentRequestBuilder, SignedRequest};
use crate::tracker::{PaymentLifecycleTracker, RequestContext, RequestKind};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::webhook::WebhookProcessor;
use crate::{KioskPayError, Result};

/// Entry point of the SDK. Owns the tracker, the webhook processor and the
/// transport.
pub struct PaymentClient {
    config: ClientConfig,
    gateway: Arc<ApiGateway>,
    tracker: PaymentLifecycleTracker,
    webhooks: WebhookProcessor,
    events: EventSink,
}

impl PaymentClient {
    /// Build a client over any transport. Returns the client and the
    /// receiving end of its event stream.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<(Self, PaymentEvents)> {
        config.validate()?;

        let (sink, receiver) = events::channel();
        let gateway = Arc::new(ApiGateway::new(
            transport,
            PaymentRequestBuilder::new(&config),
        ));
        let tracker =
            PaymentLifecycleTracker::new(gateway.clone(), sink.clone(), config.poll_interval());
        let webhooks = WebhookProcessor::new(
            config.webhook_secret().map(str::to_string),
            tracker.clone(),
            sink.clone(),
        );

        tracing::debug!(
            merchant_id = %config.merchant_id,
            country = config.jurisdiction.code(),
            test_mode = config.test_mode,
            "payment client ready"
        );

        Ok((
            Self {
                config,
                gateway,
                tracker,
                webhooks,
                events: sink,
            },
            receiver,
        ))
    }

    /// Build a client talking HTTP to the configured endpoint.
    ///
    /// Requires the `http-executor` feature for requests to succeed.
    pub fn connect(config: ClientConfig) -> Result<(Self, PaymentEvents)> {
        let transport = ReqwestTransport::from_config(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The KYC rule of the configured jurisdiction.
    pub fn compliance_rule(&self) -> ComplianceRule {
        self.config.jurisdiction.rule()
    }

    pub fn tracker(&self) -> &PaymentLifecycleTracker {
        &self.tracker
    }

    pub fn webhooks(&self) -> &WebhookProcessor {
        &self.webhooks
    }

    fn builder(&self) -> &PaymentRequestBuilder {
        self.gateway.builder()
    }

    /// Emit the outcome of an operation and hand it back.
    fn report<T>(&self, result: Result<T>, on_ok: impl FnOnce(&T) -> PaymentEvent) -> Result<T> {
        match &result {
            Ok(value) => self.events.emit(on_ok(value)),
            Err(err) => {
                tracing::debug!(error = %err, "operation failed");
                self.events.error(err);
            }
        }
        result
    }

    async fn dispatch_json(&self, request: ApiRequest, context: RequestContext) -> Result<Value> {
        self.gateway
            .send_json(request, context)
            .await?
            .ok_or_else(|| KioskPayError::Internal("reply discarded without a request context".into()))
    }

    // ========================================================================
    // Local checks
    // ========================================================================

    /// Validate payment details against the supported set and the KYC rule
    /// without contacting the provider.
    pub fn check_payment(&self, details: &PaymentDetails) -> Result<ComplianceOutcome> {
        self.builder().check(details)
    }

    /// Build the signed creation request without sending it.
    pub fn prepare_payment(&self, details: &PaymentDetails) -> Result<SignedRequest> {
        self.builder().build(details)
    }

    // ========================================================================
    // Provider operations
    // ========================================================================

    /// Create a payment. A non-terminal result is tracked until it settles.
    pub async fn create_payment(&self, details: &PaymentDetails) -> Result<Payment> {
        let result = self.try_create_payment(details).await;
        self.report(result, |p| PaymentEvent::PaymentCreated(p.clone()))
    }

    async fn try_create_payment(&self, details: &PaymentDetails) -> Result<Payment> {
        let signed = self.builder().build(details)?;
        if signed.compliance.travel_rule_applies {
            tracing::info!("payment requires travel rule information");
        }

        let value = self
            .dispatch_json(signed.request, RequestContext::new(RequestKind::CreatePayment))
            .await?;
        let payment = mapper::payment_from_wire(&value);

        if payment.id.is_empty() {
            tracing::warn!("provider returned a payment without an id; not tracking");
        } else {
            self.tracker.track(&payment);
        }
        Ok(payment)
    }

    /// Fetch one payment. Refreshes the tracked snapshot if it is tracked.
    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment> {
        let result = self.try_get_payment(payment_id).await;
        self.report(result, |p| PaymentEvent::PaymentRetrieved(p.clone()))
    }

    async fn try_get_payment(&self, payment_id: &str) -> Result<Payment> {
        let request = self.builder().get_payment(payment_id)?;
        let value = self
            .dispatch_json(
                request,
                RequestContext::for_payment(RequestKind::GetPayment, payment_id.trim()),
            )
            .await?;
        let payment = mapper::payment_from_wire(&value);
        self.tracker.apply(&payment);
        Ok(payment)
    }

    /// List payments matching `filters`.
    pub async fn list_payments(&self, filters: &PaymentFilters) -> Result<PaymentList> {
        let result = self.try_list_payments(filters).await;
        self.report(result, |list| PaymentEvent::PaymentsRetrieved {
            payments: list.payments.clone(),
            total: list.total,
        })
    }

    async fn try_list_payments(&self, filters: &PaymentFilters) -> Result<PaymentList> {
        let request = self.builder().list_payments(filters);
        let value = self
            .dispatch_json(request, RequestContext::new(RequestKind::ListPayments))
            .await?;
        Ok(mapper::payment_list_from_wire(&value))
    }

    /// Cancel a payment and stop tracking it.
    pub async fn cancel_payment(&self, payment_id: &str) -> Result<Payment> {
        let result = self.try_cancel_payment(payment_id).await;
        self.report(result, |p| PaymentEvent::PaymentCancelled(p.clone()))
    }

    async fn try_cancel_payment(&self, payment_id: &str) -> Result<Payment> {
        let request = self.builder().cancel_payment(payment_id)?;
        let id = payment_id.trim();
        let value = self
            .dispatch_json(
                request,
                RequestContext::for_payment(RequestKind::CancelPayment, id),
            )
            .await?;
        let payment = mapper::payment_from_wire(&value);

        self.tracker.apply(&payment);
        self.tracker.stop(id);
        if !payment.id.is_empty() && payment.id != id {
            self.tracker.stop(&payment.id);
        }
        Ok(payment)
    }

    /// Crypto rates in `base_currency`. An empty `currencies` asks for the
    /// supported set.
    pub async fn exchange_rates(
        &self,
        base_currency: &str,
        currencies: &[String],
    ) -> Result<ExchangeRates> {
        let result = self.try_exchange_rates(base_currency, currencies).await;
        self.report(result, |rates| PaymentEvent::ExchangeRatesRetrieved {
            base_currency: rates.base_currency.clone(),
            rates: rates.rates.clone(),
        })
    }

    async fn try_exchange_rates(
        &self,
        base_currency: &str,
        currencies: &[String],
    ) -> Result<ExchangeRates> {
        let request = self.builder().exchange_rates(base_currency, currencies)?;
        let value = self
            .dispatch_json(request, RequestContext::new(RequestKind::ExchangeRates))
            .await?;
        let mut rates = mapper::exchange_rates_from_wire(&value);
        if rates.base_currency.is_empty() {
            rates.base_currency = base_currency.trim().to_string();
        }
        Ok(rates)
    }

    /// Download the raw QR code image at `url`. No decoding or rendering.
    pub async fn download_qr_code(&self, url: &str) -> Result<Vec<u8>> {
        let result = self.try_download_qr_code(url).await;
        let url = url.trim().to_string();
        self.report(result, move |bytes| PaymentEvent::QrCodeDownloaded {
            url,
            bytes: bytes.clone(),
        })
    }

    async fn try_download_qr_code(&self, url: &str) -> Result<Vec<u8>> {
        let request = self.builder().qr_code(url)?;
        let response = self
            .gateway
            .send(request, RequestContext::new(RequestKind::DownloadQrCode))
            .await?
            .ok_or_else(|| KioskPayError::Internal("reply discarded without a request context".into()))?;
        Ok(response.body)
    }

    // ========================================================================
    // Webhooks and tracking
    // ========================================================================

    /// Verify and dispatch a webhook delivery. See [`WebhookProcessor::process`].
    pub fn process_webhook_event(&self, raw_body: &str, signature: &str) -> bool {
        self.webhooks.process(raw_body, signature)
    }

    /// Check a webhook signature without dispatching.
    pub fn verify_webhook_signature(&self, signature: &str, raw_body: &str) -> bool {
        self.webhooks.verify_signature(signature, raw_body)
    }

    /// Stop polling a payment. No-op when it is not tracked.
    pub fn stop_tracking(&self, payment_id: &str) -> bool {
        self.tracker.stop(payment_id)
    }

    pub fn is_tracking(&self, payment_id: &str) -> bool {
        self.tracker.is_tracking(payment_id)
    }
}

impl Drop for PaymentClient {
    fn drop(&mut self) {
        self.tracker.stop_all();
    }
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::Jurisdiction;
    use crate::config::WebhookConfig;
    use crate::models::PaymentStatus;
    use crate::request::{HttpMethod, HEADER_SIGNATURE, HEADER_TIMESTAMP};
    use crate::signing;
    use crate::test_utils::{fixtures, MockReply, MockTransport};
    use crate::Amount;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn client(jurisdiction: Jurisdiction) -> (Arc<MockTransport>, PaymentClient, PaymentEvents) {
        let mock = Arc::new(MockTransport::new());
        let config = ClientConfig::new("sk_test", "merchant-7", jurisdiction)
            .with_webhook(WebhookConfig::new("https://shop/hook", "whsec"));
        let (client, events) = PaymentClient::new(config, mock.clone()).unwrap();
        (mock, client, events)
    }

    fn sgd(amount: rust_decimal::Decimal) -> PaymentDetails {
        PaymentDetails::builder(Amount::new(amount), "SGD", "BTC")
            .description("Kiosk")
            .customer_name("Tan")
            .customer_email("a@b.com")
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig::new("", "m", Jurisdiction::Laos);
        let err = PaymentClient::new(config, Arc::new(MockTransport::new())).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_create_payment_tracks_and_notifies() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(201, fixtures::payment_json("pay_1", "created")),
        );

        let payment = client.create_payment(&sgd(dec!(1234.56789012))).await.unwrap();
        assert_eq!(payment.id, "pay_1");
        assert!(client.is_tracking("pay_1"));
        assert!(matches!(
            events.try_recv(),
            Some(PaymentEvent::PaymentCreated(p)) if p.id == "pay_1"
        ));

        let sent = mock.last_request().unwrap();
        let body = sent.body.as_deref().unwrap();
        let timestamp = sent.header(HEADER_TIMESTAMP).unwrap();
        assert_eq!(
            sent.header(HEADER_SIGNATURE).unwrap(),
            signing::sign(body, timestamp, "sk_test")
        );
        assert!(body.contains(r#""amount":"1234.56789012""#));
        assert!(body.contains(r#""country_code":"SG""#));
    }

    #[tokio::test]
    async fn test_unsupported_crypto_never_reaches_provider() {
        let (mock, client, mut events) = client(Jurisdiction::Malaysia);
        let details = PaymentDetails::builder(Amount::from_units(10), "MYR", "DOGE")
            .build()
            .unwrap();

        let err = client.create_payment(&details).await.unwrap_err();
        assert!(matches!(err, KioskPayError::Validation(_)));
        assert!(mock.requests().is_empty());
        assert_eq!(
            events.try_recv(),
            Some(PaymentEvent::Error {
                code: 400,
                message: "Unsupported cryptocurrency. Must be one of: BTC, ETH, USDT, USDC, BNB"
                    .to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_compliance_failure_never_reaches_provider() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        let details = PaymentDetails::builder(Amount::new(dec!(1000.00)), "SGD", "BTC")
            .customer_name("Tan")
            .build()
            .unwrap();
        assert!(client.create_payment(&details).await.is_err());
        assert!(mock.requests().is_empty());
        assert!(matches!(events.try_recv(), Some(PaymentEvent::Error { code: 400, .. })));
    }

    #[tokio::test]
    async fn test_provider_rejection_surfaces_status() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(422, r#"{"error":"address pool exhausted"}"#),
        );
        let err = client.create_payment(&sgd(dec!(10))).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(matches!(events.try_recv(), Some(PaymentEvent::Error { code: 422, .. })));
        assert!(client.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_maps_to_503() {
        let (mock, client, mut events) = client(Jurisdiction::Thailand);
        mock.on(
            HttpMethod::Get,
            "payments/p1",
            MockReply::fail(KioskPayError::ConnectionFailed {
                target: "api".into(),
                reason: "refused".into(),
            }),
        );
        assert!(client.get_payment("p1").await.is_err());
        assert!(matches!(events.try_recv(), Some(PaymentEvent::Error { code: 503, .. })));
    }

    #[tokio::test]
    async fn test_empty_payment_id_reported() {
        let (mock, client, mut events) = client(Jurisdiction::Brunei);
        assert!(client.get_payment("").await.is_err());
        assert!(client.cancel_payment("  ").await.is_err());
        assert!(mock.requests().is_empty());
        let errors = events.drain();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| *e
            == PaymentEvent::Error {
                code: 400,
                message: "Payment ID is required".to_string()
            }));
    }

    #[tokio::test]
    async fn test_cancel_stops_tracking() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(201, fixtures::payment_json("pay_1", "pending")),
        );
        mock.on(
            HttpMethod::Post,
            "payments/pay_1/cancel",
            MockReply::json(200, fixtures::payment_json("pay_1", "cancelled")),
        );

        client.create_payment(&sgd(dec!(5))).await.unwrap();
        let cancelled = client.cancel_payment("pay_1").await.unwrap();
        assert!(cancelled.is_cancelled());
        assert!(!client.is_tracking("pay_1"));

        let cancel = mock.last_request().unwrap();
        assert!(cancel.body.is_none());

        let kinds: Vec<&str> = events.drain().iter().map(PaymentEvent::kind).collect();
        assert_eq!(kinds, ["payment_created", "payment_cancelled"]);
        assert_eq!(
            client.tracker().settled_status("pay_1"),
            Some(PaymentStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_late_get_does_not_reopen_settled_payment() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(201, fixtures::payment_json("pay_1", "pending")),
        );
        mock.on(
            HttpMethod::Get,
            "payments/pay_1",
            MockReply::json(200, fixtures::payment_json("pay_1", "pending")),
        );
        client.create_payment(&sgd(dec!(5))).await.unwrap();

        let body = fixtures::webhook_body("payment.completed", "pay_1", "completed");
        assert!(client.process_webhook_event(&body, &signing::sign_payload(&body, "whsec")));

        let fetched = client.get_payment("pay_1").await.unwrap();
        assert!(fetched.is_pending());
        assert!(!client.is_tracking("pay_1"));
        assert_eq!(
            client.tracker().settled_status("pay_1"),
            Some(PaymentStatus::Completed)
        );

        let kinds: Vec<&str> = events.drain().iter().map(PaymentEvent::kind).collect();
        assert_eq!(
            kinds,
            ["payment_created", "payment_status_updated", "payment_retrieved"]
        );
    }

    #[tokio::test]
    async fn test_get_payment_settles_tracked_payment() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(201, fixtures::payment_json("pay_1", "pending")),
        );
        mock.on(
            HttpMethod::Get,
            "payments/pay_1",
            MockReply::json(200, fixtures::payment_json("pay_1", "completed")),
        );
        client.create_payment(&sgd(dec!(5))).await.unwrap();
        let fetched = client.get_payment("pay_1").await.unwrap();
        assert!(fetched.is_completed());
        assert!(!client.is_tracking("pay_1"));

        let kinds: Vec<&str> = events.drain().iter().map(PaymentEvent::kind).collect();
        assert_eq!(kinds, ["payment_created", "payment_retrieved"]);
    }

    #[tokio::test]
    async fn test_list_payments() {
        let (mock, client, mut events) = client(Jurisdiction::Vietnam);
        let page = serde_json::json!({
            "total": 57,
            "payments": [fixtures::payment_value("a", "completed"), fixtures::payment_value("b", "pending")]
        });
        mock.on(HttpMethod::Get, "payments", MockReply::json(200, page.to_string()));

        let filters = PaymentFilters::new()
            .with_status(PaymentStatus::Completed)
            .with_limit(2);
        let list = client.list_payments(&filters).await.unwrap();
        assert_eq!(list.total, 57);
        assert_eq!(list.payments.len(), 2);
        assert_eq!(
            mock.last_request().unwrap().path,
            "payments?status=completed&limit=2"
        );
        assert!(matches!(
            events.try_recv(),
            Some(PaymentEvent::PaymentsRetrieved { total: 57, .. })
        ));
    }

    #[tokio::test]
    async fn test_exchange_rates() {
        let (mock, client, mut events) = client(Jurisdiction::Malaysia);
        mock.on(
            HttpMethod::Get,
            "exchange-rates",
            MockReply::json(200, fixtures::exchange_rates_json("MYR")),
        );
        let rates = client.exchange_rates("MYR", &[]).await.unwrap();
        assert_eq!(rates.rate("USDT"), Some(dec!(4.71)));
        assert_eq!(
            mock.last_request().unwrap().path,
            "exchange-rates?base_currency=MYR&currencies=BTC,ETH,USDT,USDC,BNB"
        );
        assert!(matches!(
            events.try_recv(),
            Some(PaymentEvent::ExchangeRatesRetrieved { base_currency, .. }) if base_currency == "MYR"
        ));
    }

    #[tokio::test]
    async fn test_download_qr_code() {
        let (mock, client, mut events) = client(Jurisdiction::Cambodia);
        let png = vec![0x89, b'P', b'N', b'G'];
        mock.on(
            HttpMethod::Get,
            "https://cdn.example.com/qr/pay_1.png",
            MockReply::bytes(200, png.clone()),
        );
        let bytes = client
            .download_qr_code("https://cdn.example.com/qr/pay_1.png")
            .await
            .unwrap();
        assert_eq!(bytes, png);
        assert_eq!(
            events.try_recv(),
            Some(PaymentEvent::QrCodeDownloaded {
                url: "https://cdn.example.com/qr/pay_1.png".to_string(),
                bytes: png
            })
        );

        assert!(client.download_qr_code("").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_created_to_completed_by_polling() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(201, fixtures::payment_json("pay_1", "created")),
        );
        mock.on_sequence(
            HttpMethod::Get,
            "payments/pay_1",
            vec![
                MockReply::json(200, fixtures::payment_json("pay_1", "pending")),
                MockReply::json(200, fixtures::payment_json("pay_1", "completed")),
            ],
        );

        client.create_payment(&sgd(dec!(20))).await.unwrap();
        tokio::time::sleep(Duration::from_secs(25)).await;

        let statuses: Vec<PaymentStatus> = events
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                PaymentEvent::PaymentStatusUpdated(p) => Some(p.status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, [PaymentStatus::Pending, PaymentStatus::Completed]);
        assert!(!client.is_tracking("pay_1"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.count(HttpMethod::Get, "payments/pay_1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_settles_created_payment() {
        let (mock, client, mut events) = client(Jurisdiction::Singapore);
        mock.on(
            HttpMethod::Post,
            "payments",
            MockReply::json(201, fixtures::payment_json("pay_1", "created")),
        );
        client.create_payment(&sgd(dec!(20))).await.unwrap();
        events.drain();

        let body = fixtures::webhook_body("payment.completed", "pay_1", "completed");
        let sig = signing::sign_payload(&body, "whsec");
        assert!(client.verify_webhook_signature(&sig, &body));
        assert!(client.process_webhook_event(&body, &sig));
        assert!(!client.is_tracking("pay_1"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.count(HttpMethod::Get, "payments/pay_1"), 0);
        assert_eq!(events.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_check_payment_is_local() {
        let (mock, client, _events) = client(Jurisdiction::Singapore);
        let outcome = client.check_payment(&sgd(dec!(1500))).unwrap();
        assert!(outcome.travel_rule_applies);
        assert!(mock.requests().is_empty());
    }
}
