//! Notifications delivered to the host application.
//!
//! The client pushes a [`PaymentEvent`] for every completed operation, every
//! status change it observes and every failure. Hosts read them from the
//! [`PaymentEvents`] receiver returned alongside the client.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::models::Payment;
use crate::KioskPayError;

/// Something the host should know about.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    PaymentCreated(Payment),
    PaymentRetrieved(Payment),
    PaymentsRetrieved {
        payments: Vec<Payment>,
        total: u64,
    },
    PaymentCancelled(Payment),
    ExchangeRatesRetrieved {
        base_currency: String,
        rates: BTreeMap<String, Decimal>,
    },
    /// A tracked payment changed status (poll or webhook).
    PaymentStatusUpdated(Payment),
    QrCodeDownloaded {
        url: String,
        bytes: Vec<u8>,
    },
    Error {
        code: i32,
        message: String,
    },
}

impl PaymentEvent {
    pub fn from_error(err: &KioskPayError) -> Self {
        Self::Error {
            code: err.status_code(),
            message: err.message(),
        }
    }

    /// Short name, handy for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PaymentCreated(_) => "payment_created",
            Self::PaymentRetrieved(_) => "payment_retrieved",
            Self::PaymentsRetrieved { .. } => "payments_retrieved",
            Self::PaymentCancelled(_) => "payment_cancelled",
            Self::ExchangeRatesRetrieved { .. } => "exchange_rates_retrieved",
            Self::PaymentStatusUpdated(_) => "payment_status_updated",
            Self::QrCodeDownloaded { .. } => "qr_code_downloaded",
            Self::Error { .. } => "error",
        }
    }
}

/// Sending half, shared by every component that emits events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PaymentEvent>,
}

impl EventSink {
    /// Deliver an event. A host that dropped its receiver simply stops hearing.
    pub fn emit(&self, event: PaymentEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::trace!(kind, "event receiver dropped");
        }
    }

    pub fn error(&self, err: &KioskPayError) {
        self.emit(PaymentEvent::from_error(err));
    }
}

/// Receiving half, owned by the host.
#[derive(Debug)]
pub struct PaymentEvents {
    rx: mpsc::UnboundedReceiver<PaymentEvent>,
}

impl PaymentEvents {
    /// Wait for the next event. `None` once the client and all its tasks are gone.
    pub async fn recv(&mut self) -> Option<PaymentEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<PaymentEvent> {
        self.rx.try_recv().ok()
    }

    /// All events queued right now.
    pub fn drain(&mut self) -> Vec<PaymentEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Create a connected sink/receiver pair.
pub fn channel() -> (EventSink, PaymentEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, PaymentEvents { rx })
}
