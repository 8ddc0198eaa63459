//! Get, list and cancel commands

use anyhow::{Context, Result};
use chrono::NaiveDate;
use kioskpay_lib::{ClientConfig, PaymentFilters, PaymentStatus};

use crate::ui;

/// Filters accepted by `list`.
pub struct ListQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ListQuery {
    pub fn to_filters(&self) -> Result<PaymentFilters> {
        let mut filters = PaymentFilters::new()
            .with_limit(self.limit)
            .with_offset(self.offset);
        if let Some(status) = &self.status {
            filters = filters.with_status(status.parse::<PaymentStatus>()?);
        }
        let from = self.from.as_deref().map(parse_date).transpose()?;
        let to = self.to.as_deref().map(parse_date).transpose()?;
        if from.is_some() || to.is_some() {
            filters = filters.with_date_range(from, to);
        }
        Ok(filters)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub async fn get(config: ClientConfig, payment_id: &str, verbose: bool) -> Result<()> {
    let (client, mut events) = super::connect(config)?;

    match client.get_payment(payment_id).await {
        Ok(payment) => {
            ui::header("Payment");
            super::print_payment(&payment);
            if verbose && !payment.description.is_empty() {
                ui::key_value("Description", &payment.description);
            }
        }
        Err(err) => ui::error(&format!("Failed to fetch payment: {}", err)),
    }

    if verbose {
        super::print_pending_events(&mut events);
    }
    Ok(())
}

pub async fn list(config: ClientConfig, query: &ListQuery, verbose: bool) -> Result<()> {
    let filters = query.to_filters()?;
    let (client, mut events) = super::connect(config)?;

    let spinner = ui::spinner("Fetching payments...");
    let result = client.list_payments(&filters).await;
    spinner.finish_and_clear();

    match result {
        Ok(page) => {
            ui::header(&format!(
                "Payments ({} of {})",
                page.payments.len(),
                page.total
            ));
            if page.payments.is_empty() {
                ui::info("No payments match");
            }
            for payment in &page.payments {
                println!(
                    "  {}  {:>14} {}  {}",
                    payment.id,
                    payment.amount.to_string(),
                    payment.currency,
                    ui::status(payment.status.as_str())
                );
            }
        }
        Err(err) => ui::error(&format!("Failed to list payments: {}", err)),
    }

    if verbose {
        super::print_pending_events(&mut events);
    }
    Ok(())
}

pub async fn cancel(config: ClientConfig, payment_id: &str, verbose: bool) -> Result<()> {
    let (client, mut events) = super::connect(config)?;

    match client.cancel_payment(payment_id).await {
        Ok(payment) => {
            ui::success("Payment cancelled");
            super::print_payment(&payment);
        }
        Err(err) => ui::error(&format!("Failed to cancel payment: {}", err)),
    }

    if verbose {
        super::print_pending_events(&mut events);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> ListQuery {
        ListQuery {
            status: None,
            from: None,
            to: None,
            limit: 20,
            offset: 0,
        }
    }

    #[test]
    fn test_filters_from_query() {
        let q = ListQuery {
            status: Some("Completed".into()),
            from: Some("2024-05-01".into()),
            ..query()
        };
        let filters = q.to_filters().unwrap();
        assert_eq!(
            filters.query_string(),
            "status=completed&from_date=2024-05-01&limit=20"
        );
    }

    #[test]
    fn test_bad_inputs_rejected() {
        let q = ListQuery {
            status: Some("paid".into()),
            ..query()
        };
        assert!(q.to_filters().is_err());

        let q = ListQuery {
            to: Some("01/05/2024".into()),
            ..query()
        };
        assert!(q.to_filters().is_err());
    }
}
