//! Create command - create a payment and optionally watch it settle

use anyhow::Result;
use kioskpay_lib::{ClientConfig, PaymentEvent, PaymentEvents};

use crate::ui;
use crate::PaymentArgs;

pub async fn run(
    config: ClientConfig,
    args: &PaymentArgs,
    watch: bool,
    verbose: bool,
) -> Result<()> {
    let details = super::payment_details(&config, args)?;
    let (client, mut events) = super::connect(config)?;

    let spinner = ui::spinner("Creating payment...");
    let result = client.create_payment(&details).await;
    spinner.finish_and_clear();

    let payment = match result {
        Ok(payment) => payment,
        Err(err) => {
            ui::error(&format!("Payment creation failed: {}", err));
            return Ok(());
        }
    };

    ui::success("Payment created");
    super::print_payment(&payment);

    if !watch || payment.is_terminal() {
        if verbose {
            super::print_pending_events(&mut events);
        }
        return Ok(());
    }

    println!();
    ui::info(&format!(
        "Watching payment every {}s (Ctrl+C to stop)",
        client.tracker().poll_interval().as_secs()
    ));
    watch_until_settled(&payment.id, &mut events).await;
    client.stop_tracking(&payment.id);
    Ok(())
}

async fn watch_until_settled(payment_id: &str, events: &mut PaymentEvents) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PaymentEvent::PaymentStatusUpdated(p)) if p.id == payment_id => {
                    ui::info(&format!("Status: {}", ui::status(p.status.as_str())));
                    if p.is_terminal() {
                        if p.is_completed() {
                            ui::success("Payment completed");
                        } else {
                            ui::warning(&format!("Payment {}", p.status));
                        }
                        return;
                    }
                }
                Some(PaymentEvent::Error { code, message }) => {
                    ui::warning(&format!("Status check failed ({}): {}", code, message));
                }
                Some(_) => {}
                None => return,
            },
            _ = tokio::signal::ctrl_c() => {
                ui::info("Stopped watching");
                return;
            }
        }
    }
}
