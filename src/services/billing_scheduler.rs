use crate::db::BillingOperations;
use actix_web::web;
use tokio::time::{interval, Duration};

/// Polls for seatings past the billing delay and sends each bill exactly once.
pub async fn run_billing_scheduler(billing_ops: BillingOperations, every_secs: u64) {
    let mut tick = interval(Duration::from_secs(every_secs.max(1)));
    loop {
        tick.tick().await;
        match web::block({
            let billing_ops = billing_ops.clone();
            move || billing_ops.run_billing_tick()
        })
        .await
        {
            Ok(Ok(sent)) => {
                if sent > 0 {
                    info!("billing scheduler: sent {} bills", sent);
                }
            }
            Ok(Err(e)) => {
                error!("billing scheduler error: {}", e);
            }
            Err(e) => {
                error!("billing scheduler blocking error: {}", e);
            }
        }
    }
}
