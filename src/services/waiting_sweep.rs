use crate::db::{ReservationOperations, WaitingListOperations};
use actix_web::web;
use tokio::time::{interval, Duration};

/// Periodically releases tables held for called parties that never arrived, drops waiting
/// parties whose day is over and flags confirmed reservations whose arrival window has passed.
pub async fn run_waiting_sweep(
    waiting_ops: WaitingListOperations,
    reservation_ops: ReservationOperations,
    every_secs: u64,
) {
    let mut tick = interval(Duration::from_secs(every_secs.max(1)));
    loop {
        tick.tick().await;
        match web::block({
            let waiting_ops = waiting_ops.clone();
            move || waiting_ops.expire_stale_called_entries()
        })
        .await
        {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("waiting sweep: expired {} called entries", count);
                }
            }
            Ok(Err(e)) => error!("waiting sweep error: {}", e),
            Err(e) => error!("waiting sweep blocking error: {}", e),
        }

        match web::block({
            let waiting_ops = waiting_ops.clone();
            move || waiting_ops.expire_leftover_waiting_entries()
        })
        .await
        {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("waiting sweep: dropped {} waiting parties from past days", count);
                }
            }
            Ok(Err(e)) => error!("waiting sweep error: {}", e),
            Err(e) => error!("waiting sweep blocking error: {}", e),
        }

        match web::block({
            let reservation_ops = reservation_ops.clone();
            move || reservation_ops.mark_overdue_no_shows()
        })
        .await
        {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("waiting sweep: marked {} no-shows", count);
                }
            }
            Ok(Err(e)) => error!("no-show sweep error: {}", e),
            Err(e) => error!("no-show sweep blocking error: {}", e),
        }
    }
}
