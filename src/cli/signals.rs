//! Stop triggers for a recording session

use std::future::pending;
use std::io::BufRead;
use std::thread;

use tokio::sync::oneshot;

use crate::application::StopCause;
use crate::domain::recording::Duration;

/// Resolve on the first of: a line on stdin, an interrupt, the time limit
pub async fn stop_trigger(limit: Option<Duration>) -> StopCause {
    tokio::select! {
        cause = enter_pressed() => cause,
        cause = interrupted() => cause,
        cause = time_limit(limit) => cause,
    }
}

/// Resolve when a line is read from stdin.
/// Closed stdin never resolves, so other triggers still apply.
///
/// The read runs on a plain thread: a blocked read must not keep the
/// runtime from shutting down.
pub async fn enter_pressed() -> StopCause {
    let (tx, rx) = oneshot::channel();
    let spawned = thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let mut line = String::new();
            let _ = tx.send(std::io::stdin().lock().read_line(&mut line));
        });
    if let Err(e) = spawned {
        log::warn!("cannot watch stdin: {}", e);
        return pending().await;
    }

    match rx.await {
        Ok(Ok(n)) if n > 0 => StopCause::Requested,
        Ok(Ok(_)) => {
            log::debug!("stdin closed, waiting for interrupt or time limit");
            pending().await
        }
        Ok(Err(e)) => {
            log::warn!("cannot read stdin: {}", e);
            pending().await
        }
        Err(_) => pending().await,
    }
}

/// Resolve on SIGINT (Ctrl+C) or SIGTERM
pub async fn interrupted() -> StopCause {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            log::warn!("cannot listen for Ctrl+C: {}", e);
                            sigterm.recv().await;
                        }
                    }
                    _ = sigterm.recv() => log::debug!("received SIGTERM"),
                }
                return StopCause::Interrupted;
            }
            Err(e) => log::warn!("cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl+C: {}", e);
        pending::<()>().await;
    }
    StopCause::Interrupted
}

/// Resolve after `limit`; never without one
pub async fn time_limit(limit: Option<Duration>) -> StopCause {
    match limit {
        Some(limit) => {
            tokio::time::sleep(limit.as_std()).await;
            StopCause::TimeLimit
        }
        None => pending().await,
    }
}
