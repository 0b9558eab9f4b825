//! Maps operating-system process signals onto audit lifecycle signals.
//!
//! `SIGHUP` means the controlling terminal went away and is treated as
//! `Hidden`; `SIGTERM` and Ctrl-C are treated as `Unloading`.

use shopkeep_application::{LifecycleSignal, LifecycleSignals};
use shopkeep_core::AppResult;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Spawns a task forwarding process signals to `signals`.
///
/// The task ends after forwarding `Unloading`, or once a forwarded signal
/// finds no subscribers left.
pub fn spawn_process_signal_forwarder(signals: LifecycleSignals) -> AppResult<JoinHandle<()>> {
    let mut listener = ProcessSignalListener::install()?;

    Ok(tokio::spawn(async move {
        loop {
            let Some(signal) = listener.next().await else {
                warn!("process signal stream ended");
                break;
            };

            let delivered = signals.notify(signal);
            info!(
                signal = ?signal,
                subscribers = delivered,
                "forwarded process lifecycle signal"
            );

            if signal == LifecycleSignal::Unloading || signals.subscriber_count() == 0 {
                break;
            }
        }
    }))
}

#[cfg(unix)]
struct ProcessSignalListener {
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ProcessSignalListener {
    fn install() -> AppResult<Self> {
        use shopkeep_core::AppError;
        use tokio::signal::unix::{SignalKind, signal};

        let hangup = signal(SignalKind::hangup()).map_err(|error| {
            AppError::Internal(format!("failed to install SIGHUP handler: {error}"))
        })?;
        let terminate = signal(SignalKind::terminate()).map_err(|error| {
            AppError::Internal(format!("failed to install SIGTERM handler: {error}"))
        })?;

        Ok(Self { hangup, terminate })
    }

    async fn next(&mut self) -> Option<LifecycleSignal> {
        tokio::select! {
            received = self.hangup.recv() => received.map(|()| LifecycleSignal::Hidden),
            received = self.terminate.recv() => received.map(|()| LifecycleSignal::Unloading),
            result = tokio::signal::ctrl_c() => result.ok().map(|()| LifecycleSignal::Unloading),
        }
    }
}

#[cfg(not(unix))]
struct ProcessSignalListener;

#[cfg(not(unix))]
impl ProcessSignalListener {
    fn install() -> AppResult<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> Option<LifecycleSignal> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(LifecycleSignal::Unloading),
            Err(error) => {
                warn!(error = %error, "failed to await Ctrl-C");
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;
    use std::time::Duration;

    use shopkeep_application::{LifecycleSignal, LifecycleSignals};

    use super::spawn_process_signal_forwarder;

    fn raise(signal: &str) {
        let status = Command::new("kill")
            .args([signal, std::process::id().to_string().as_str()])
            .status();
        assert!(
            matches!(&status, Ok(status) if status.success()),
            "failed to raise {signal}: {status:?}"
        );
    }

    // Signals reach every forwarder in the process, so all mappings share one test.
    #[tokio::test]
    async fn hangup_forwards_hidden_and_terminate_forwards_unloading_then_stops() {
        let signals = LifecycleSignals::new(4);
        let mut receiver = signals.subscribe();

        let forwarder = match spawn_process_signal_forwarder(signals.clone()) {
            Ok(forwarder) => forwarder,
            Err(error) => panic!("failed to install signal forwarder: {error}"),
        };

        raise("-HUP");
        let received = tokio::time::timeout(Duration::from_secs(5), receiver.recv()).await;
        assert!(matches!(received, Ok(Ok(LifecycleSignal::Hidden))));
        assert!(!forwarder.is_finished());

        raise("-TERM");
        let received = tokio::time::timeout(Duration::from_secs(5), receiver.recv()).await;
        assert!(matches!(received, Ok(Ok(LifecycleSignal::Unloading))));

        let finished = tokio::time::timeout(Duration::from_secs(5), forwarder).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }
}
