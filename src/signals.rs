use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio_util::sync::CancellationToken;

/// What should we do when the user stops
/// this program? Cancel `shutdown` and let
/// the main task tear the monitor down.
pub fn handle_shutdown(shutdown: CancellationToken) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            log::info!("Received signal {}, shutting down", signal);
            let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
            shutdown.cancel();
        }
    });

    Ok(())
}
