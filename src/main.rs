use std::process::ExitCode;
use std::time::Duration;

use redis_watchdog::runtime::{DockerConnector, RuntimeConnector};
use redis_watchdog::{
    ContainerControl, ContainerState, HealthReport, MonitorRegistry, WatchdogConfig,
};
use tokio_util::sync::CancellationToken;

use crate::cli::Command;

mod cli;
mod signals;

const EXIT_MANUAL_INTERVENTION: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenv::dotenv();
    env_logger::init();

    let args = cli::get_cli_args();
    let config = match WatchdogConfig::try_init(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Unable to load config {:?}: {}", args.config, e);
            return ExitCode::FAILURE;
        }
    };

    match args.command.clone() {
        Command::Check { json } => check(config, json).await,
        Command::Ensure => ensure(config).await,
        Command::Watch => watch(config).await,
        Command::Alerts => alerts(config).await,
        Command::Pause => control(config, |c| async move { c.pause().await }).await,
        Command::Unpause => control(config, |c| async move { c.unpause().await }).await,
        Command::Start { timeout } => {
            control(config, move |c| async move {
                c.start().await?;
                c.wait_for_state(
                    ContainerState::Running,
                    Duration::from_secs(timeout),
                    Duration::from_millis(250),
                )
                .await
            })
            .await
        }
        Command::Stop { timeout } => {
            control(config, move |c| async move {
                c.stop(Duration::from_secs(timeout)).await
            })
            .await
        }
    }
}

async fn check(config: WatchdogConfig, json: bool) -> ExitCode {
    let registry = MonitorRegistry::from_config(config);
    let monitor = match registry.get_monitor().await {
        Ok(monitor) => monitor,
        Err(e) => {
            log::error!("Unable to create health monitor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = monitor.check_health().await;
    registry.cleanup_monitor().await;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                log::error!("Unable to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }

    if report.connection_successful {
        ExitCode::SUCCESS
    } else if report.requires_manual_intervention {
        ExitCode::from(EXIT_MANUAL_INTERVENTION)
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &HealthReport) {
    println!(
        "container:   {}",
        report.container_name.as_deref().unwrap_or("-")
    );
    println!("state:       {}", report.container_state);
    println!("reachable:   {}", report.connection_successful);
    if let Some(latency) = report.ping_latency_ms {
        println!("latency:     {latency:.2} ms");
    }
    if report.auto_recovery_attempted {
        println!("recovered:   {}", report.auto_recovery_successful);
    }
    if let Some(error) = &report.error_message {
        println!("error:       {error}");
    }
    if report.requires_manual_intervention {
        println!("manual intervention required");
    }
}

async fn ensure(config: WatchdogConfig) -> ExitCode {
    let registry = MonitorRegistry::from_config(config);
    let available = registry.ensure_available_for_tests().await;
    registry.cleanup_monitor().await;

    if available {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn watch(config: WatchdogConfig) -> ExitCode {
    let registry = MonitorRegistry::from_config(config);
    let monitor = match registry.get_monitor().await {
        Ok(monitor) => monitor,
        Err(e) => {
            log::error!("Unable to create health monitor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    if let Err(e) = signals::handle_shutdown(shutdown.clone()) {
        log::error!("Unable to install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    monitor.start_monitoring().await;
    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

    shutdown.cancelled().await;
    registry.cleanup_monitor().await;
    ExitCode::SUCCESS
}

async fn alerts(config: WatchdogConfig) -> ExitCode {
    let registry = MonitorRegistry::from_config(config);
    let monitor = match registry.get_monitor().await {
        Ok(monitor) => monitor,
        Err(e) => {
            log::error!("Unable to create health monitor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let alerts = monitor.detect_security_alerts().await;
    registry.cleanup_monitor().await;

    for alert in &alerts {
        println!("{alert}");
    }
    // Non-zero when something suspicious showed up, for use in CI
    if alerts.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn control<F, Fut>(config: WatchdogConfig, action: F) -> ExitCode
where
    F: FnOnce(ContainerControl) -> Fut,
    Fut: std::future::Future<Output = Result<(), redis_watchdog::ControlError>>,
{
    let runtime = match DockerConnector.connect() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Unable to connect to the container runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match action(ContainerControl::new(runtime, config.container_name)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
