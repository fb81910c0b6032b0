//! Demo binary: run N workers against a K-permit gate and print their
//! progress lines to stdout. Diagnostics go to stderr via tracing.

use std::process;
use std::time::Duration;

use workgate::{Dispatcher, ProgressSender, RunConfig};

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let base_level = match std::env::var("WORKGATE_LOG").as_deref() {
        Ok("trace") => "trace",
        Ok("debug") => "debug",
        Ok("warn") | Ok("warning") => "warn",
        Ok("error") => "error",
        _ => "info",
    };

    let filter = EnvFilter::new(format!("workgate={base_level}"));

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<RunConfig, String> {
    let mut config = RunConfig::default().with_env_overrides();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--workers" => {
                i += 1;
                config.pool_size = parse_value(args.get(i), "--workers")?;
            }
            "--permits" => {
                i += 1;
                config.permit_capacity = parse_value(args.get(i), "--permits")?;
            }
            "--steps" => {
                i += 1;
                config.steps_per_worker = parse_value(args.get(i), "--steps")?;
            }
            "--step-delay-ms" => {
                i += 1;
                config.step_delay =
                    Duration::from_millis(parse_value(args.get(i), "--step-delay-ms")?);
            }
            "--timeout-s" => {
                i += 1;
                config.overall_timeout =
                    Duration::from_secs(parse_value(args.get(i), "--timeout-s")?);
            }
            "--help" | "-h" => return Err(String::new()),
            arg => return Err(format!("unknown argument: {arg}")),
        }
        i += 1;
    }

    Ok(config)
}

fn parse_value<T: std::str::FromStr>(value: Option<&String>, flag: &str) -> Result<T, String> {
    let raw = value.ok_or_else(|| format!("{flag} requires a value"))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {flag}: {raw}"))
}

fn print_usage() {
    eprintln!("Usage: workgate [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --workers <N>         workers contending for the gate [default: 5]");
    eprintln!("  --permits <N>         concurrent admission permits [default: 2]");
    eprintln!("  --steps <N>           work steps per worker [default: 4]");
    eprintln!("  --step-delay-ms <MS>  delay per work step [default: 1000]");
    eprintln!("  --timeout-s <S>       overall wait before giving up [default: 50]");
    eprintln!();
    eprintln!("Environment: WORKGATE_POOL_SIZE, WORKGATE_PERMIT_CAPACITY, WORKGATE_STEPS,");
    eprintln!("             WORKGATE_STEP_DELAY_MS, WORKGATE_TIMEOUT_S, WORKGATE_LOG, LOG_FORMAT");
}

#[tokio::main]
async fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            print_usage();
            process::exit(2);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run(config: RunConfig) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(config)?;
    let (progress, mut events) = ProgressSender::channel();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{event}");
        }
    });

    let report = dispatcher.run(progress).await?;

    if report.outstanding.is_empty() {
        // Every sender is gone, so the printer drains and exits on its own.
        let _ = printer.await;
    } else {
        // Outstanding workers keep running until the process exits; stop
        // echoing their progress once we have given up waiting.
        printer.abort();
    }

    tracing::info!(
        completed = report.completed.len(),
        cancelled = report.cancelled.len(),
        outstanding = report.outstanding.len(),
        elapsed = ?report.elapsed,
        "run finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("workgate")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_flags_yields_defaults() {
        let config = parse_args(&args(&[])).unwrap();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.permit_capacity, 2);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse_args(&args(&[
            "--workers",
            "3",
            "--permits",
            "1",
            "--steps",
            "2",
            "--step-delay-ms",
            "10",
            "--timeout-s",
            "5",
        ]))
        .unwrap();

        assert_eq!(config.pool_size, 3);
        assert_eq!(config.permit_capacity, 1);
        assert_eq!(config.steps_per_worker, 2);
        assert_eq!(config.step_delay, Duration::from_millis(10));
        assert_eq!(config.overall_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
    }

    #[test]
    fn missing_and_invalid_values_are_errors() {
        assert!(parse_args(&args(&["--workers"])).is_err());
        assert!(parse_args(&args(&["--workers", "many"])).is_err());
    }
}
