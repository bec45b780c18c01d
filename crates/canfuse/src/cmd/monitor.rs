use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use canfuse_frame::FrameError;
use canfuse_session::{Session, SessionConfig, SessionError};

use crate::cmd::{load_bus, parse_duration, MonitorArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_state, OutputFormat, StateReport};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let (config, registry) = load_bus(&args.config)?;
    let interval = parse_duration(&args.interval)?;
    let session_config = SessionConfig {
        retry_interval: parse_duration(&args.retry_interval)?,
        max_attempts: args.max_attempts,
        ..SessionConfig::new(
            args.interface
                .clone()
                .unwrap_or_else(|| config.bus_name.clone()),
        )
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let session = match Session::connect(
        &session_config,
        Arc::new(registry),
        config.decoder(),
        config.encoder(),
        &running,
    ) {
        Ok(session) => session,
        Err(SessionError::Cancelled) => return Ok(SUCCESS),
        Err(err) => return Err(session_error("open failed", err)),
    };
    // Monitoring only listens; nothing is transmitted.
    let (mut receiver, _) = session.split();

    let mut last_print = Instant::now();
    while running.load(Ordering::SeqCst) {
        match receiver.poll_once() {
            Ok(_) => {}
            Err(SessionError::Frame(FrameError::ConnectionClosed)) => break,
            Err(err) => return Err(session_error("receive failed", err)),
        }

        if args
            .count
            .is_some_and(|count| receiver.stats().frames >= count)
        {
            break;
        }

        if last_print.elapsed() >= interval {
            print_state(
                &StateReport::capture(
                    &session_config.interface,
                    receiver.registry(),
                    Some(receiver.stats()),
                ),
                format,
            );
            last_print = Instant::now();
        }
    }

    print_state(
        &StateReport::capture(
            &session_config.interface,
            receiver.registry(),
            Some(receiver.stats()),
        ),
        format,
    );
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
