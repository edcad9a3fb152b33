use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use meshprims_transport::{inbound_channel, InterfaceError, NetworkConfig, Transport};

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{
    interface_error, io_error, CliError, CliResult, CONFIG_INVALID, SUCCESS, TIMEOUT,
    TRANSPORT_ERROR,
};
use crate::output::{print_frame, print_interfaces, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = load_config(&args)?;
    if args.panic_on_error {
        config.panic_on_interface_error = true;
    }
    let deadline = args
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|timeout| Instant::now() + timeout);

    let (inbound, frames) = inbound_channel();
    let interfaces = config
        .build_all(inbound)
        .map_err(|err| interface_error("interface setup failed", err))?;
    tracing::info!(count = interfaces.len(), "interfaces started");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let outbound = match (&args.send, args.stdin) {
        (Some(data), _) => Some(data.clone().into_bytes()),
        (None, true) => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("stdin read failed", err))?;
            Some(buf)
        }
        (None, false) => None,
    };
    if let Some(payload) = outbound {
        transmit(&interfaces, &payload)?;
    }

    let mut printed = 0usize;
    let mut result = Ok(SUCCESS);

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }

        let wait = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    if args.count.is_some() {
                        result = Err(CliError::new(
                            TIMEOUT,
                            format!("timed out after receiving {printed} frame(s)"),
                        ));
                    }
                    break;
                }
                remaining.min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };

        match frames.recv_timeout(wait) {
            Ok(frame) => {
                print_frame(&frame, format);
                printed = printed.saturating_add(1);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if args.status {
        print_interfaces(&interfaces, format);
    }
    for iface in &interfaces {
        iface.shutdown();
    }
    result
}

fn load_config(args: &RunArgs) -> CliResult<NetworkConfig> {
    let raw = std::fs::read_to_string(&args.config).map_err(|err| {
        CliError::new(
            CONFIG_INVALID,
            format!("config read failed ({}): {err}", args.config.display()),
        )
    })?;
    let config: NetworkConfig = serde_json::from_str(&raw)
        .map_err(|err| CliError::new(CONFIG_INVALID, format!("config parse failed: {err}")))?;

    if config.interfaces.is_empty() {
        return Err(CliError::new(CONFIG_INVALID, "no interfaces configured"));
    }
    Ok(config)
}

/// Send `payload` on every interface that can transmit. Fails only if none
/// accepted it.
fn transmit(interfaces: &[Box<dyn Transport>], payload: &[u8]) -> CliResult<()> {
    let mut delivered = 0usize;
    let mut last_err = None;

    for iface in interfaces {
        match iface.send(payload) {
            Ok(()) => delivered += 1,
            Err(InterfaceError::NoForwardTarget(_)) => {
                tracing::debug!(interface = %iface.state(), "receive-only interface, not sending");
            }
            Err(err) => {
                tracing::warn!(interface = %iface.state(), error = %err, "send failed");
                last_err = Some(err);
            }
        }
    }

    match (delivered, last_err) {
        (0, Some(err)) => Err(interface_error("send failed", err)),
        (0, None) => Err(CliError::new(
            TRANSPORT_ERROR,
            "no configured interface can transmit",
        )),
        _ => Ok(()),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
