// Binary entry point.
// Starts the driver, forwards decoded events to the log and an optional
// external command, and stops the session on signal or device loss.

use input_linux_sys::{EV_KEY, EV_PWR, EV_REL, EV_SW, EV_SYN, SW_HEADPHONE_INSERT, SW_LID};
use mousefon::config::Config;
use mousefon::{cli, Driver};
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::io;
use std::process::{exit, Command};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> io::Result<()> {
    let args = cli::parse_args();
    let config = Config::from(&args);

    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut driver = Driver::new();
    let mut source = match driver.start(Some(&config.device)) {
        Ok(source) => source,
        Err(e) => {
            error!(device = %config.device.display(), error = %e, "failed to start driver");
            exit(1);
        }
    };

    // stop() from the signal thread closes the session descriptors, which
    // unblocks the read_event loop below with the synthetic error event.
    let driver = Arc::new(Mutex::new(driver));
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    let signal_driver = Arc::clone(&driver);
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "stopping on signal");
            signal_driver
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .stop();
        }
    });

    loop {
        let ev = source.read_event();
        let type_ = i32::from(ev.type_);
        let code = i32::from(ev.code);

        if type_ == EV_KEY {
            info!(code = ev.code, value = ev.value, "key event");
            run_hook(&config.on_key, "key", ev.code, ev.value);
        } else if type_ == EV_SW && code == SW_LID {
            info!(value = ev.value, "lid event");
            run_hook(&config.on_key, "lid", ev.code, ev.value);
        } else if type_ == EV_SW && code == SW_HEADPHONE_INSERT {
            info!(value = ev.value, "headphone event");
            run_hook(&config.on_key, "headphone", ev.code, ev.value);
        } else if type_ == EV_REL {
            info!(value = ev.value, "wheel event");
            run_hook(&config.on_key, "wheel", ev.code, ev.value);
        } else if type_ == EV_PWR {
            info!("handset unplugged, exiting");
            break;
        } else if type_ == EV_SYN {
            // Synthetic error event: the session is over.
            if ev.value != 0 {
                warn!(errno = ev.value, "event stream failed, exiting");
            } else {
                info!("event stream closed, exiting");
            }
            break;
        } else {
            debug!(type_ = ev.type_, code = ev.code, value = ev.value, "unhandled event");
        }
    }

    driver
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .stop();
    Ok(())
}

/// Runs the configured hook command with the event details, blocking until
/// it exits, like the shell scripts this driver historically fed.
fn run_hook(hook: &Option<String>, kind: &str, code: u16, value: i32) {
    let Some(hook) = hook else {
        return;
    };
    match Command::new(hook)
        .arg(kind)
        .arg(code.to_string())
        .arg(value.to_string())
        .status()
    {
        Ok(status) if !status.success() => {
            warn!(%status, hook = %hook, "event hook exited with failure")
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, hook = %hook, "failed to run event hook"),
    }
}
