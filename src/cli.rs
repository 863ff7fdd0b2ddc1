use clap::Parser;
use std::path::PathBuf;

/// Userspace driver for the MouseFon USB handset.
/// Decodes keypad, scroll wheel, lid and headphone-jack activity into
/// input events and optionally invokes an external command per event.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path of the hiddev node for the handset.
    #[arg(short, long, default_value = "/dev/usb/hiddev0")]
    pub device: PathBuf,

    /// External command run for each decoded event, invoked as
    /// `CMD <kind> <code> <value>` with kind one of key/lid/headphone/wheel.
    #[arg(short = 'k', long, value_name = "CMD")]
    pub on_key: Option<String>,

    /// Enable verbose logging to stderr.
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

/// Parses command line arguments using clap.
pub fn parse_args() -> Args {
    Args::parse()
}
