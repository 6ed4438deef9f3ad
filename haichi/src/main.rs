mod app;
mod core;
mod event_emitter;
mod ipc;
mod macos;
mod platform;
mod store;

use anyhow::{bail, Result};
use argh::FromArgs;
use haichi_ipc::{Command, DisplayLayoutProfile, EventFilter, Response, StatusInfo};
use ipc::IpcClient;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Haichi - keeps your macOS display arrangement in place
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Option<SubCommand>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Start(StartCmd),
    Version(VersionCmd),
    Snapshot(SnapshotCmd),
    Restore(RestoreCmd),
    Status(StatusCmd),
    ShowProfile(ShowProfileCmd),
    Forget(ForgetCmd),
    ClearTracked(ClearTrackedCmd),
    ClearOverride(ClearOverrideCmd),
    SetAutoRestore(SetAutoRestoreCmd),
    Subscribe(SubscribeCmd),
    Quit(QuitCmd),
}

/// Start the haichi daemon
#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
struct StartCmd {}

/// Show version information
#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCmd {}

/// Save the current arrangement as the default profile
#[derive(FromArgs)]
#[argh(subcommand, name = "snapshot")]
struct SnapshotCmd {}

/// Restore the default profile now
#[derive(FromArgs)]
#[argh(subcommand, name = "restore")]
struct RestoreCmd {}

/// Show daemon and display status
#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
struct StatusCmd {}

/// Print the saved default profile as JSON
#[derive(FromArgs)]
#[argh(subcommand, name = "show-profile")]
struct ShowProfileCmd {}

/// Delete the saved default profile
#[derive(FromArgs)]
#[argh(subcommand, name = "forget")]
struct ForgetCmd {}

/// Stop watching for manual changes until the next restore
#[derive(FromArgs)]
#[argh(subcommand, name = "clear-tracked")]
struct ClearTrackedCmd {}

/// Re-enable auto-restore for the current displays
#[derive(FromArgs)]
#[argh(subcommand, name = "clear-override")]
struct ClearOverrideCmd {}

/// Turn auto-restore on or off
#[derive(FromArgs)]
#[argh(subcommand, name = "set-auto-restore")]
struct SetAutoRestoreCmd {
    /// on or off
    #[argh(positional)]
    value: String,
}

/// Print daemon events as JSON lines
#[derive(FromArgs)]
#[argh(subcommand, name = "subscribe")]
struct SubscribeCmd {
    /// only configuration changed events
    #[argh(switch)]
    configuration: bool,
    /// only restore completed events
    #[argh(switch)]
    restore: bool,
    /// only manual change events
    #[argh(switch)]
    manual_change: bool,
}

/// Quit the haichi daemon
#[derive(FromArgs)]
#[argh(subcommand, name = "quit")]
struct QuitCmd {}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    match cli.command {
        None => {
            // No subcommand - show help (simulate --help)
            let args: Vec<&str> = vec!["haichi", "--help"];
            if let Err(e) = Cli::from_args(&args[..1], &args[1..]) {
                println!("{}", e.output);
            }
            Ok(())
        }
        Some(SubCommand::Start(_)) => {
            // Start daemon
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();

            tracing::info!("haichi starting");
            app::App::run()
        }
        Some(SubCommand::Version(_)) => {
            println!("haichi {}", VERSION);
            Ok(())
        }
        Some(SubCommand::Subscribe(cmd)) => {
            let filter = EventFilter {
                configuration: cmd.configuration,
                restore: cmd.restore,
                manual_change: cmd.manual_change,
            };
            ipc::subscribe_and_print(Some(filter))
        }
        Some(subcmd) => run_cli(subcmd),
    }
}

fn run_cli(subcmd: SubCommand) -> Result<()> {
    let cmd = to_command(subcmd)?;
    let mut client = IpcClient::connect()?;
    let response = client.send(&cmd)?;

    match response {
        Response::Ok => {}
        Response::Error { message } => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
        Response::Profile { profile } => match (cmd, profile) {
            (Command::Snapshot, Some(profile)) => print_saved(&profile),
            (_, Some(profile)) => println!("{}", serde_json::to_string_pretty(&profile)?),
            (_, None) => {
                eprintln!("No saved profile");
                std::process::exit(1);
            }
        },
        Response::Restore { outcome } => {
            println!("{}", outcome);
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Response::Status { status } => print_status(&status),
    }

    Ok(())
}

fn print_saved(profile: &DisplayLayoutProfile) {
    println!(
        "Saved '{}' ({} displays)",
        profile.display_name,
        profile.displays.len()
    );
}

fn print_status(status: &StatusInfo) {
    println!("Phase: {}", status.phase);
    println!("Observing: {}", status.observing);
    println!("Auto-restore: {}", status.auto_restore);
    println!("Saved profile: {}", status.has_default);
    println!("Override active: {}", status.override_active);
    println!("Tracking positions: {}", status.tracking_positions);
    println!("Signature: {}", status.signature);
    for d in &status.displays {
        println!(
            "{}: {} {}x{} @ ({},{}){}{}",
            d.id,
            d.name,
            d.width,
            d.height,
            d.x,
            d.y,
            if d.is_main { " [main]" } else { "" },
            if d.is_builtin { " [built-in]" } else { "" }
        );
    }
}

fn to_command(subcmd: SubCommand) -> Result<Command> {
    match subcmd {
        SubCommand::Start(_) | SubCommand::Version(_) | SubCommand::Subscribe(_) => {
            unreachable!("handled in main")
        }
        SubCommand::Snapshot(_) => Ok(Command::Snapshot),
        SubCommand::Restore(_) => Ok(Command::Restore),
        SubCommand::Status(_) => Ok(Command::Status),
        SubCommand::ShowProfile(_) => Ok(Command::ShowProfile),
        SubCommand::Forget(_) => Ok(Command::Forget),
        SubCommand::ClearTracked(_) => Ok(Command::ClearTracked),
        SubCommand::ClearOverride(_) => Ok(Command::ClearOverride),
        SubCommand::SetAutoRestore(cmd) => Ok(Command::SetAutoRestore {
            enabled: parse_switch(&cmd.value)?,
        }),
        SubCommand::Quit(_) => Ok(Command::Quit),
    }
}

fn parse_switch(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => bail!("Unknown value: {} (use on or off)", s),
    }
}
