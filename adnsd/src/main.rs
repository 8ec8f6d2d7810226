mod cli;
mod config;
mod logging;
mod pidfile;
mod reload;
mod server;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command, ConfigCommand};
use config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("error loading configuration: {error}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Command::Check => run_check(&settings),
        Command::Start => run_start(settings).await,
        Command::Reload => run_reload(&settings),
        Command::Config { command } => run_config(&settings, command),
    }
}

fn run_check(settings: &Settings) -> ExitCode {
    let Some(source) = settings.zone_source() else {
        eprintln!("no zonefile or zones_dir configured");
        return ExitCode::from(2);
    };

    match dns_types::zones::deserialise::load_path(source) {
        Ok(store) => {
            let apexes: Vec<_> = store.apexes().collect();
            println!("ok: {} zone(s) loaded", apexes.len());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error loading zones: {error}");
            ExitCode::from(2)
        }
    }
}

async fn run_start(settings: Settings) -> ExitCode {
    if let Err(error) = logging::begin_logging(&settings) {
        eprintln!("error opening log file: {error}");
        return ExitCode::from(2);
    }

    let Some(source) = settings.zone_source() else {
        tracing::error!("no zonefile or zones_dir configured");
        return ExitCode::from(2);
    };

    if settings.daemon {
        if let Err(error) = daemonise() {
            tracing::error!(%error, "failed to daemonise");
            return ExitCode::from(1);
        }
    }

    if settings.write_pid {
        if let Err(error) = pidfile::write(&settings.pid_file) {
            tracing::error!(%error, "failed to write pid file");
            return ExitCode::from(1);
        }
    }

    let controller = match reload::ReloadController::load(source.to_path_buf()) {
        Ok(controller) => controller,
        Err(error) => {
            tracing::error!(%error, "failed to load zones");
            if settings.write_pid {
                let _ = pidfile::remove_if_owned(&settings.pid_file);
            }
            return ExitCode::from(1);
        }
    };

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let server_task = tokio::spawn(server::listen(
        settings.interface,
        settings.port,
        controller.current(),
        shutdown_tx.subscribe(),
    ));

    let reload_task = tokio::spawn(reload_on_sighup(controller));

    wait_for_shutdown_signal().await;
    tracing::info!("received shutdown signal");
    let _ = shutdown_tx.send(());
    reload_task.abort();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::error!(%error, "transport error");
        }
        Err(error) => {
            tracing::error!(%error, "server task panicked");
        }
    }

    if settings.write_pid {
        let _ = pidfile::remove_if_owned(&settings.pid_file);
    }

    ExitCode::SUCCESS
}

async fn reload_on_sighup(controller: reload::ReloadController) {
    let Ok(mut sighup) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) else {
        tracing::error!("failed to install SIGHUP handler");
        return;
    };

    loop {
        sighup.recv().await;
        tracing::info!("reloading zones");
        let start = std::time::Instant::now();
        match controller.reload().await {
            Ok(()) => tracing::info!(elapsed = ?start.elapsed(), "reload succeeded"),
            Err(error) => tracing::error!(%error, "reload failed, keeping previous zones"),
        }
    }
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

fn run_reload(settings: &Settings) -> ExitCode {
    let pid = match pidfile::read(&settings.pid_file) {
        Ok(pid) => pid,
        Err(error) => {
            eprintln!("error reading pid file {}: {error}", settings.pid_file.display());
            return ExitCode::from(1);
        }
    };

    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGHUP) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error signalling pid {pid}: {error}");
            ExitCode::from(1)
        }
    }
}

fn run_config(settings: &Settings, command: ConfigCommand) -> ExitCode {
    match command {
        ConfigCommand::Show => match render_config(settings) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("error rendering configuration: {error}");
                ExitCode::from(1)
            }
        },
        ConfigCommand::Init { path } => match render_config(&Settings::default()) {
            Ok(text) => match std::fs::write(&path, text) {
                Ok(()) => {
                    println!("wrote default configuration to {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("error writing {}: {error}", path.display());
                    ExitCode::from(1)
                }
            },
            Err(error) => {
                eprintln!("error rendering configuration: {error}");
                ExitCode::from(1)
            }
        },
    }
}

/// Render settings as a simple `key: value` listing, one per config
/// key from the specification, rather than pulling in a YAML writer
/// for a handful of scalar fields.
fn render_config(settings: &Settings) -> Result<String, std::convert::Infallible> {
    Ok(format!(
        "zonefile: {}\nzones_dir: {}\nport: {}\ninterface: {}\ndaemon: {}\nwrite_pid: {}\npid_file: {}\nlog_file: {}\nlog_level: {}\nverbose: {}\n",
        settings.zonefile.as_ref().map_or(String::new(), |p| p.display().to_string()),
        settings.zones_dir.as_ref().map_or(String::new(), |p| p.display().to_string()),
        settings.port,
        settings.interface,
        settings.daemon,
        settings.write_pid,
        settings.pid_file.display(),
        settings.log_file.as_ref().map_or(String::new(), |p| p.display().to_string()),
        settings.log_level,
        settings.verbose,
    ))
}

/// Fork into the background, the way a classic Unix daemon does:
/// detach from the controlling terminal by becoming a session leader
/// in the child, then exit the parent.
fn daemonise() -> Result<(), nix::Error> {
    match unsafe { nix::unistd::fork()? } {
        nix::unistd::ForkResult::Parent { .. } => std::process::exit(0),
        nix::unistd::ForkResult::Child => {
            nix::unistd::setsid()?;
            Ok(())
        }
    }
}
