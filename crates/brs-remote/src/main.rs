//! brs-remote: drive a running BrightScript simulator from the command line.
//!
//! # Usage
//!
//! ```text
//! brs-remote [OPTIONS] <COMMAND>
//!
//! Commands:
//!   status        Report which simulator services are reachable
//!   key           Send one remote-control key event
//!   keys          Press several keys in order
//!   type          Type text one character at a time
//!   launch        Launch an installed app
//!   device-info   Show the device configuration
//!   active-app    Show the foreground app
//!   apps          List installed apps
//!   install       Side-load a channel package (.zip)
//!   screenshot    Capture the current screen
//!   console       Print recent debug console output
//!   debug         Send a command to the debug console
//! ```
//!
//! # Configuration
//!
//! Settings are layered: built-in defaults, then the optional `--config` TOML
//! file, then flags / environment variables.
//!
//! | Variable                  | Default     | Description                        |
//! |---------------------------|-------------|------------------------------------|
//! | `BRS_HOST`                | `127.0.0.1` | Simulator host                     |
//! | `BRS_ECP_PORT`            | `8060`      | ECP port                           |
//! | `BRS_WEB_PORT`            | `8888`      | Web installer port (`0` means 80)  |
//! | `BRS_CONSOLE_PORT`        | `8085`      | Debug console port                 |
//! | `BRS_WEB_PASSWORD`        | `rokudev`   | Installer password                 |
//! | `BRS_SCREENSHOT_DELAY_MS` | `500`       | Wait before fetching a screenshot  |
//! | `BRS_KEYPRESS_DELAY_MS`   | `300`       | Pause between keys of a sequence   |
//!
//! Log output goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use brs_core::{KeyAction, SimulatorConfig};
use brs_remote::application::status::{check_simulator, Service};
use brs_remote::application::{catalog, navigation};
use brs_remote::infrastructure::{ConsoleClient, InstallerClient, RemoteControlClient, Screenshot};
use brs_remote::ClientError;

/// Settle time before the screenshot that follows an install or app launch.
const APP_SETTLE_DELAY_MS: u64 = 2000;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote control, installer and debug console client for a BrightScript simulator.
#[derive(Debug, Parser)]
#[command(name = "brs-remote", version)]
struct Cli {
    /// TOML file with simulator settings; flags and environment override it.
    #[arg(long, global = true, env = "BRS_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of the simulator.
    #[arg(long, global = true, env = "BRS_HOST")]
    host: Option<String>,

    /// ECP (remote control) port.
    #[arg(long, global = true, env = "BRS_ECP_PORT")]
    ecp_port: Option<u16>,

    /// Web installer port.
    #[arg(long, global = true, env = "BRS_WEB_PORT")]
    web_port: Option<u16>,

    /// Debug console port.
    #[arg(long, global = true, env = "BRS_CONSOLE_PORT")]
    console_port: Option<u16>,

    /// Password of the installer's developer account.
    #[arg(long, global = true, env = "BRS_WEB_PASSWORD", hide_env_values = true)]
    web_password: Option<String>,

    /// Wait between requesting and fetching a screenshot, in ms.
    #[arg(long, global = true, env = "BRS_SCREENSHOT_DELAY_MS")]
    screenshot_delay_ms: Option<u64>,

    /// Default pause between keys of a sequence, in ms.
    #[arg(long, global = true, env = "BRS_KEYPRESS_DELAY_MS")]
    keypress_delay_ms: Option<u64>,

    /// Print query results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report which simulator services are reachable.
    Status,

    /// Send one remote-control key event.
    Key {
        /// Key name such as Home, Select, Left or Lit_a.
        key: String,
        /// press, down or up.
        #[arg(long, default_value = "press")]
        action: KeyAction,
        #[command(flatten)]
        shot: AfterShot,
    },

    /// Press several keys in order.
    Keys {
        #[arg(required = true)]
        keys: Vec<String>,
        /// Pause between keys, in ms [default: keypress delay].
        #[arg(long)]
        delay_ms: Option<u64>,
        #[command(flatten)]
        shot: AfterShot,
    },

    /// Type text one character at a time.
    Type {
        text: String,
        /// Pause between characters, in ms.
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
        /// Press Enter afterwards.
        #[arg(long)]
        submit: bool,
        #[command(flatten)]
        shot: AfterShot,
    },

    /// Launch an installed app.
    Launch {
        /// App id, e.g. `dev` for the side-loaded channel.
        app_id: String,
        /// Launch parameter as KEY=VALUE; may be repeated.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        #[command(flatten)]
        shot: AfterShot,
    },

    /// Show the device configuration.
    DeviceInfo,

    /// Show the foreground app.
    ActiveApp,

    /// List installed apps.
    Apps,

    /// Side-load a channel package (.zip).
    Install {
        package: PathBuf,
        #[command(flatten)]
        shot: AfterShot,
    },

    /// Capture the current screen.
    Screenshot {
        /// Output file; the extension follows the captured format.
        #[arg(short, long, default_value = "screenshot.png")]
        output: PathBuf,
    },

    /// Print recent debug console output.
    Console {
        /// Number of lines to print.
        #[arg(long, default_value_t = 50)]
        lines: usize,
        /// Time to collect output after connecting, in ms.
        #[arg(long, default_value_t = 500)]
        wait_ms: u64,
    },

    /// Send a command to the debug console and print what it answers.
    Debug {
        /// Console command, e.g. `bt`, `var` or `cont`.
        command: String,
        /// Time to collect the answer, in ms.
        #[arg(long, default_value_t = 1000)]
        wait_ms: u64,
    },
}

/// Optional screenshot taken after an action.
#[derive(Debug, Args)]
struct AfterShot {
    /// Save a screenshot to this file afterwards.
    #[arg(long)]
    screenshot: Option<PathBuf>,
    /// Wait before that screenshot, in ms.
    #[arg(long)]
    screenshot_wait_ms: Option<u64>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

impl Cli {
    /// Layers the config file and explicit overrides over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or parsed.
    fn simulator_config(&self) -> anyhow::Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => SimulatorConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.ecp_port {
            config.ecp_port = port;
        }
        if let Some(port) = self.web_port {
            config.web_port = port;
        }
        if let Some(port) = self.console_port {
            config.console_port = port;
        }
        if let Some(password) = &self.web_password {
            config.web_password = password.clone();
        }
        if let Some(ms) = self.screenshot_delay_ms {
            config.screenshot_delay_ms = ms;
        }
        if let Some(ms) = self.keypress_delay_ms {
            config.keypress_delay_ms = ms;
        }
        Ok(config)
    }
}

// ── Error hints ───────────────────────────────────────────────────────────────

/// Attaches the "start the simulator with --flag" hint to unreachable errors.
trait ServiceHint<T> {
    fn hint(self, service: Service) -> anyhow::Result<T>;
}

impl<T> ServiceHint<T> for Result<T, ClientError> {
    fn hint(self, service: Service) -> anyhow::Result<T> {
        self.map_err(|e| {
            if e.is_unreachable() {
                anyhow::Error::new(e)
                    .context(format!("{} is not reachable. {}.", service.label(), service.hint()))
            } else {
                e.into()
            }
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.simulator_config()?;
    info!(
        "simulator at {} (ecp={}, web={}, console={})",
        config.host,
        config.ecp_port,
        config.installer_port(),
        config.console_port
    );

    run(cli.command, &config, cli.json).await
}

async fn run(command: Command, config: &SimulatorConfig, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let ecp = RemoteControlClient::new(config)?;
            let installer = InstallerClient::new(config)?;
            let console = ConsoleClient::new(config);
            let status = check_simulator(config, &ecp, &installer, &console).await;
            console.disconnect().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{status}");
            }
        }

        Command::Key { key, action, shot } => {
            let ecp = RemoteControlClient::new(config)?;
            ecp.send_key(&key, action).await.hint(Service::Ecp)?;
            println!("Key {action}: {key}");
            shot.take(config, config.screenshot_delay_ms).await?;
        }

        Command::Keys {
            keys,
            delay_ms,
            shot,
        } => {
            let ecp = RemoteControlClient::new(config)?;
            let delay = delay_ms.map_or_else(|| config.keypress_delay(), Duration::from_millis);
            navigation::press_sequence(&ecp, keys.as_slice(), delay)
                .await
                .hint(Service::Ecp)?;
            println!("Pressed {} keys: {}", keys.len(), keys.join(", "));
            shot.take(config, config.screenshot_delay_ms).await?;
        }

        Command::Type {
            text,
            delay_ms,
            submit,
            shot,
        } => {
            let ecp = RemoteControlClient::new(config)?;
            navigation::type_text(&ecp, &text, Duration::from_millis(delay_ms), submit)
                .await
                .hint(Service::Ecp)?;
            let suffix = if submit { " and pressed Enter" } else { "" };
            println!("Typed \"{text}\"{suffix}");
            shot.take(config, config.screenshot_delay_ms).await?;
        }

        Command::Launch {
            app_id,
            params,
            shot,
        } => {
            let ecp = RemoteControlClient::new(config)?;
            ecp.launch_app(&app_id, params).await.hint(Service::Ecp)?;
            println!("Launched {app_id}");
            shot.take(config, APP_SETTLE_DELAY_MS).await?;
        }

        Command::DeviceInfo => {
            let ecp = RemoteControlClient::new(config)?;
            let xml = ecp.query_device_info().await.hint(Service::Ecp)?;
            let info = catalog::parse_device_info(&xml);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else if info.is_empty() {
                println!("{xml}");
            } else {
                println!("{info}");
            }
        }

        Command::ActiveApp => {
            let ecp = RemoteControlClient::new(config)?;
            let xml = ecp.query_active_app().await.hint(Service::Ecp)?;
            let app = catalog::parse_active_app(&xml);
            if json {
                println!("{}", serde_json::to_string_pretty(&app)?);
            } else {
                match app {
                    Some(app) => println!("Active app: {} (ID: {})", app.name, app.id),
                    None => println!("No active app"),
                }
            }
        }

        Command::Apps => {
            let ecp = RemoteControlClient::new(config)?;
            let xml = ecp.query_apps().await.hint(Service::Ecp)?;
            let apps = catalog::parse_apps(&xml);
            if json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else if apps.is_empty() {
                println!("No apps found");
            } else {
                for app in &apps {
                    println!("{app}");
                }
            }
        }

        Command::Install { package, shot } => {
            let installer = InstallerClient::new(config)?;
            let outcome = installer
                .install_package(&package)
                .await
                .hint(Service::Installer)?;
            println!("{outcome}");
            shot.take(config, APP_SETTLE_DELAY_MS).await?;
        }

        Command::Screenshot { output } => {
            let installer = InstallerClient::new(config)?;
            let shot = installer
                .capture_screenshot()
                .await
                .hint(Service::Installer)?;
            save_screenshot(&shot, &output).await?;
        }

        Command::Console { lines, wait_ms } => {
            let console = ConsoleClient::new(config);
            console.connect().await.hint(Service::Console)?;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            let recent = console.get_recent_lines(lines);
            console.disconnect().await;
            if recent.is_empty() {
                println!("(no console output)");
            } else {
                println!("{}", recent.join("\n"));
            }
        }

        Command::Debug { command, wait_ms } => {
            let console = ConsoleClient::new(config);
            let result = console
                .send_command(&command, Duration::from_millis(wait_ms))
                .await;
            console.disconnect().await;
            let output = result.hint(Service::Console)?;
            if output.is_empty() {
                println!("(no output)");
            } else {
                println!("{output}");
            }
        }
    }
    Ok(())
}

impl AfterShot {
    /// Captures and saves a screenshot if `--screenshot` was given.
    async fn take(&self, config: &SimulatorConfig, default_wait_ms: u64) -> anyhow::Result<()> {
        let Some(output) = &self.screenshot else {
            return Ok(());
        };
        let wait = self.screenshot_wait_ms.unwrap_or(default_wait_ms);
        tokio::time::sleep(Duration::from_millis(wait)).await;

        let installer = InstallerClient::new(config)?;
        let shot = installer
            .capture_screenshot()
            .await
            .hint(Service::Installer)?;
        save_screenshot(&shot, output).await
    }
}

/// `output` with its extension replaced by the one matching the image format.
fn screenshot_path(output: &Path, shot: &Screenshot) -> PathBuf {
    output.with_extension(shot.format.extension())
}

async fn save_screenshot(shot: &Screenshot, output: &Path) -> anyhow::Result<()> {
    let path = screenshot_path(output, shot);
    tokio::fs::write(&path, &shot.data)
        .await
        .with_context(|| format!("failed to write screenshot to {}", path.display()))?;
    println!(
        "Saved {} screenshot ({} bytes) to {}",
        shot.format.mime_type(),
        shot.data.len(),
        path.display()
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
