//! Console front end for the relay panel.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use relay_panel::config::{ModuleSource, PanelConfig};
use relay_panel::panel::{ConsoleRenderer, HELP, Panel, read_commands};

#[derive(Debug, Parser)]
#[command(
    name = "relay-panel",
    about = "Drive a compute module and a JSON WebSocket relay from the console"
)]
struct Cli {
    /// JSON config file; command-line flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// WebSocket server URL.
    #[arg(long, env = "RELAY_PANEL_URL")]
    url: Option<String>,

    /// Compute module: `builtin`, a path to an ES module, or an http(s) URL.
    #[arg(long, env = "RELAY_PANEL_MODULE")]
    module: Option<ModuleSource>,

    /// Name of the exported startup hook of a script module.
    #[arg(long)]
    start_hook: Option<String>,

    /// Leave an element off the page (repeatable).
    #[arg(long = "without", value_name = "ID")]
    without: Vec<String>,
}

impl Cli {
    fn into_config(self) -> Result<PanelConfig> {
        let mut config = match &self.config {
            Some(path) => PanelConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => PanelConfig::default(),
        };

        if let Some(url) = self.url {
            config = config.with_ws_url(url);
        }
        if let Some(module) = self.module {
            config = config.with_module(module);
        }
        if let Some(start_hook) = self.start_hook {
            config = config.with_start_hook(start_hook);
        }
        for id in self.without {
            config = config.without_element(id);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Cli::parse().into_config()?;
    log::info!("Starting panel against {} with module {}", config.ws_url, config.module);

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(run(config));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(())
}

async fn run(config: PanelConfig) {
    let panel = Panel::start(&config).await;
    println!("{}", HELP);

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(BufReader::new(tokio::io::stdin()), tx));

    let mut renderer = ConsoleRenderer::stdout();
    panel.run(rx, &mut renderer).await;
}
