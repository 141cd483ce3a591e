//! # Relay Panel
//!
//! A console control panel that hosts a compute module (built in, or an ES
//! module run on an embedded Boa engine) and talks JSON to a WebSocket relay.
//!
//! ## Example
//!
//! ```no_run
//! use relay_panel::config::PanelConfig;
//! use relay_panel::panel::{ConsoleRenderer, Panel, read_commands};
//!
//! #[tokio::main]
//! async fn main() {
//!     let panel = Panel::start(&PanelConfig::default()).await;
//!
//!     let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     tokio::spawn(read_commands(stdin, tx));
//!
//!     panel.run(rx, &mut ConsoleRenderer::stdout()).await;
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod js;
pub mod panel;
pub mod socket;
