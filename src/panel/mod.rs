//! # Panel
//!
//! The UI surface and the event loop that drives it.
//!
//! ## Example
//!
//! ```no_run
//! use relay_panel::config::PanelConfig;
//! use relay_panel::panel::{Panel, UiEvent, ids};
//!
//! # async fn demo() {
//! let mut panel = Panel::start(&PanelConfig::default()).await;
//! panel.handle_ui(UiEvent::input(ids::NAME_INPUT, "world")).await;
//! panel.handle_ui(UiEvent::click(ids::GREET_BUTTON)).await;
//! assert_eq!(
//!     panel.document().value(ids::GREET_RESULT),
//!     Some("Hello, world from Rust!")
//! );
//! # }
//! ```

mod app;
mod console;
mod document;

pub use app::{Action, CLOSE_GRACE, Panel, Renderer, Request, UiEvent, parse_int};
pub use console::{ConsoleCommand, ConsoleRenderer, HELP, parse_command, read_commands};
pub use document::{Document, Element, ElementKind, LAYOUT, Surface, ids};
