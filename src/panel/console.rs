//! Console front end: typed commands in, log and status lines out.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::panel::app::{Renderer, Request, UiEvent};
use crate::panel::document::{Document, ids};

pub const HELP: &str = "\
Commands:
  connect | disconnect         open or close the WebSocket
  send <text>                  send a text message (button)
  enter <text>                 send a text message (Enter key)
  settings                     request the server settings
  greet <name>                 call the text function
  add <a> <b>                  call the sum function
  click <id> | type <id> <text> | key <id> <key>
  status | log | help | quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Send(String),
    Enter(String),
    Settings,
    Greet(String),
    Add(String, String),
    Click(String),
    Type(String, String),
    Key(String, String),
    Status,
    Log,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// The panel requests this command stands for; `Help` has none.
    pub fn into_requests(self) -> Vec<Request> {
        use ConsoleCommand::*;

        let ui = |events: Vec<UiEvent>| -> Vec<Request> { events.into_iter().map(Request::Ui).collect() };
        match self {
            Connect => ui(vec![UiEvent::click(ids::WS_CONNECT)]),
            Disconnect => ui(vec![UiEvent::click(ids::WS_DISCONNECT)]),
            Send(text) => ui(vec![
                UiEvent::input(ids::WS_MESSAGE, text),
                UiEvent::click(ids::WS_SEND),
            ]),
            Enter(text) => ui(vec![
                UiEvent::input(ids::WS_MESSAGE, text),
                UiEvent::key(ids::WS_MESSAGE, "Enter"),
            ]),
            Settings => ui(vec![UiEvent::click(ids::GET_SETTINGS)]),
            Greet(name) => ui(vec![
                UiEvent::input(ids::NAME_INPUT, name),
                UiEvent::click(ids::GREET_BUTTON),
            ]),
            Add(a, b) => ui(vec![
                UiEvent::input(ids::NUM_A, a),
                UiEvent::input(ids::NUM_B, b),
                UiEvent::click(ids::ADD_BUTTON),
            ]),
            Click(id) => ui(vec![UiEvent::Click(id)]),
            Type(id, text) => ui(vec![UiEvent::Input { id, value: text }]),
            Key(id, key) => ui(vec![UiEvent::Key { id, key }]),
            Status => vec![Request::ShowStatus],
            Log => vec![Request::ShowLog],
            Help => Vec::new(),
            Quit => vec![Request::Quit],
        }
    }
}

/// Parse one input line. Blank lines parse to `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let two = |what: &str| -> Result<(String, String), String> {
        match rest.split_once(char::is_whitespace) {
            Some((first, second)) => Ok((first.to_string(), second.trim().to_string())),
            None => Err(format!("usage: {}", what)),
        }
    };

    let command = match verb {
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "send" => ConsoleCommand::Send(rest.to_string()),
        "enter" => ConsoleCommand::Enter(rest.to_string()),
        "settings" => ConsoleCommand::Settings,
        "greet" => ConsoleCommand::Greet(rest.to_string()),
        "add" => {
            let (a, b) = two("add <a> <b>")?;
            ConsoleCommand::Add(a, b)
        }
        "click" if !rest.is_empty() => ConsoleCommand::Click(rest.to_string()),
        "click" => return Err("usage: click <id>".to_string()),
        "type" => match two("type <id> <text>") {
            Ok((id, text)) => ConsoleCommand::Type(id, text),
            Err(_) if !rest.is_empty() => ConsoleCommand::Type(rest.to_string(), String::new()),
            Err(e) => return Err(e),
        },
        "key" => {
            let (id, key) = two("key <id> <key>")?;
            ConsoleCommand::Key(id, key)
        }
        "status" => ConsoleCommand::Status,
        "log" => ConsoleCommand::Log,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(Some(command))
}

/// Read commands from `input` and forward them to the panel until EOF or
/// `quit`. Help and parse errors are answered directly on stdout.
pub async fn read_commands(input: impl AsyncBufRead + Unpin, requests: mpsc::UnboundedSender<Request>) {
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
            Ok(Some(command)) => {
                let quit = command == ConsoleCommand::Quit;
                for request in command.into_requests() {
                    if requests.send(request).is_err() {
                        return;
                    }
                }
                if quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }

    let _ = requests.send(Request::Quit);
}

/// Prints new log-area entries and status changes as they happen.
pub struct ConsoleRenderer<W: Write> {
    out: W,
}

impl ConsoleRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            log::warn!("Failed to write to console: {}", e);
        }
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn render(&mut self, document: &mut Document) {
        let status = document.take_status_change().map(str::to_owned);
        let entries = document.take_new_log_entries().to_vec();
        for entry in entries {
            self.write(&format!("| {}", entry.replace('\n', "\n| ")));
        }
        if let Some(status) = status {
            self.write(&format!("[status] {}", status));
        }
    }

    fn show_status(&mut self, document: &Document) {
        let mut lines = vec![format!("[status] {}", document.status().unwrap_or("N/A"))];
        for id in document.ids() {
            if let Some(element) = document.element(id) {
                let state = if element.enabled { "enabled" } else { "disabled" };
                lines.push(format!("  {:<14} {:<8} {}", id, state, element.value));
            }
        }
        self.write(&lines.join("\n"));
    }

    fn show_log(&mut self, document: &Document) {
        let log = document.log_entries().join("\n");
        self.write(&log);
    }
}
