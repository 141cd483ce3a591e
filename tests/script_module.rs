use std::path::PathBuf;

use relay_panel::bridge::{self, BridgeError, ComputeModule};
use relay_panel::config::{ModuleSource, PanelConfig};
use relay_panel::js::ScriptError;
use relay_panel::panel::{Document, Panel, UiEvent, ids};

fn demo(name: &str) -> ModuleSource {
    ModuleSource::Path(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name))
}

#[tokio::test]
async fn script_module_runs_with_relative_import() {
    let mut document = Document::full();
    let module = bridge::initialize(&demo("compute.mjs"), "run_main", &mut document)
        .await
        .expect("module should initialize");

    assert_eq!(document.status(), Some("Startup hook complete. UI is ready."));
    assert_eq!(
        module.compute_text("world").await.unwrap(),
        "Hello, world from JavaScript!"
    );
    assert_eq!(module.compute_sum(2, 3).await.unwrap(), 5);
    assert_eq!(module.compute_sum(i32::MAX, 1).await.unwrap(), i32::MIN);
}

#[tokio::test]
async fn calls_before_start_fail_in_script() {
    let module = ComputeModule::load(&demo("compute.mjs"), "run_main").await.unwrap();
    let err = module.compute_text("world").await.unwrap_err();
    assert!(
        matches!(&err, BridgeError::Script(ScriptError::Js(message)) if message.contains("before run_main")),
        "{err}"
    );
}

#[tokio::test]
async fn missing_start_hook_fails_initialization() {
    let mut document = Document::full();
    let result = bridge::initialize(&demo("compute.mjs"), "boot", &mut document).await;

    assert!(result.is_none());
    assert_eq!(
        document.status(),
        Some("Error initializing compute module: module does not export `boot`")
    );
}

#[tokio::test]
async fn panel_uses_script_module() {
    let config = PanelConfig::default().with_module(demo("compute.mjs"));
    let mut panel = Panel::start(&config).await;
    assert!(panel.has_bridge());

    panel.handle_ui(UiEvent::input(ids::NAME_INPUT, "panel")).await;
    panel.handle_ui(UiEvent::click(ids::GREET_BUTTON)).await;
    assert_eq!(
        panel.document().value(ids::GREET_RESULT),
        Some("Hello, panel from JavaScript!")
    );

    panel.handle_ui(UiEvent::input(ids::NUM_A, "-4")).await;
    panel.handle_ui(UiEvent::input(ids::NUM_B, "10")).await;
    panel.handle_ui(UiEvent::click(ids::ADD_BUTTON)).await;
    assert_eq!(panel.document().value(ids::ADD_RESULT), Some("6"));
}

#[tokio::test]
async fn syntax_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.mjs");
    std::fs::write(&path, "export function greet( {").unwrap();

    let mut document = Document::full();
    let result = bridge::initialize(&ModuleSource::Path(path), "run_main", &mut document).await;

    assert!(result.is_none());
    assert!(
        document
            .status()
            .unwrap()
            .starts_with("Error initializing compute module: JavaScript error:")
    );
}

#[tokio::test]
async fn non_callable_export_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.mjs");
    std::fs::write(&path, "export const run_main = 42;").unwrap();

    let err = match ComputeModule::load(&ModuleSource::Path(path), "run_main").await {
        Ok(module) => module.start().await.unwrap_err(),
        Err(e) => panic!("load failed: {e}"),
    };
    assert!(matches!(err, BridgeError::Script(ScriptError::NotCallable(ref name)) if name == "run_main"));
}

#[tokio::test]
async fn demo_config_finds_its_module() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join("panel.json");
    let config = PanelConfig::from_file(&path).unwrap();
    assert_eq!(config.module, demo("compute.mjs"));

    let panel = Panel::start(&config).await;
    assert!(panel.has_bridge());
    assert_eq!(panel.document().status(), Some("Startup hook complete. UI is ready."));
}
