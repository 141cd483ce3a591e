//! Bridge Initializer
//!
//! Loads the compute module, runs its startup hook and exposes its two
//! functions to the panel's handlers.

mod native;
mod script;

pub use native::NativeModule;
pub use script::ScriptModule;

use crate::config::ModuleSource;
use crate::js::{ScriptError, ScriptValue};
use crate::panel::Surface;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to read module '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to fetch module: {0}")]
    Fetch(String),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("`{export}` returned an unexpected value: {found:?}")]
    UnexpectedReturn {
        export: &'static str,
        found: ScriptValue,
    },
}

/// A loaded compute module.
pub enum ComputeModule {
    Native(NativeModule),
    Script(ScriptModule),
}

impl ComputeModule {
    /// Load (but do not start) the module named by `source`.
    pub async fn load(source: &ModuleSource, start_hook: &str) -> Result<Self, BridgeError> {
        match source {
            ModuleSource::Builtin => Ok(ComputeModule::Native(NativeModule)),
            ModuleSource::Path(path) => Ok(ComputeModule::Script(
                ScriptModule::from_path(path, start_hook).await?,
            )),
            ModuleSource::Url(url) => Ok(ComputeModule::Script(
                ScriptModule::from_url(url, start_hook).await?,
            )),
        }
    }

    /// Run the startup hook. Must succeed before any other call.
    pub async fn start(&self) -> Result<(), BridgeError> {
        match self {
            ComputeModule::Native(module) => {
                module.start();
                Ok(())
            }
            ComputeModule::Script(module) => module.start().await,
        }
    }

    pub async fn compute_text(&self, name: &str) -> Result<String, BridgeError> {
        match self {
            ComputeModule::Native(module) => Ok(module.greet(name)),
            ComputeModule::Script(module) => module.greet(name).await,
        }
    }

    pub async fn compute_sum(&self, a: i32, b: i32) -> Result<i32, BridgeError> {
        match self {
            ComputeModule::Native(module) => Ok(module.add(a, b)),
            ComputeModule::Script(module) => module.add(a, b).await,
        }
    }
}

/// Load and start the compute module, reporting progress to `ui`.
///
/// Returns `None` on any failure, leaving the compute features unavailable.
pub async fn initialize(
    source: &ModuleSource,
    start_hook: &str,
    ui: &mut impl Surface,
) -> Option<ComputeModule> {
    ui.set_status("Loading compute module...");

    let result = async {
        let module = ComputeModule::load(source, start_hook).await?;
        ui.set_status("Compute module loaded. Running startup hook...");
        module.start().await?;
        Ok::<_, BridgeError>(module)
    }
    .await;

    match result {
        Ok(module) => {
            ui.set_status("Startup hook complete. UI is ready.");
            log::info!("Compute module initialized from {}", source);
            Some(module)
        }
        Err(e) => {
            log::error!("Error initializing compute module: {}", e);
            ui.set_status(&format!("Error initializing compute module: {}", e));
            None
        }
    }
}
