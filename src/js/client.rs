use std::sync::mpsc;

use tokio::sync::oneshot;

use crate::js::{JsCommand, ScriptArg, ScriptError, ScriptValue};

/// Client handle for communicating with the JS engine thread.
///
/// Cheap to clone; every request is answered through a one-shot channel so
/// callers can await it without blocking their own thread.
#[derive(Clone)]
pub struct JsEngineClient {
    pub sender: mpsc::Sender<JsCommand>,
}

impl JsEngineClient {
    /// Evaluate `source` as the ES module named `specifier`.
    pub async fn load_module(
        &self,
        specifier: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), ScriptError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(JsCommand::LoadModule {
                specifier: specifier.into(),
                source: source.into(),
                reply,
            })
            .map_err(|_| ScriptError::EngineGone)?;
        rx.await.map_err(|_| ScriptError::EngineGone)?
    }

    /// Call an exported function of the loaded module.
    pub async fn call(
        &self,
        export: impl Into<String>,
        args: Vec<ScriptArg>,
    ) -> Result<ScriptValue, ScriptError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(JsCommand::Call {
                export: export.into(),
                args,
                reply,
            })
            .map_err(|_| ScriptError::EngineGone)?;
        rx.await.map_err(|_| ScriptError::EngineGone)?
    }

    /// Shutdown the JS engine.
    pub fn shutdown(&self) {
        let _ = self.sender.send(JsCommand::Shutdown);
    }
}
