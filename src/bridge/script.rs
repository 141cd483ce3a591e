//! A compute module written as an ES module and run in the JS engine.

use std::path::Path;

use crate::bridge::BridgeError;
use crate::js::{JsEngine, JsEngineClient, ScriptArg, ScriptValue};

pub struct ScriptModule {
    client: JsEngineClient,
    start_hook: String,
    // Keeps the engine thread alive for as long as the module is usable.
    _engine: JsEngine,
}

impl ScriptModule {
    /// Read a module from disk and evaluate it.
    pub async fn from_path(path: &Path, start_hook: &str) -> Result<Self, BridgeError> {
        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|source| BridgeError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| BridgeError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::evaluate(&path.to_string_lossy(), source, start_hook).await
    }

    /// Fetch a module over HTTP and evaluate it.
    pub async fn from_url(url: &str, start_hook: &str) -> Result<Self, BridgeError> {
        let source = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| BridgeError::Fetch(e.to_string()))?
            .text()
            .await
            .map_err(|e| BridgeError::Fetch(e.to_string()))?;
        Self::evaluate(url, source, start_hook).await
    }

    /// Evaluate module text; `specifier` anchors its relative imports.
    pub async fn evaluate(specifier: &str, source: String, start_hook: &str) -> Result<Self, BridgeError> {
        let engine = JsEngine::start();
        let client = engine.client();
        client.load_module(specifier, source).await?;
        Ok(Self {
            client,
            start_hook: start_hook.to_string(),
            _engine: engine,
        })
    }

    pub async fn start(&self) -> Result<(), BridgeError> {
        self.client.call(self.start_hook.as_str(), Vec::new()).await?;
        Ok(())
    }

    pub async fn greet(&self, name: &str) -> Result<String, BridgeError> {
        match self
            .client
            .call("greet", vec![ScriptArg::Text(name.to_string())])
            .await?
        {
            ScriptValue::Text(text) => Ok(text),
            other => Err(BridgeError::UnexpectedReturn {
                export: "greet",
                found: other,
            }),
        }
    }

    pub async fn add(&self, a: i32, b: i32) -> Result<i32, BridgeError> {
        match self
            .client
            .call("add", vec![ScriptArg::Int(a), ScriptArg::Int(b)])
            .await?
        {
            ScriptValue::Number(n)
                if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) =>
            {
                Ok(n as i32)
            }
            other => Err(BridgeError::UnexpectedReturn {
                export: "add",
                found: other,
            }),
        }
    }
}
