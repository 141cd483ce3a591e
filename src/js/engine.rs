//! JavaScript Engine
//!
//! Owns the Boa context on a dedicated worker thread. The context is not
//! `Send`, so everything that touches it happens inside [`run_js_loop`].

use boa_engine::builtins::promise::PromiseState;
use boa_engine::{Context, JsError, JsString, JsValue, Module, Source};
use boa_runtime::extensions::{ConsoleExtension, MicrotaskExtension, TimeoutExtension};
use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

use super::esm::FetchModuleLoader;
use super::{JsEngineClient, ScriptArg, ScriptError, ScriptValue};

/// Commands that can be sent to the JS engine thread.
#[derive(Debug)]
pub enum JsCommand {
    /// Evaluate an ES module and make it the target of later calls.
    LoadModule {
        specifier: String,
        source: String,
        reply: oneshot::Sender<Result<(), ScriptError>>,
    },
    /// Call an exported function of the loaded module.
    Call {
        export: String,
        args: Vec<ScriptArg>,
        reply: oneshot::Sender<Result<ScriptValue, ScriptError>>,
    },
    /// Shutdown the JS engine.
    Shutdown,
}

/// JavaScript engine with dedicated worker thread.
pub struct JsEngine {
    client: JsEngineClient,
    _handle: JoinHandle<()>,
}

impl JsEngine {
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::channel();
        let client = JsEngineClient { sender };

        let handle = thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run_js_loop(receiver);
            }));

            if let Err(e) = result {
                log::error!("JS engine panicked: {:?}", e);
            }
        });

        Self {
            client,
            _handle: handle,
        }
    }

    /// Get a client handle for communicating with the engine.
    pub fn client(&self) -> JsEngineClient {
        self.client.clone()
    }
}

impl Drop for JsEngine {
    fn drop(&mut self) {
        self.client.shutdown();
    }
}

fn build_context() -> Result<Context, JsError> {
    let mut context = Context::builder()
        .module_loader(Rc::new(FetchModuleLoader::new()))
        .build()?;

    boa_runtime::register(
        (
            ConsoleExtension::default(),
            TimeoutExtension {},
            MicrotaskExtension {},
        ),
        None,
        &mut context,
    )?;

    Ok(context)
}

/// Main loop for the JS engine thread.
fn run_js_loop(receiver: Receiver<JsCommand>) {
    log::info!("JS engine thread started");

    let mut context = match build_context() {
        Ok(context) => context,
        Err(e) => {
            // Dropping the receiver fails every pending and future command.
            log::error!("Failed to build JS context: {}", e);
            return;
        }
    };
    let mut entry: Option<Module> = None;

    loop {
        match receiver.recv() {
            Ok(JsCommand::LoadModule {
                specifier,
                source,
                reply,
            }) => {
                log::info!("Loading ES module {} ({} bytes)...", specifier, source.len());
                let result = load_module(&mut context, &specifier, &source).map(|module| {
                    entry = Some(module);
                });
                if reply.send(result).is_err() {
                    log::warn!("Load reply for {} was dropped", specifier);
                }
            }
            Ok(JsCommand::Call {
                export,
                args,
                reply,
            }) => {
                log::debug!("Calling export {} with {:?}", export, args);
                let result = match &entry {
                    Some(module) => call_export(&mut context, module, &export, &args),
                    None => Err(ScriptError::NoModule),
                };
                if reply.send(result).is_err() {
                    log::warn!("Call reply for {} was dropped", export);
                }
            }
            Ok(JsCommand::Shutdown) => {
                log::info!("JS engine shutting down");
                break;
            }
            Err(_) => {
                log::debug!("All JS engine clients dropped");
                break;
            }
        }
    }

    log::info!("JS engine thread stopped");
}

fn js_error(e: JsError) -> ScriptError {
    ScriptError::Js(e.to_string())
}

fn load_module(context: &mut Context, specifier: &str, source: &str) -> Result<Module, ScriptError> {
    let source = Source::from_bytes(source.as_bytes()).with_path(Path::new(specifier));
    let module = Module::parse(source, None, context).map_err(js_error)?;
    let promise = module.load_link_evaluate(context);

    flush_event_loop(context);

    match promise.state() {
        PromiseState::Fulfilled(_) => {}
        PromiseState::Rejected(reason) => {
            return Err(ScriptError::Js(reason.display().to_string()));
        }
        PromiseState::Pending => return Err(ScriptError::Unsettled(specifier.to_string())),
    }

    if let Some(loader) = context.downcast_module_loader::<FetchModuleLoader>() {
        loader.insert(specifier, module.clone());
    }

    Ok(module)
}

fn call_export(
    context: &mut Context,
    module: &Module,
    export: &str,
    args: &[ScriptArg],
) -> Result<ScriptValue, ScriptError> {
    let namespace = module.namespace(context);
    let value = namespace
        .get(JsString::from(export), context)
        .map_err(js_error)?;

    let Some(function) = value.as_callable() else {
        return Err(if value.is_undefined() {
            ScriptError::MissingExport(export.to_string())
        } else {
            ScriptError::NotCallable(export.to_string())
        });
    };

    let args: Vec<JsValue> = args.iter().map(to_js).collect();
    let result = function
        .call(&JsValue::undefined(), &args, context)
        .map_err(js_error)?;

    flush_event_loop(context);

    Ok(from_js(&result))
}

fn to_js(arg: &ScriptArg) -> JsValue {
    match arg {
        ScriptArg::Text(text) => JsValue::from(JsString::from(text.as_str())),
        ScriptArg::Int(n) => JsValue::from(*n),
    }
}

fn from_js(value: &JsValue) -> ScriptValue {
    if value.is_undefined() || value.is_null() {
        ScriptValue::Undefined
    } else if let Some(text) = value.as_string() {
        ScriptValue::Text(text.to_std_string_escaped())
    } else if let Some(n) = value.as_number() {
        ScriptValue::Number(n)
    } else if let Some(b) = value.as_boolean() {
        ScriptValue::Bool(b)
    } else {
        ScriptValue::Other(value.display().to_string())
    }
}

/// Run pending microtasks (jobs) and due timers.
fn flush_event_loop(context: &mut Context) {
    if let Err(e) = context.run_jobs() {
        log::error!("Error running Boa jobs: {}", e);
    }
}
