use boa_engine::module::ModuleLoader;
use boa_engine::{Context, JsError, JsNativeError, JsObject, JsString, Module, Source};
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::runtime::{self, Runtime};

/// Resolves `import` specifiers against the importing module and loads them
/// from disk or over HTTP. Every resolved module is cached by specifier.
pub(crate) struct FetchModuleLoader {
    runtime: OnceCell<Runtime>,
    local_modules: RefCell<HashMap<String, Module>>,
}

impl FetchModuleLoader {
    pub(crate) fn new() -> Self {
        Self {
            runtime: OnceCell::new(),
            local_modules: RefCell::new(HashMap::new()),
        }
    }

    pub fn insert(&self, specifier: impl Into<String>, module: Module) {
        let specifier = specifier.into();
        self.local_modules
            .borrow_mut()
            .insert(specifier.clone(), module);
        log::info!("Cached local module: {}", specifier);
    }

    fn fetch(&self, url: &str) -> Result<String, JsError> {
        // The engine thread has no tokio context of its own.
        let runtime = self.runtime.get_or_try_init(|| {
            runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| type_error(format!("Failed to start fetch runtime: {}", e)))
        })?;

        runtime.block_on(async {
            let response = reqwest::get(url)
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| type_error(format!("Fetch error: {}", e)))?;

            response
                .text()
                .await
                .map_err(|e| type_error(format!("Fetch response error: {}", e)))
        })
    }
}

fn type_error(message: String) -> JsError {
    JsError::from_native(JsNativeError::typ().with_message(message))
}

/// Whether a resolved specifier names an http(s) resource.
pub(crate) fn is_remote(specifier: &str) -> bool {
    url::Url::parse(specifier).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Resolve `specifier` relative to the module at `referrer`.
pub(crate) fn resolve_specifier(referrer: Option<&Path>, specifier: &str) -> String {
    let Some(path) = referrer else {
        return specifier.to_string();
    };

    // Try to resolve as absolute URL, otherwise resolve as relative URL with base.
    if let Ok(base_url) = url::Url::parse(&path.to_string_lossy()) {
        match url::Url::options().base_url(Some(&base_url)).parse(specifier) {
            Ok(new_url) => new_url.to_string(),
            Err(_) => specifier.to_string(),
        }
    } else {
        let base = Path::new(path);
        let joined = if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else {
            base.parent().unwrap_or(base).join(specifier)
        };
        joined.to_string_lossy().to_string()
    }
}

impl ModuleLoader for FetchModuleLoader {
    fn init_import_meta(
        self: Rc<Self>,
        import_meta: &JsObject,
        module: &Module,
        context: &mut Context,
    ) {
        let Some(module_path) = module.path().map(|path| path.to_string_lossy().to_string()) else {
            log::warn!("Module path is None while initializing import_meta");
            return;
        };

        if let Err(e) = import_meta.set(JsString::from("url"), JsString::from(module_path), false, context) {
            log::warn!("Failed to set 'url' in import_meta: {:?}", e);
        }
    }

    async fn load_imported_module(
        self: Rc<Self>,
        referrer: boa_engine::module::Referrer,
        specifier: JsString,
        context: &RefCell<&mut Context>,
    ) -> boa_engine::JsResult<Module> {
        let spec_str = specifier.to_std_string_lossy();
        let resolved_specifier = resolve_specifier(referrer.path(), &spec_str);

        log::debug!("Resolved specifier {} -> {}", spec_str, resolved_specifier);

        if let Some(module) = self.local_modules.borrow().get(&resolved_specifier) {
            log::debug!("Cache hit for module: {}", resolved_specifier);
            return Ok(module.clone());
        }

        let body = if is_remote(&resolved_specifier) {
            self.fetch(&resolved_specifier)?
        } else {
            std::fs::read_to_string(&resolved_specifier)
                .map_err(|e| type_error(format!("Failed to read {}: {}", resolved_specifier, e)))?
        };

        let src = Source::from_bytes(body.as_bytes()).with_path(Path::new(&resolved_specifier));
        let module = Module::parse(src, None, &mut context.borrow_mut())?;

        self.insert(resolved_specifier, module.clone());
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_file_imports() {
        let resolved = resolve_specifier(Some(Path::new("/srv/mods/compute.mjs")), "./format.mjs");
        assert_eq!(Path::new(&resolved), Path::new("/srv/mods/./format.mjs"));

        let absolute = resolve_specifier(Some(Path::new("/srv/mods/compute.mjs")), "/lib/x.mjs");
        assert_eq!(absolute, "/lib/x.mjs");
    }

    #[test]
    fn resolves_relative_url_imports() {
        let resolved = resolve_specifier(
            Some(Path::new("http://localhost:8000/mods/compute.mjs")),
            "./format.mjs",
        );
        assert_eq!(resolved, "http://localhost:8000/mods/format.mjs");
    }

    #[test]
    fn bare_specifier_without_referrer_is_kept() {
        assert_eq!(resolve_specifier(None, "format.mjs"), "format.mjs");
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://example.com/a.mjs"));
        assert!(!is_remote("/tmp/a.mjs"));
        assert!(!is_remote("file:///tmp/a.mjs"));
    }
}
