//! The compute module compiled into the binary.

use once_cell::sync::OnceCell;

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeModule;

impl NativeModule {
    /// Route panics to the error log. Installed at most once per process.
    pub fn start(&self) {
        PANIC_HOOK.get_or_init(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                log::error!("panic: {}", info);
                previous(info);
            }));
            log::debug!("Panic hook installed");
        });
    }

    pub fn greet(&self, name: &str) -> String {
        format!("Hello, {} from Rust!", name)
    }

    /// 32-bit addition that wraps on overflow.
    pub fn add(&self, a: i32, b: i32) -> i32 {
        a.wrapping_add(b)
    }
}
