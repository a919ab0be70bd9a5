//! Capability providers for desktop automation.
//!
//! Defines the provider interfaces (screenshot, pointer, keyboard, platform
//! info), host platform detection, and the factory that selects concrete
//! backends exactly once per process. OS-specific mechanics live behind the
//! traits; the dispatch layer only ever sees a [`ProviderBundle`].

mod capability;
pub mod doubles;
mod factory;
mod platform;
mod retry;
mod x11;

pub use capability::{
    Capability, Captured, KeyboardProvider, PlatformInfoProvider, PointerButton, PointerProvider,
    ProviderBundle, ProviderError, ScreenshotProvider, ScrollDirection,
};
pub use factory::{DetectedPlatformInfo, ProviderFactory};
pub use platform::{
    detect_platform, detect_platform_from, DisplayServer, OsFamily, PlatformDescriptor,
};
pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use x11::{X11Keyboard, X11Pointer, X11Screenshot};
