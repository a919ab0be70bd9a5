//! Provider factory: capability selection, exactly once per process.
//!
//! The factory owns the only retry policy in the system and hands it to the
//! backends it builds. There is no test-mode branch anywhere in here: tests
//! assemble a [`ProviderBundle`] from doubles instead of flipping flags.

use crate::capability::{PlatformInfoProvider, ProviderBundle};
use crate::platform::{DisplayServer, PlatformDescriptor};
use crate::retry::RetryPolicy;
use crate::x11::{X11Keyboard, X11Pointer, X11Screenshot};

/// Platform-info provider backed by the startup detection result.
pub struct DetectedPlatformInfo {
    descriptor: PlatformDescriptor,
}

impl DetectedPlatformInfo {
    pub fn new(descriptor: PlatformDescriptor) -> Self {
        Self { descriptor }
    }
}

impl PlatformInfoProvider for DetectedPlatformInfo {
    fn descriptor(&self) -> &PlatformDescriptor {
        &self.descriptor
    }

    fn display_available(&self) -> bool {
        self.descriptor.display_available()
    }
}

/// Public struct `ProviderFactory` used across Iris components.
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
    retry: RetryPolicy,
}

impl ProviderFactory {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Builds the provider bundle for `descriptor`. A capability whose
    /// backend cannot be constructed on this host is absent from the bundle;
    /// the dispatcher reports unavailability per tool.
    pub fn build(&self, descriptor: &PlatformDescriptor) -> ProviderBundle {
        let platform = Box::new(DetectedPlatformInfo::new(descriptor.clone()));

        match descriptor.display_server {
            Some(DisplayServer::X11) => {
                let screenshot = X11Screenshot::probe(self.retry)
                    .map(|backend| Box::new(backend) as Box<dyn crate::ScreenshotProvider>);
                let pointer = X11Pointer::probe()
                    .map(|backend| Box::new(backend) as Box<dyn crate::PointerProvider>);
                let keyboard = X11Keyboard::probe()
                    .map(|backend| Box::new(backend) as Box<dyn crate::KeyboardProvider>);
                tracing::info!(
                    screenshot = screenshot.is_some(),
                    pointer = pointer.is_some(),
                    keyboard = keyboard.is_some(),
                    "built x11 provider bundle"
                );
                ProviderBundle::new(screenshot, pointer, keyboard, platform)
            }
            Some(DisplayServer::Wayland) => {
                // The input bridge only speaks X11. Wayland sessions without
                // XWayland get platform info only.
                tracing::warn!("wayland display without DISPLAY; action capabilities absent");
                ProviderBundle::new(None, None, None, platform)
            }
            None => {
                tracing::info!("no display detected; serving platform info only");
                ProviderBundle::new(None, None, None, platform)
            }
        }
    }
}
