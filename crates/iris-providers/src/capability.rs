//! Capability provider interfaces and the bundle the dispatcher borrows.
//!
//! Each trait covers one action family. Concrete backends are selected once
//! by the factory; a capability the host cannot support is simply absent from
//! the bundle, never faked.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::platform::PlatformDescriptor;

/// Enumerates supported `Capability` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Screenshot,
    Pointer,
    Keyboard,
    PlatformInfo,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::Screenshot => "screenshot",
            Capability::Pointer => "pointer",
            Capability::Keyboard => "keyboard",
            Capability::PlatformInfo => "platform_info",
        }
    }
}

/// Enumerates supported `ProviderError` values.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{tool} exited with status {status}: {stderr}")]
    CommandFailed {
        tool: &'static str,
        status: i32,
        stderr: String,
    },
    #[error("{tool} did not complete within {timeout_ms}ms")]
    CommandTimedOut { tool: &'static str, timeout_ms: u64 },
    #[error("required tool '{tool}' is not installed")]
    ToolMissing { tool: &'static str },
    #[error("capture produced no image data")]
    EmptyCapture,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Enumerates supported `PointerButton` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl PointerButton {
    pub fn name(self) -> &'static str {
        match self {
            PointerButton::Left => "left",
            PointerButton::Right => "right",
            PointerButton::Middle => "middle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(PointerButton::Left),
            "right" => Some(PointerButton::Right),
            "middle" => Some(PointerButton::Middle),
            _ => None,
        }
    }
}

/// Enumerates supported `ScrollDirection` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn name(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            _ => None,
        }
    }
}

/// One captured frame plus the backend that produced it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub png_data: Vec<u8>,
    pub backend: &'static str,
}

pub trait ScreenshotProvider: Send {
    fn capture(&self) -> Result<Captured, ProviderError>;
}

pub trait PointerProvider: Send {
    fn click(&self, x: i64, y: i64, button: PointerButton) -> Result<(), ProviderError>;
    fn drag(&self, start_x: i64, start_y: i64, end_x: i64, end_y: i64)
        -> Result<(), ProviderError>;
    fn scroll(&self, direction: ScrollDirection, amount: i64) -> Result<(), ProviderError>;
}

pub trait KeyboardProvider: Send {
    fn type_text(&self, text: &str) -> Result<(), ProviderError>;
    fn key_press(&self, key: &str) -> Result<(), ProviderError>;
}

pub trait PlatformInfoProvider: Send {
    fn descriptor(&self) -> &PlatformDescriptor;
    fn display_available(&self) -> bool;

    fn report(&self) -> Value {
        let descriptor = self.descriptor();
        serde_json::json!({
            "os": descriptor.os.name(),
            "display_server": descriptor.display_server.map(|server| server.name()),
            "is_wsl": descriptor.is_wsl,
            "display_available": self.display_available(),
        })
    }
}

/// Providers available on this host. Owned by the factory's caller for the
/// process lifetime; the dispatcher holds a shared reference and handlers
/// never retain one beyond their own call.
pub struct ProviderBundle {
    screenshot: Option<Box<dyn ScreenshotProvider>>,
    pointer: Option<Box<dyn PointerProvider>>,
    keyboard: Option<Box<dyn KeyboardProvider>>,
    platform: Box<dyn PlatformInfoProvider>,
}

impl ProviderBundle {
    pub fn new(
        screenshot: Option<Box<dyn ScreenshotProvider>>,
        pointer: Option<Box<dyn PointerProvider>>,
        keyboard: Option<Box<dyn KeyboardProvider>>,
        platform: Box<dyn PlatformInfoProvider>,
    ) -> Self {
        Self {
            screenshot,
            pointer,
            keyboard,
            platform,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Screenshot => self.screenshot.is_some(),
            Capability::Pointer => self.pointer.is_some(),
            Capability::Keyboard => self.keyboard.is_some(),
            Capability::PlatformInfo => true,
        }
    }

    pub fn screenshot(&self) -> Option<&dyn ScreenshotProvider> {
        self.screenshot.as_deref()
    }

    pub fn pointer(&self) -> Option<&dyn PointerProvider> {
        self.pointer.as_deref()
    }

    pub fn keyboard(&self) -> Option<&dyn KeyboardProvider> {
        self.keyboard.as_deref()
    }

    pub fn platform(&self) -> &dyn PlatformInfoProvider {
        self.platform.as_ref()
    }
}
