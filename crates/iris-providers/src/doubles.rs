//! Construction-time test doubles.
//!
//! Substituted for real backends when a [`ProviderBundle`] is assembled for
//! tests; production code never branches on any of these.

use std::sync::{Arc, Mutex};

use crate::capability::{
    Captured, KeyboardProvider, PointerButton, PointerProvider, ProviderError, ScreenshotProvider,
    ScrollDirection,
};
use crate::platform::PlatformDescriptor;
use crate::PlatformInfoProvider;

/// Shared handle onto the events a recording double observed.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    fn push(&self, event: String) {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }

    pub fn events(&self) -> Vec<String> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }
}

/// Screenshot double returning a fixed payload.
pub struct StaticScreenshot {
    png_data: Vec<u8>,
}

impl StaticScreenshot {
    pub fn new(png_data: Vec<u8>) -> Self {
        Self { png_data }
    }
}

impl Default for StaticScreenshot {
    fn default() -> Self {
        // Shortest valid-looking payload: the PNG magic alone.
        Self::new(vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'])
    }
}

impl ScreenshotProvider for StaticScreenshot {
    fn capture(&self) -> Result<Captured, ProviderError> {
        Ok(Captured {
            png_data: self.png_data.clone(),
            backend: "static",
        })
    }
}

/// Screenshot double that always fails, for execution-error paths.
pub struct FailingScreenshot;

impl ScreenshotProvider for FailingScreenshot {
    fn capture(&self) -> Result<Captured, ProviderError> {
        Err(ProviderError::EmptyCapture)
    }
}

/// Pointer double recording every synthesized event.
pub struct RecordingPointer {
    log: EventLog,
}

impl RecordingPointer {
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl PointerProvider for RecordingPointer {
    fn click(&self, x: i64, y: i64, button: PointerButton) -> Result<(), ProviderError> {
        self.log.push(format!("click {x},{y} {}", button.name()));
        Ok(())
    }

    fn drag(
        &self,
        start_x: i64,
        start_y: i64,
        end_x: i64,
        end_y: i64,
    ) -> Result<(), ProviderError> {
        self.log
            .push(format!("drag {start_x},{start_y} -> {end_x},{end_y}"));
        Ok(())
    }

    fn scroll(&self, direction: ScrollDirection, amount: i64) -> Result<(), ProviderError> {
        self.log.push(format!("scroll {} {amount}", direction.name()));
        Ok(())
    }
}

/// Keyboard double recording every synthesized event.
pub struct RecordingKeyboard {
    log: EventLog,
}

impl RecordingKeyboard {
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl KeyboardProvider for RecordingKeyboard {
    fn type_text(&self, text: &str) -> Result<(), ProviderError> {
        self.log.push(format!("type {text}"));
        Ok(())
    }

    fn key_press(&self, key: &str) -> Result<(), ProviderError> {
        self.log.push(format!("key {key}"));
        Ok(())
    }
}

/// Platform-info double with a fixed descriptor and availability flag.
pub struct FixedPlatformInfo {
    descriptor: PlatformDescriptor,
    display_available: bool,
}

impl FixedPlatformInfo {
    pub fn new(descriptor: PlatformDescriptor, display_available: bool) -> Self {
        Self {
            descriptor,
            display_available,
        }
    }
}

impl PlatformInfoProvider for FixedPlatformInfo {
    fn descriptor(&self) -> &PlatformDescriptor {
        &self.descriptor
    }

    fn display_available(&self) -> bool {
        self.display_available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_recording_doubles_capture_events_in_order() {
        let (pointer, pointer_log) = RecordingPointer::new();
        let (keyboard, keyboard_log) = RecordingKeyboard::new();

        pointer
            .click(10, 20, PointerButton::Left)
            .expect("click records");
        pointer
            .scroll(ScrollDirection::Down, 3)
            .expect("scroll records");
        keyboard.type_text("hello").expect("type records");

        assert_eq!(
            pointer_log.events(),
            vec!["click 10,20 left".to_string(), "scroll down 3".to_string()]
        );
        assert_eq!(keyboard_log.events(), vec!["type hello".to_string()]);
    }

    #[test]
    fn unit_static_screenshot_returns_fixed_bytes() {
        let capture = StaticScreenshot::default()
            .capture()
            .expect("static capture succeeds");
        assert!(capture.png_data.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!(capture.backend, "static");
    }
}
