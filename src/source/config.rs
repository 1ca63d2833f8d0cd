//! Source configuration

/// Configuration handed to a frame source at start
///
/// What the fields mean is up to the source: a camera-backed source opens
/// `device` and negotiates `width`x`height`, the built-in pattern source
/// only honors `fps`.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Capture device path (e.g. "/dev/video0")
    pub device: String,

    /// Requested frame width in pixels
    pub width: u32,

    /// Requested frame height in pixels
    pub height: u32,

    /// Requested frame rate
    pub fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 15,
        }
    }
}

impl SourceConfig {
    /// Set the device path
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the frame size
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.device, "/dev/video0");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.fps, 15);
    }

    #[test]
    fn test_builder_chaining() {
        let config = SourceConfig::default()
            .device("/dev/video2")
            .size(1280, 720)
            .fps(30);

        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.fps, 30);
    }
}
