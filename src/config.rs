/// Requested capture mode. Cameras that cannot match it exactly fall back
/// to their closest supported mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30,
        }
    }
}
