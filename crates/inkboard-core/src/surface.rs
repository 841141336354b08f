//! Host drawing-surface hooks the tools need: pointer capture and cursor icon.

/// Cursor icons the tools request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorIcon {
    #[default]
    Default,
    Crosshair,
    Grab,
    Grabbing,
    Text,
    Move,
    Pointer,
    ResizeNwse,
    Rotate,
    None,
}

/// Capabilities of the host surface.
///
/// Capture guarantees that move/up events keep arriving while the pointer
/// leaves the surface mid-gesture.
pub trait Surface {
    fn capture_pointer(&mut self, pointer_id: u32);
    fn release_pointer(&mut self, pointer_id: u32);
    fn set_cursor(&mut self, cursor: CursorIcon);
}

/// Surface used by tests and the replay binary.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    pub captured: Option<u32>,
    pub cursor: CursorIcon,
    /// Total number of captures taken, for assertions.
    pub capture_count: usize,
}

impl Surface for HeadlessSurface {
    fn capture_pointer(&mut self, pointer_id: u32) {
        self.captured = Some(pointer_id);
        self.capture_count += 1;
    }

    fn release_pointer(&mut self, pointer_id: u32) {
        if self.captured == Some(pointer_id) {
            self.captured = None;
        }
    }

    fn set_cursor(&mut self, cursor: CursorIcon) {
        self.cursor = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_only_matching_pointer() {
        let mut surface = HeadlessSurface::default();
        surface.capture_pointer(3);
        surface.release_pointer(4);
        assert_eq!(surface.captured, Some(3));
        surface.release_pointer(3);
        assert_eq!(surface.captured, None);
        assert_eq!(surface.capture_count, 1);
    }
}
