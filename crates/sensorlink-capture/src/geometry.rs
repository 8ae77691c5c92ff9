use crate::error::{CaptureError, Result};

/// Shape of the image stream as delivered by the capture mechanism.
///
/// `lines_per_frame` counts line-complete events, which need not equal
/// `height`: the default sensor mode emits two half-width transfers per
/// image row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub width: usize,
    pub height: usize,
    pub bytes_per_pixel: usize,
    pub lines_per_frame: usize,
}

impl ImageGeometry {
    /// Bytes in one complete frame. Saturates on overflow, which
    /// [`validate`](Self::validate) rejects.
    pub fn frame_size(&self) -> usize {
        self.checked_frame_size().unwrap_or(usize::MAX)
    }

    pub fn checked_frame_size(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.bytes_per_pixel)
    }

    /// Bytes delivered per line-complete event.
    pub fn line_size(&self) -> usize {
        match self.lines_per_frame {
            0 => 0,
            lines => self.frame_size() / lines,
        }
    }

    /// Check that the geometry describes a frame the line events tile exactly.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.bytes_per_pixel == 0 {
            return Err(CaptureError::InvalidGeometry(format!(
                "{}x{}x{} has a zero dimension",
                self.width, self.height, self.bytes_per_pixel
            )));
        }
        if self.lines_per_frame == 0 {
            return Err(CaptureError::InvalidGeometry(
                "lines_per_frame must be non-zero".to_string(),
            ));
        }
        let frame_size = self.checked_frame_size().ok_or_else(|| {
            CaptureError::InvalidGeometry(format!(
                "{}x{}x{} overflows the frame size",
                self.width, self.height, self.bytes_per_pixel
            ))
        })?;
        if frame_size % self.lines_per_frame != 0 {
            return Err(CaptureError::InvalidGeometry(format!(
                "frame of {frame_size} bytes does not split into {} equal lines",
                self.lines_per_frame
            )));
        }
        Ok(())
    }
}

impl Default for ImageGeometry {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            bytes_per_pixel: 2,
            lines_per_frame: 480,
        }
    }
}
