use image::flat::{FlatSamples, SampleLayout};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("plane {0} not available")]
    MissingPlane(usize),
    #[error("plane {plane} too small: need {needed} bytes, have {actual}")]
    PlaneTooSmall {
        plane: usize,
        needed: usize,
        actual: usize,
    },
}

/// Pixel layout tag reported by a camera buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Semi-planar 4:2:0, chroma interleaved V then U.
    Nv21,
    /// Semi-planar 4:2:0, chroma interleaved U then V.
    Nv12,
    #[serde(other)]
    Other,
}

impl PixelFormat {
    pub fn is_supported(self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::Nv21)
    }

    /// Byte offsets of (U, V) inside one interleaved chroma pair.
    pub fn chroma_offsets(self) -> Option<(usize, usize)> {
        match self {
            PixelFormat::Nv12 => Some((0, 1)),
            PixelFormat::Nv21 => Some((1, 0)),
            PixelFormat::Other => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Nv21 => "nv21",
            PixelFormat::Other => "other",
        }
    }
}

/// A camera buffer that has to be mapped before its planes can be read.
///
/// Implementations backed by hardware memory build the plane slice from the
/// mapped base address; the slice must stay valid until `unmap` is called.
pub trait FrameBuffer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> PixelFormat;
    fn map(&mut self) -> bool;
    fn unmap(&mut self);
    /// Bytes and row stride of plane `index`. Only meaningful while mapped.
    fn plane(&self, index: usize) -> Option<(&[u8], usize)>;
}

/// Scoped read access to a mapped buffer. Unmaps exactly once on drop.
pub struct MappedFrame<'a, B: FrameBuffer + ?Sized> {
    buffer: &'a mut B,
}

impl<'a, B: FrameBuffer + ?Sized> MappedFrame<'a, B> {
    pub fn map(buffer: &'a mut B) -> Option<Self> {
        if buffer.map() {
            Some(Self { buffer })
        } else {
            None
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.buffer.format()
    }

    pub fn view(&self) -> Result<FrameView<'_>, FrameError> {
        FrameView::from_buffer(&*self.buffer)
    }
}

impl<B: FrameBuffer + ?Sized> Drop for MappedFrame<'_, B> {
    fn drop(&mut self) {
        self.buffer.unmap();
    }
}

/// Non-owning view over one strided 8-bit plane.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PlaneView<'a> {
    pub fn new(
        plane: usize,
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self, FrameError> {
        let needed = if height == 0 {
            0
        } else {
            stride * (height - 1) + width
        };
        if data.len() < needed || stride < width {
            return Err(FrameError::PlaneTooSmall {
                plane,
                needed: needed.max(stride * height),
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Describe the plane as interleaved `channels`-byte pixels without
    /// copying. Row padding is skipped through the height stride.
    pub fn samples(&self, channels: u8) -> FlatSamples<&'a [u8]> {
        let channels = channels.max(1);
        FlatSamples {
            samples: self.data,
            layout: SampleLayout {
                channels,
                channel_stride: 1,
                width: (self.width / channels as usize) as u32,
                width_stride: channels as usize,
                height: self.height as u32,
                height_stride: self.stride,
            },
            color_hint: None,
        }
    }
}

/// Zero-copy view over a mapped semi-planar frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub luma: PlaneView<'a>,
    /// Interleaved chroma plane; each row holds `width` bytes of pairs.
    pub chroma: Option<PlaneView<'a>>,
}

impl<'a> FrameView<'a> {
    fn from_buffer<B: FrameBuffer + ?Sized>(buffer: &'a B) -> Result<Self, FrameError> {
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;
        let (luma_data, luma_stride) = buffer.plane(0).ok_or(FrameError::MissingPlane(0))?;
        let luma = PlaneView::new(0, luma_data, width, height, luma_stride)?;

        // A malformed chroma plane only costs the color path.
        let chroma = buffer.plane(1).and_then(|(data, stride)| {
            PlaneView::new(1, data, width.div_ceil(2) * 2, height.div_ceil(2), stride).ok()
        });

        Ok(Self {
            width,
            height,
            format: buffer.format(),
            luma,
            chroma,
        })
    }
}

/// Heap-backed frame holding a contiguous semi-planar image.
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    chroma_stride: usize,
    data: Vec<u8>,
    mapped: bool,
    map_count: u32,
    unmap_count: u32,
}

impl OwnedFrame {
    /// Wrap `data` laid out as a `stride`-wide luma plane followed by the
    /// interleaved chroma plane. Chroma rows are `stride` wide, widened to
    /// hold the trailing pair of an odd-width frame.
    pub fn new(width: u32, height: u32, stride: usize, format: PixelFormat, data: Vec<u8>) -> Self {
        let chroma_stride = stride.max((width as usize).div_ceil(2) * 2);
        Self {
            width,
            height,
            format,
            stride,
            chroma_stride,
            data,
            mapped: false,
            map_count: 0,
            unmap_count: 0,
        }
    }

    pub fn frame_size(width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        w * h + w.div_ceil(2) * 2 * h.div_ceil(2)
    }

    /// Build a frame from a full luma plane with neutral chroma.
    #[cfg(test)]
    pub fn from_luma(width: u32, height: u32, format: PixelFormat, luma: &[u8]) -> Self {
        let mut data = luma.to_vec();
        data.resize(Self::frame_size(width, height), 128);
        Self::new(width, height, width as usize, format, data)
    }

    #[cfg(test)]
    pub fn unmap_count(&self) -> u32 {
        self.unmap_count
    }

    #[cfg(test)]
    pub fn map_count(&self) -> u32 {
        self.map_count
    }

    #[cfg(test)]
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl FrameBuffer for OwnedFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn map(&mut self) -> bool {
        if self.mapped {
            return false;
        }
        self.mapped = true;
        self.map_count += 1;
        true
    }

    fn unmap(&mut self) {
        self.mapped = false;
        self.unmap_count += 1;
    }

    fn plane(&self, index: usize) -> Option<(&[u8], usize)> {
        if !self.mapped {
            return None;
        }
        let luma_len = self.stride * self.height as usize;
        match index {
            0 => Some((self.data.get(..luma_len)?, self.stride)),
            1 => Some((self.data.get(luma_len..)?, self.chroma_stride)),
            _ => None,
        }
    }
}
