// VDU — Video Display Unit
//
// Four halfword registers plus frame scan-out: the unit reads W×H source
// pixels from the framebuffer address in CPU address space and converts them
// to RGBA8888.  Scan-out never faults; every failure is a counter bump and a
// skipped frame.

pub const VDU_CTRL_ENABLE: u16 = 0x0001;
pub const VDU_STATUS_VBLANK: u16 = 0x0001;

pub const DEFAULT_WIDTH: usize = 320;
pub const DEFAULT_HEIGHT: usize = 240;

/// Cached env-var flag: returns `true` when the env var is set (`.is_ok()`).
macro_rules! env_bool {
    ($name:ident, $var:expr) => {
        #[inline]
        fn $name() -> bool {
            use std::sync::OnceLock;
            static V: OnceLock<bool> = OnceLock::new();
            *V.get_or_init(|| std::env::var($var).is_ok())
        }
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, bincode::Encode, bincode::Decode)]
pub enum PixelFormat {
    Rgba8888,
    Rgb565,
    Rgb555,
    Argb8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 | Self::Rgb555 => 2,
            Self::Rgba8888 | Self::Argb8888 => 4,
        }
    }
}

#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Vdu {
    ctrl: u16,
    status: u16,
    fb_high: u16,
    fb_low: u16,
    width: usize,
    height: usize,
    format: PixelFormat,
    /// Frames skipped because the framebuffer segment was not array-backed.
    pub unmapped_frames: u64,
    /// Frames skipped because the framebuffer ran past the region end.
    pub bounds_errors: u64,
}

impl Default for Vdu {
    fn default() -> Self {
        Self::new()
    }
}

impl Vdu {
    env_bool!(env_force_display_on, "SPG_FORCE_DISPLAY_ON");

    pub fn new() -> Self {
        Self {
            ctrl: 0,
            status: 0,
            fb_high: 0,
            fb_low: 0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            format: PixelFormat::Rgb565,
            unmapped_frames: 0,
            bounds_errors: 0,
        }
    }

    pub fn reset(&mut self) {
        let (width, height, format) = (self.width, self.height, self.format);
        *self = Self::new();
        self.width = width;
        self.height = height;
        self.format = format;
    }

    /// Target dimensions and source format are host configuration, not
    /// registers; the chip only exposes CTRL/STATUS/FB_ADDR over MMIO.
    pub fn configure(&mut self, width: usize, height: usize, format: PixelFormat) {
        self.width = width;
        self.height = height;
        self.format = format;
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn display_enabled(&self) -> bool {
        self.ctrl & VDU_CTRL_ENABLE != 0 || Self::env_force_display_on()
    }

    pub fn framebuffer_addr(&self) -> u32 {
        (u32::from(self.fb_high) << 16) | u32::from(self.fb_low)
    }

    pub fn set_vblank(&mut self) {
        self.status |= VDU_STATUS_VBLANK;
    }

    pub fn clear_vblank(&mut self) {
        self.status &= !VDU_STATUS_VBLANK;
    }

    pub fn in_vblank(&self) -> bool {
        self.status & VDU_STATUS_VBLANK != 0
    }

    /// Word view of the halfword register pairs, little-endian:
    /// word 0 = CTRL | STATUS << 16, word 1 = FB_HIGH | FB_LOW << 16.
    pub fn read_reg(&mut self, offset: u32) -> u32 {
        match offset & 0x04 {
            0x00 => u32::from(self.ctrl) | (u32::from(self.status) << 16),
            _ => u32::from(self.fb_high) | (u32::from(self.fb_low) << 16),
        }
    }

    pub fn write_reg(&mut self, offset: u32, value: u32) {
        match offset & 0x04 {
            0x00 => {
                // STATUS (the high half) is read-only from software.
                self.ctrl = (value & 0xFFFF) as u16;
            }
            _ => {
                self.fb_high = (value & 0xFFFF) as u16;
                self.fb_low = (value >> 16) as u16;
            }
        }
    }

    pub fn required_bytes(&self) -> usize {
        self.width * self.height * self.format.bytes_per_pixel()
    }

    /// Convert one frame of source pixels into the RGBA8888 target.
    /// `src` must hold `required_bytes()`; `dst` is resized to W·H·4.
    pub fn blit(&self, src: &[u8], dst: &mut Vec<u8>) {
        let pixels = self.width * self.height;
        dst.clear();
        dst.reserve(pixels * 4);
        match self.format {
            PixelFormat::Rgba8888 => dst.extend_from_slice(&src[..pixels * 4]),
            PixelFormat::Argb8888 => {
                for px in src[..pixels * 4].chunks_exact(4) {
                    dst.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
                }
            }
            PixelFormat::Rgb565 => {
                for px in src[..pixels * 2].chunks_exact(2) {
                    let raw = u16::from_le_bytes([px[0], px[1]]);
                    let r = scale_component((raw >> 11) & 0x1F, 31);
                    let g = scale_component((raw >> 5) & 0x3F, 63);
                    let b = scale_component(raw & 0x1F, 31);
                    dst.extend_from_slice(&[r, g, b, 0xFF]);
                }
            }
            PixelFormat::Rgb555 => {
                for px in src[..pixels * 2].chunks_exact(2) {
                    let raw = u16::from_le_bytes([px[0], px[1]]);
                    let r = scale_component((raw >> 10) & 0x1F, 31);
                    let g = scale_component((raw >> 5) & 0x1F, 31);
                    let b = scale_component(raw & 0x1F, 31);
                    dst.extend_from_slice(&[r, g, b, 0xFF]);
                }
            }
        }
    }
}

/// Expand an n-bit channel to 8 bits with rounding.
#[inline]
fn scale_component(value: u16, max: u16) -> u8 {
    ((u32::from(value) * 255 + u32::from(max) / 2) / u32::from(max)) as u8
}
