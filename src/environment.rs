use crate::error::DecodeError;
use half::f16;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Equirectangular high-dynamic-range panorama, decoded to Rgba16Float
/// texel data ready for upload.
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[u16; 4]>,
}

impl EnvironmentMap {
    pub fn from_hdr_bytes(bytes: &[u8], asset: &str) -> Result<Self, DecodeError> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)
            .map_err(|err| DecodeError::new(asset, format!("hdr decode failed: {err}")))?;
        let rgb = decoded.to_rgb32f();
        let (width, height) = (rgb.width(), rgb.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::new(asset, "hdr panorama has zero size"));
        }
        let texels = rgb
            .pixels()
            .map(|pixel| {
                [
                    f16::from_f32(pixel.0[0]).to_bits(),
                    f16::from_f32(pixel.0[1]).to_bits(),
                    f16::from_f32(pixel.0[2]).to_bits(),
                    f16::from_f32(1.0).to_bits(),
                ]
            })
            .collect();
        Ok(Self { width, height, texels })
    }

    pub fn byte_size(&self) -> usize {
        self.texels.len() * 8
    }
}

type EnvironmentFuture = Pin<Box<dyn Future<Output = Result<EnvironmentMap, DecodeError>>>>;

/// The panorama load is async and may complete after first render; the
/// render loop polls this slot once per frame and hot-swaps the map in
/// when it resolves, independent of the frame cadence.
pub enum EnvironmentSlot {
    Empty,
    Pending(EnvironmentFuture),
    Ready(Arc<EnvironmentMap>),
    Failed,
}

impl EnvironmentSlot {
    pub fn pending(
        future: impl Future<Output = Result<EnvironmentMap, DecodeError>> + 'static,
    ) -> Self {
        EnvironmentSlot::Pending(Box::pin(future))
    }

    /// One cooperative poll. Returns the map on the frame it first becomes
    /// ready, so the caller can upload it exactly once.
    pub fn poll_swap(&mut self) -> Option<Arc<EnvironmentMap>> {
        let EnvironmentSlot::Pending(future) = self else {
            return None;
        };
        let waker = Waker::noop();
        let mut context = Context::from_waker(waker);
        match future.as_mut().poll(&mut context) {
            Poll::Pending => None,
            Poll::Ready(Ok(map)) => {
                let map = Arc::new(map);
                *self = EnvironmentSlot::Ready(map.clone());
                Some(map)
            }
            Poll::Ready(Err(err)) => {
                log::warn!("environment map load failed: {err}");
                *self = EnvironmentSlot::Failed;
                None
            }
        }
    }

    pub fn ready(&self) -> Option<&Arc<EnvironmentMap>> {
        match self {
            EnvironmentSlot::Ready(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_hdr() -> Vec<u8> {
        // Radiance header plus one uncompressed RGBE scanline (2x1).
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 2\n");
        bytes.extend_from_slice(&[128, 128, 128, 129]); // ~(1,1,1)
        bytes.extend_from_slice(&[128, 64, 32, 129]);
        bytes
    }

    #[test]
    fn hdr_bytes_decode_to_half_float_texels() {
        let map = EnvironmentMap::from_hdr_bytes(&tiny_hdr(), "sky.hdr").expect("hdr decodes");
        assert_eq!(map.width, 2);
        assert_eq!(map.height, 1);
        assert_eq!(map.texels.len(), 2);
        assert_eq!(map.byte_size(), 16);
        let first = f16::from_bits(map.texels[0][0]).to_f32();
        assert!(first > 0.9 && first < 1.1, "expected ~1.0, got {first}");
    }

    #[test]
    fn garbage_hdr_is_rejected() {
        assert!(EnvironmentMap::from_hdr_bytes(b"nope", "sky.hdr").is_err());
    }

    #[test]
    fn slot_hot_swaps_on_poll() {
        let bytes = tiny_hdr();
        let mut slot =
            EnvironmentSlot::pending(async move { EnvironmentMap::from_hdr_bytes(&bytes, "sky.hdr") });
        let swapped = slot.poll_swap().expect("ready future resolves on first poll");
        assert_eq!(swapped.width, 2);
        assert!(slot.ready().is_some());
        // Subsequent polls are no-ops.
        assert!(slot.poll_swap().is_none());
    }

    #[test]
    fn failed_loads_leave_the_slot_failed() {
        let mut slot = EnvironmentSlot::pending(async {
            Err(DecodeError::new("sky.hdr", "unreadable"))
        });
        assert!(slot.poll_swap().is_none());
        assert!(matches!(slot, EnvironmentSlot::Failed));
    }
}
