//! Image handles shared between the loader and the engine

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// A named image whose bytes arrive asynchronously.
///
/// Handles are given to the engine as soon as the load is issued. The bytes
/// are filled in once the fetch completes; a failed fetch leaves the handle
/// empty for the rest of the run. Decoding is the engine's business.
#[derive(Clone)]
pub struct ImageHandle {
    slot: Rc<ImageSlot>,
}

struct ImageSlot {
    path: String,
    bytes: OnceCell<Vec<u8>>,
}

impl ImageHandle {
    /// Create an empty handle for the image at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            slot: Rc::new(ImageSlot {
                path: path.into(),
                bytes: OnceCell::new(),
            }),
        }
    }

    /// Path the image was requested from (relative to the asset base)
    pub fn path(&self) -> &str {
        &self.slot.path
    }

    /// Whether the bytes have arrived yet
    pub fn is_loaded(&self) -> bool {
        self.slot.bytes.get().is_some()
    }

    /// Raw encoded bytes, if loaded
    pub fn bytes(&self) -> Option<&[u8]> {
        self.slot.bytes.get().map(Vec::as_slice)
    }

    /// Store the loaded bytes. Returns false if the handle was already filled.
    pub fn fulfill(&self, bytes: Vec<u8>) -> bool {
        self.slot.bytes.set(bytes).is_ok()
    }

    /// Whether two handles refer to the same slot.
    pub fn same_slot(&self, other: &ImageHandle) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("path", &self.slot.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let img = ImageHandle::new("assets/tiles/g1.bmp");
        assert_eq!(img.path(), "assets/tiles/g1.bmp");
        assert!(!img.is_loaded());
        assert!(img.bytes().is_none());
    }

    #[test]
    fn clones_observe_fulfillment() {
        let img = ImageHandle::new("explosion.png");
        let given_to_engine = img.clone();

        assert!(img.fulfill(vec![1, 2, 3]));
        assert!(given_to_engine.is_loaded());
        assert_eq!(given_to_engine.bytes(), Some(&[1u8, 2, 3][..]));
        assert!(img.same_slot(&given_to_engine));
    }

    #[test]
    fn second_fulfill_is_rejected() {
        let img = ImageHandle::new("a.png");
        assert!(img.fulfill(vec![1]));
        assert!(!img.fulfill(vec![2]));
        assert_eq!(img.bytes(), Some(&[1u8][..]));
    }
}
