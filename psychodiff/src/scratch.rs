//! Reusable scratch grid owned by a comparator.
//!
//! The grid is checked out for one sub-step at a time and returned when the
//! guard drops. When another call holds it, for example a second thread
//! comparing against the same reference, the caller gets a private
//! allocation instead of waiting.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::image::Image3F;

#[derive(Debug)]
pub(crate) struct ScratchImage {
    width: usize,
    height: usize,
    cell: Mutex<Image3F>,
}

/// Exclusive access to the scratch grid until dropped.
#[derive(Debug)]
pub(crate) enum ScratchGuard<'a> {
    Shared(MutexGuard<'a, Image3F>),
    Private(Image3F),
}

impl ScratchImage {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cell: Mutex::new(Image3F::new(width, height)),
        }
    }

    /// Checks out the grid. Contents are whatever the previous user left.
    pub(crate) fn checkout(&self) -> ScratchGuard<'_> {
        match self.cell.try_lock() {
            Ok(guard) => ScratchGuard::Shared(guard),
            // A panic while checked out leaves no invariant to protect.
            Err(TryLockError::Poisoned(poisoned)) => ScratchGuard::Shared(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                log::debug!(
                    "scratch image {}x{} busy, allocating",
                    self.width,
                    self.height
                );
                ScratchGuard::Private(Image3F::new(self.width, self.height))
            }
        }
    }
}

impl Deref for ScratchGuard<'_> {
    type Target = Image3F;

    fn deref(&self) -> &Image3F {
        match self {
            Self::Shared(guard) => &**guard,
            Self::Private(image) => image,
        }
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Image3F {
        match self {
            Self::Shared(guard) => &mut **guard,
            Self::Private(image) => image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_is_released_on_drop() {
        let scratch = ScratchImage::new(4, 4);
        {
            let mut guard = scratch.checkout();
            guard.plane_mut(0).set(1, 1, 7.0);
            assert!(matches!(guard, ScratchGuard::Shared(_)));
        }
        let guard = scratch.checkout();
        assert!(matches!(guard, ScratchGuard::Shared(_)));
        assert_eq!(guard.plane(0).get(1, 1), 7.0);
    }

    #[test]
    fn test_busy_checkout_gets_private_grid() {
        let scratch = ScratchImage::new(4, 4);
        let mut first = scratch.checkout();
        first.plane_mut(2).fill(3.0);
        let second = scratch.checkout();
        assert!(matches!(second, ScratchGuard::Private(_)));
        assert_eq!(second.plane(2).get(0, 0), 0.0);
        drop(second);
        drop(first);
        assert!(matches!(scratch.checkout(), ScratchGuard::Shared(_)));
    }

    #[test]
    fn test_checkout_from_other_threads() {
        let scratch = ScratchImage::new(4, 4);
        let held = scratch.checkout();
        std::thread::scope(|s| {
            let busy = s.spawn(|| matches!(scratch.checkout(), ScratchGuard::Private(_)));
            assert!(busy.join().expect("thread finished"));
        });
        drop(held);
        std::thread::scope(|s| {
            let free = s.spawn(|| matches!(scratch.checkout(), ScratchGuard::Shared(_)));
            assert!(free.join().expect("thread finished"));
        });
    }
}
