//! Dual host/device residency primitives (C1).
//!
//! Every storage entity in this crate (sparse matrices, dense vectors) is built on top of
//! [`DualBuffer`], which carries two independently allocated buffers keyed by [`MemorySpace`]
//! plus two freshness bits. The invariant held at all times: after any successful mutation at
//! least one bit is set, and a read of a stale side triggers a synchronizing copy from the
//! fresh side first.

use crate::error::MemoryError;

/// Tag identifying which side of a dual-resident buffer is being addressed.
///
/// This crate ships a single execution backend (host-only, see [`crate::backend::cpu`]), so
/// `Device` currently aliases the same process memory as `Host`; the freshness-bit state
/// machine below is written so a second backend only needs to swap the allocator and the
/// `sync` transport, never the transition logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    Host,
    Device,
}

impl MemorySpace {
    pub fn other(self) -> MemorySpace {
        match self {
            MemorySpace::Host => MemorySpace::Device,
            MemorySpace::Device => MemorySpace::Host,
        }
    }
}

/// A value held in two memory spaces with explicit freshness bits.
///
/// `T` must be `Clone` since synchronization is a plain copy in this host-only backend.
#[derive(Debug, Clone, Default)]
pub struct DualBuffer<T> {
    host: Option<Vec<T>>,
    device: Option<Vec<T>>,
    host_valid: bool,
    device_valid: bool,
}

impl<T: Clone> DualBuffer<T> {
    pub fn empty() -> Self {
        Self {
            host: None,
            device: None,
            host_valid: false,
            device_valid: false,
        }
    }

    pub fn is_valid(&self, space: MemorySpace) -> bool {
        match space {
            MemorySpace::Host => self.host_valid,
            MemorySpace::Device => self.device_valid,
        }
    }

    fn clear_valid(&mut self, space: MemorySpace) {
        match space {
            MemorySpace::Host => self.host_valid = false,
            MemorySpace::Device => self.device_valid = false,
        }
    }

    fn set_valid(&mut self, space: MemorySpace) {
        match space {
            MemorySpace::Host => self.host_valid = true,
            MemorySpace::Device => self.device_valid = true,
        }
    }

    fn slot_mut(&mut self, space: MemorySpace) -> &mut Option<Vec<T>> {
        match space {
            MemorySpace::Host => &mut self.host,
            MemorySpace::Device => &mut self.device,
        }
    }

    fn slot(&self, space: MemorySpace) -> &Option<Vec<T>> {
        match space {
            MemorySpace::Host => &self.host,
            MemorySpace::Device => &self.device,
        }
    }

    /// Zero-initializes `len` elements in `space`. Does not set any freshness bit, matching
    /// `allocateMatrixData`'s contract: allocation is not itself an observable write.
    pub fn allocate(&mut self, space: MemorySpace, len: usize)
    where
        T: Default,
    {
        *self.slot_mut(space) = Some(vec![T::default(); len]);
    }

    /// Copies `data` into `dst`, allocating it on demand, and marks `dst` valid / `other`
    /// invalid. Mirrors `Csr::updateData`'s four host/device transfer cases: the source and
    /// destination spaces may be equal or different, but the post-condition is always "exactly
    /// one side is fresh".
    pub fn update(&mut self, data: &[T], dst: MemorySpace) {
        *self.slot_mut(dst) = Some(data.to_vec());
        self.clear_valid(dst.other());
        self.set_valid(dst);
    }

    /// Frees `dst`, then performs [`Self::update`]. Used when the destination's previous
    /// allocation may have a different length than the incoming data (the `new_nnz` overload
    /// in the original matrix API).
    pub fn update_resized(&mut self, data: &[T], dst: MemorySpace) {
        *self.slot_mut(dst) = None;
        self.update(data, dst);
    }

    /// Returns a borrow of `space`'s data, synchronizing from the other side first if `space`
    /// is stale but the other side is fresh. Fails with [`MemoryError::NotAllocated`] if
    /// neither side holds valid data.
    pub fn get(&mut self, space: MemorySpace) -> Result<&[T], MemoryError> {
        self.sync_to(space)?;
        self.slot(space)
            .as_deref()
            .ok_or(MemoryError::NotAllocated)
    }

    /// Idempotent synchronization: copies from the fresh side into `dst` only if `dst` is
    /// currently stale and the other side is fresh. A no-op otherwise, matching `copyCsr`'s
    /// short-circuit on `(dst_invalid && src_valid)`.
    pub fn sync_to(&mut self, dst: MemorySpace) -> Result<(), MemoryError> {
        if self.is_valid(dst) {
            return Ok(());
        }
        let src = dst.other();
        if !self.is_valid(src) {
            return Err(MemoryError::NotAllocated);
        }
        let data = self.slot(src).clone().ok_or(MemoryError::NotAllocated)?;
        *self.slot_mut(dst) = Some(data);
        self.set_valid(dst);
        Ok(())
    }

    /// Borrow of `space` for in-place mutation. Synchronizes `space` first so existing content
    /// is available to read-modify-write, then marks the other side stale since the caller is
    /// about to write through this borrow.
    pub fn get_mut(&mut self, space: MemorySpace) -> Result<&mut [T], MemoryError> {
        self.sync_to(space)?;
        self.clear_valid(space.other());
        self.slot_mut(space)
            .as_deref_mut()
            .ok_or(MemoryError::NotAllocated)
    }

    pub fn len(&self) -> usize {
        self.host
            .as_ref()
            .or(self.device.as_ref())
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_then_get_round_trips() {
        let mut buf = DualBuffer::<f64>::empty();
        buf.update(&[1.0, 2.0, 3.0], MemorySpace::Host);
        assert_eq!(buf.get(MemorySpace::Host).unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn stale_side_synchronizes_on_read() {
        let mut buf = DualBuffer::<f64>::empty();
        buf.update(&[1.0, 2.0, 3.0], MemorySpace::Host);
        assert!(!buf.is_valid(MemorySpace::Device));
        let device_view = buf.get(MemorySpace::Device).unwrap().to_vec();
        assert_eq!(device_view, vec![1.0, 2.0, 3.0]);
        assert!(buf.is_valid(MemorySpace::Device));
    }

    #[test]
    fn neither_side_valid_fails() {
        let mut buf = DualBuffer::<f64>::empty();
        assert_eq!(buf.get(MemorySpace::Host), Err(MemoryError::NotAllocated));
    }

    #[test]
    fn update_invalidates_other_side() {
        let mut buf = DualBuffer::<f64>::empty();
        buf.update(&[1.0], MemorySpace::Host);
        buf.sync_to(MemorySpace::Device).unwrap();
        buf.update(&[2.0], MemorySpace::Host);
        assert!(!buf.is_valid(MemorySpace::Device));
    }
}
