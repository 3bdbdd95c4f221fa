//! Packed (external count, node pointer) head word.
//!
//! The counted-reference backend must update a reference count and a pointer
//! in one atomic step, so both halves live in a single 128-bit word: pointer
//! in the low half, external count in the high half. A plain
//! `compare_exchange` on the word then covers every combined update.

use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::Ordering;

use portable_atomic::AtomicU128;

/// Decoded head word: external reference count plus raw node pointer.
pub(crate) struct Counted<P> {
    pub(crate) external: i64,
    pub(crate) ptr: *mut P,
}

impl<P> Counted<P> {
    pub(crate) fn null() -> Self {
        Self {
            external: 0,
            ptr: ptr::null_mut(),
        }
    }
}

// Manual impls: the derives would demand `P: Clone`/`P: PartialEq`, but the
// pointer itself is always copyable and comparable.
impl<P> Clone for Counted<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Counted<P> {}

impl<P> PartialEq for Counted<P> {
    fn eq(&self, other: &Self) -> bool {
        self.external == other.external && self.ptr == other.ptr
    }
}

impl<P> Eq for Counted<P> {}

/// The head word itself: a (count, pointer) pair in one 128-bit atomic.
#[repr(align(16))]
pub(crate) struct CountedHead<P> {
    data: AtomicU128,
    _marker: PhantomData<*mut P>,
}

impl<P> CountedHead<P> {
    pub(crate) fn null() -> Self {
        Self {
            data: AtomicU128::new(Self::pack(Counted::null())),
            _marker: PhantomData,
        }
    }

    #[inline]
    fn pack(snapshot: Counted<P>) -> u128 {
        (snapshot.ptr as usize as u128) | (((snapshot.external as u64) as u128) << 64)
    }

    #[inline]
    fn unpack(raw: u128) -> Counted<P> {
        Counted {
            external: (raw >> 64) as u64 as i64,
            ptr: raw as u64 as usize as *mut P,
        }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> Counted<P> {
        Self::unpack(self.data.load(order))
    }

    /// Compare-exchange the full (count, pointer) pair.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: Counted<P>,
        new: Counted<P>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Counted<P>, Counted<P>> {
        match self.data.compare_exchange(
            Self::pack(current),
            Self::pack(new),
            success,
            failure,
        ) {
            Ok(observed) => Ok(Self::unpack(observed)),
            Err(observed) => Err(Self::unpack(observed)),
        }
    }

    /// Weak variant for tight retry loops where spurious failure is cheap.
    #[inline]
    pub(crate) fn compare_exchange_weak(
        &self,
        current: Counted<P>,
        new: Counted<P>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Counted<P>, Counted<P>> {
        match self.data.compare_exchange_weak(
            Self::pack(current),
            Self::pack(new),
            success,
            failure,
        ) {
            Ok(observed) => Ok(Self::unpack(observed)),
            Err(observed) => Err(Self::unpack(observed)),
        }
    }
}
