//! Fixed-size secret buffers that zero their backing memory on drop.
//!
//! A const-generic wrapper over `secrets::SecretVec`, fixed at a compile-time length, which is
//! all the key schedule ever needs (16, 32 or 64 bytes).

use secrets::SecretVec;

/// An `N`-byte buffer backed by `secrets::SecretVec`, zeroed on construction and on drop.
pub struct SecretArray<const N: usize> {
    inner: SecretVec<u8>,
}

impl<const N: usize> SecretArray<N> {
    /// A zero-filled buffer of exactly `N` bytes.
    pub fn zero() -> Self {
        SecretArray {
            inner: SecretVec::zero(N),
        }
    }

    /// A buffer initialized from a slice of exactly `N` bytes.
    ///
    /// Panics if `data.len() != N`; callers are expected to have already validated field
    /// lengths (see [`crate::field`]) before reaching this constructor.
    pub fn from_slice(data: &[u8]) -> Self {
        assert_eq!(data.len(), N, "SecretArray::from_slice length mismatch");
        let mut array = Self::zero();
        array.with_buf_mut(|buf| buf.copy_from_slice(data));
        array
    }

    /// Run `f` against the mutable backing buffer, e.g. to fill it from a KDF or an RNG.
    pub fn with_buf_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.inner.borrow_mut();
        f(&mut guard)
    }

    /// Run `f` against the backing buffer without copying it out.
    pub fn expose_secret<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.inner.borrow();
        f(&guard)
    }

    /// Copy the secret out into a plain, non-zeroizing array.
    ///
    /// Used only where the destination is itself a `SecretArray` or an ephemeral stack value
    /// consumed immediately by a cipher constructor.
    pub fn to_array(&self) -> [u8; N] {
        let mut out = [0u8; N];
        self.expose_secret(|buf| out.copy_from_slice(buf));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        let array = SecretArray::<32>::zero();
        assert_eq!(array.to_array(), [0u8; 32]);
    }

    #[test]
    fn from_slice_round_trips() {
        let data: Vec<u8> = (0..16).collect();
        let array = SecretArray::<16>::from_slice(&data);
        assert_eq!(array.to_array().to_vec(), data);
    }

    #[test]
    fn with_buf_mut_writes_through() {
        let mut array = SecretArray::<4>::zero();
        array.with_buf_mut(|buf| buf.copy_from_slice(&[1, 2, 3, 4]));
        assert_eq!(array.to_array(), [1, 2, 3, 4]);
    }
}
