use rand::RngCore;
use rand::rngs::OsRng;

/// Fill a new buffer with `len` bytes from the OS CSPRNG
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Fixed-size variant of [`random_bytes`]
#[must_use]
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
