// renderer/shader/uniform_id.rs

/// Stable identifier of a uniform name (32-bit FNV-1a).
pub type UniformId = u32;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hashes a uniform name. Usable in `const` items so builtin ids are
/// computed at compile time.
pub const fn uniform_id(name: &str) -> UniformId {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}
