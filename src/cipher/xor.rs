#![forbid(unsafe_code)]
// Word-at-a-time XOR used by both OTP directions.
// - 8-byte words through u64, then a byte tail.
// - No secret-dependent branching; length policy is left to the callers.

const WORD: usize = 8;

/// XORs `input` with the leading bytes of `keystream` into `out`.
/// Requires `out.len() == input.len()` and `keystream.len() >= input.len()`.
#[inline(always)]
pub fn xor_into(input: &[u8], keystream: &[u8], out: &mut [u8]) {
    let len = input.len();
    let words = len / WORD * WORD;

    for ((o, a), b) in out[..words]
        .chunks_exact_mut(WORD)
        .zip(input[..words].chunks_exact(WORD))
        .zip(keystream[..words].chunks_exact(WORD))
    {
        let mut wa = [0u8; WORD];
        let mut wb = [0u8; WORD];
        wa.copy_from_slice(a);
        wb.copy_from_slice(b);
        o.copy_from_slice(&(u64::from_ne_bytes(wa) ^ u64::from_ne_bytes(wb)).to_ne_bytes());
    }

    for i in words..len {
        out[i] = input[i] ^ keystream[i];
    }
}

/// Pairwise XOR over the shorter of the two inputs.
pub fn xor_truncated(a: &[u8], b: &[u8]) -> Vec<u8> {
    let len = a.len().min(b.len());
    let mut out = vec![0u8; len];
    xor_into(&a[..len], &b[..len], &mut out);
    out
}
