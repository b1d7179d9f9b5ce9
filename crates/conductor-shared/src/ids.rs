//! # Id Generation
//!
//! Single helper for the 6-character lowercase-alphanumeric random suffix
//! used by instance ids and process ids. Drawn from
//! `rand::rngs::ThreadRng`, a securely seeded, per-thread CSPRNG-backed
//! source rather than a generator seeded once per process and reused —
//! reusing a single seed makes the random tail distinguishable across ids
//! generated in the same run, which defeats the point of appending it.

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A 6-character lowercase-alphanumeric token from a securely seeded source.
pub fn short_random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// `<task_id first <=8 chars>-<6 random alnum>`.
pub fn instance_id(task_id: &str) -> String {
    let prefix_len = task_id.len().min(8);
    format!("{}-{}", &task_id[..prefix_len], short_random_token())
}
