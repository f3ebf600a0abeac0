use super::StreamingHash;

use std::fmt;

use xxhash_rust::xxh32::Xxh32;

/// xxHash32 in streaming form, backed by `xxhash-rust`.
#[derive(Clone)]
pub struct XxHash32 {
    seed: u32,
    state: Xxh32,
}

impl StreamingHash for XxHash32 {
    fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            state: Xxh32::new(seed),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
    }

    fn finish32(&self) -> u32 {
        self.state.digest()
    }
}

impl fmt::Debug for XxHash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XxHash32")
            .field("seed", &self.seed)
            .field("digest", &self.state.digest())
            .finish()
    }
}
