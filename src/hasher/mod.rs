mod digest;

pub use digest::{digest_bytes, digest_file, DEFAULT_CHUNK_SIZE};
