use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::HashAlgorithm;
use crate::error::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Stream a file through the selected digest, reading `chunk_size` bytes at
/// a time so memory use stays bounded regardless of file size.
///
/// Returns the lowercase hex digest (32/40/64 chars for md5/sha1/sha256).
/// An open or read failure maps to `Error::Unreadable` for this one entity;
/// the caller decides whether that is fatal.
pub fn digest_file(
    path: &Path,
    algorithm: HashAlgorithm,
    chunk_size: usize,
) -> Result<String, Error> {
    let file = File::open(path).map_err(|source| Error::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    match algorithm {
        HashAlgorithm::Md5 => stream_digest::<Md5>(file, path, chunk_size),
        HashAlgorithm::Sha1 => stream_digest::<Sha1>(file, path, chunk_size),
        HashAlgorithm::Sha256 => stream_digest::<Sha256>(file, path, chunk_size),
    }
}

/// Digest in-memory bytes. Identical bytes produce the same digest as
/// `digest_file` over a file with that content, regardless of chunking.
pub fn digest_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Md5 => hex::encode(Md5::digest(data)),
        HashAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

fn stream_digest<D: Digest>(
    mut file: File,
    path: &Path,
    chunk_size: usize,
) -> Result<String, Error> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = file.read(&mut buf).map_err(|source| Error::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(content: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_sha256_known_vector() {
        let tmp = temp_with(b"hello world");
        let hash = digest_file(tmp.path(), HashAlgorithm::Sha256, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_md5_known_vector() {
        let tmp = temp_with(b"hello world");
        let hash = digest_file(tmp.path(), HashAlgorithm::Md5, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_sha1_known_vector() {
        let tmp = temp_with(b"hello world");
        let hash = digest_file(tmp.path(), HashAlgorithm::Sha1, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(hash, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_empty_file() {
        let tmp = temp_with(b"");
        let hash = digest_file(tmp.path(), HashAlgorithm::Sha256, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_lengths() {
        let tmp = temp_with(b"x");
        for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256] {
            let hash = digest_file(tmp.path(), algorithm, DEFAULT_CHUNK_SIZE).unwrap();
            assert_eq!(hash.len(), algorithm.hex_len());
            assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let content = vec![7u8; 10_000];
        let tmp = temp_with(&content);
        let small = digest_file(tmp.path(), HashAlgorithm::Sha256, 3).unwrap();
        let large = digest_file(tmp.path(), HashAlgorithm::Sha256, 1 << 20).unwrap();
        assert_eq!(small, large);
        assert_eq!(small, digest_bytes(&content, HashAlgorithm::Sha256));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = digest_file(
            Path::new("/no/such/file/anywhere"),
            HashAlgorithm::Sha256,
            DEFAULT_CHUNK_SIZE,
        );
        assert!(matches!(result, Err(Error::Unreadable { .. })));
    }
}
