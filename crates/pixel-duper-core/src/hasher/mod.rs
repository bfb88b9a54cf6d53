use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_BUFFER_LENGTH: usize = 64 * 1024;

/// Hex-encoded blake3 digest of a file's full content.
pub type HashDigest = String;

pub fn digest(data: &[u8]) -> HashDigest {
    blake3::hash(data).to_hex().to_string()
}

/// Stream a file through blake3 without holding it in memory.
pub fn hash_file(file: &Path) -> io::Result<(HashDigest, u64)> {
    let mut f = File::open(file)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; READ_BUFFER_LENGTH];
    let mut total = 0u64;

    loop {
        let bytes_read = f.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }

    Ok((hasher.finalize().to_hex().to_string(), total))
}

pub fn read_full_file(file: &Path) -> io::Result<Vec<u8>> {
    let mut f = File::open(file)?;
    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}
