use crate::model::Digest;
use md5::{Digest as _, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 65536; // 64KB

/// MD5 of a file. Text files are hashed with CRLF and lone CR converted to LF,
/// since the depot stores and digests text with LF line endings.
pub fn digest_file(path: &Path, text: bool) -> io::Result<Digest> {
    let file = File::open(path)?;
    digest_reader(file, text)
}

pub fn digest_reader<R: Read>(mut reader: R, text: bool) -> io::Result<Digest> {
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut normalizer = LineEndingNormalizer::default();
    let mut normalized = Vec::with_capacity(CHUNK_SIZE);

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        if text {
            normalized.clear();
            normalizer.push(&buffer[..bytes_read], &mut normalized);
            hasher.update(&normalized);
        } else {
            hasher.update(&buffer[..bytes_read]);
        }
    }

    if text && normalizer.finish() {
        hasher.update(b"\n");
    }

    Ok(Digest::new(&hex::encode_upper(hasher.finalize())))
}

/// Streaming CRLF/CR → LF conversion. A CR at the end of one chunk is held
/// until the next byte is seen.
#[derive(Default)]
struct LineEndingNormalizer {
    pending_cr: bool,
}

impl LineEndingNormalizer {
    fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                out.push(b'\n');
                if byte == b'\n' {
                    continue;
                }
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(byte);
            }
        }
    }

    /// True when a trailing CR still has to be emitted as LF.
    fn finish(&mut self) -> bool {
        std::mem::take(&mut self.pending_cr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(bytes: &[u8], text: bool) -> Digest {
        digest_reader(bytes, text).unwrap()
    }

    #[test]
    fn test_empty_input_digest() {
        assert_eq!(
            digest_of(b"", false).as_str(),
            "D41D8CD98F00B204E9800998ECF8427E"
        );
    }

    #[test]
    fn test_text_line_endings_are_normalized() {
        let lf = digest_of(b"hello\nworld\n", true);
        assert_eq!(digest_of(b"hello\r\nworld\r\n", true), lf);
        assert_eq!(digest_of(b"hello\rworld\r", true), lf);
        assert_eq!(digest_of(b"hello\nworld\n", false), lf);
        assert_ne!(digest_of(b"hello\r\nworld\r\n", false), lf);
        assert_eq!(lf.as_str().len(), 32);
    }

    #[test]
    fn test_digest_is_uppercase_hex() {
        let digest = digest_of(b"abc", false);
        assert_eq!(digest.as_str(), "900150983CD24FB0D6963F7D28E17F72");
    }

    #[test]
    fn test_cr_split_across_chunks() {
        let mut normalizer = LineEndingNormalizer::default();
        let mut out = Vec::new();
        normalizer.push(b"a\r", &mut out);
        normalizer.push(b"\nb\r", &mut out);
        normalizer.push(b"c", &mut out);
        assert!(!normalizer.finish());
        assert_eq!(out, b"a\nb\nc");

        let mut out = Vec::new();
        normalizer.push(b"end\r", &mut out);
        assert!(normalizer.finish());
        assert_eq!(out, b"end");
    }

    #[test]
    fn test_large_text_input_matches_normalized_digest() {
        let line = b"0123456789abcdef\r\n";
        let crlf: Vec<u8> = line.iter().copied().cycle().take(line.len() * 10_000).collect();
        let lf: Vec<u8> = crlf.iter().copied().filter(|b| *b != b'\r').collect();
        assert_eq!(digest_of(&crlf, true), digest_of(&lf, false));
    }
}
