//! Bulk array loading: a whitespace-delimited text blob to a typed `Vec` in one call.

use std::error::Error;
use std::ops::Range;
use std::str::FromStr;

use crate::error::CaseError;

/// Parse every whitespace-separated token of `text` with `FromStr`.
pub fn load_array<T>(text: &str) -> Result<Vec<T>, CaseError>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    let mut out = Vec::with_capacity(text.len() / 4);
    for token in text.split_ascii_whitespace() {
        out.push(token.parse::<T>()?);
    }
    Ok(out)
}

/// `load_array::<f64>` with `fast-float` doing the conversions.
pub fn load_f64_array(text: &str) -> Result<Vec<f64>, CaseError> {
    let mut out = Vec::with_capacity(text.len() / 4);
    for token in text.split_ascii_whitespace() {
        let v: f64 = fast_float::parse(token).map_err(|e| format!("{token:?}: {e:?}"))?;
        out.push(v);
    }
    Ok(out)
}

/// Split `block` into ranges of roughly `chunk_size` bytes that end on line
/// boundaries. The newline itself belongs to neither neighbour.
pub fn line_chunks(block: &str, chunk_size: usize) -> Vec<Range<usize>> {
    let bytes = block.as_bytes();
    let chunk_size = chunk_size.max(1);

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let probe = (pos + chunk_size).min(bytes.len());
        let end = bytes[probe..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |i| probe + i);
        out.push(pos..end);
        pos = end + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_array_types() {
        let ints: Vec<i64> = load_array("1 22\n333\t4444").unwrap();
        assert_eq!(ints, vec![1, 22, 333, 4444]);

        let floats: Vec<f64> = load_array("1.5 2\n333.323").unwrap();
        assert_eq!(floats, vec![1.5, 2.0, 333.323]);
    }

    #[test]
    fn test_load_array_rejects_garbage() {
        assert!(load_array::<i64>("1 x 3").is_err());
        assert!(load_f64_array("1.0 nope").is_err());
    }

    #[test]
    fn test_fast_float_matches_std() {
        let text = "123456 234567 333.323\n1 2 3";
        let std: Vec<f64> = load_array(text).unwrap();
        assert_eq!(load_f64_array(text).unwrap(), std);
    }

    #[test]
    fn test_line_chunks_cover_block() {
        let block = "aaa\nbbb\nccc\nddd";
        let chunks = line_chunks(block, 5);
        let pieces: Vec<&str> = chunks.iter().map(|r| &block[r.clone()]).collect();
        assert_eq!(pieces, vec!["aaa\nbbb", "ccc\nddd"]);

        let joined = pieces.join("\n");
        assert_eq!(joined, block);
    }

    #[test]
    fn test_line_chunks_trailing_newline() {
        let chunks = line_chunks("a\nb\n", 1);
        assert_eq!(chunks, vec![0..1, 2..3]);
        assert!(line_chunks("", 10).is_empty());
    }
}
