//! Synthetic workload generation for the parsing benchmarks.
//!
//! Every workload is built once per process from a small seed list and is
//! shared read-only by the case closures that time it.
//!
//! # Block file format
//!
//! ```text
//! Header:
//!   magic: [u8; 8]  = b"NPB_BLK1"
//!   version: u32    = 1
//!   lines: u64      = number of newline-separated lines
//!   bytes: u64      = length of the text body
//!   reserved: [u8; 12] = zeros
//!
//! Body:
//!   text: [u8; bytes] (UTF-8)
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{HarnessError, Result};

/// Integer fields, kept in sync with the block lines below.
pub const INT_SEED: [&str; 2] = ["123456", "1"];

pub const DOUBLE_SEED: [&str; 3] = ["123456", "1", "333.323"];

pub const DOUBLE_VALUE_SEED: [f64; 3] = [123456.0, 1.0, 333.323];

/// Three-field `row col value` lines.
pub const LINE_SEED: [&str; 3] = ["123456 234567 333.323", "1 234567 333.323", "1 2 3"];

const MAGIC: &[u8; 8] = b"NPB_BLK1";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: u64 = 8 + 4 + 8 + 8 + 12;

/// Repeatedly concatenate `seed` with itself until it holds at least
/// `target_len` elements. The result length is always `seed.len() * 2^k`.
pub fn grow_by_doubling<T: Clone>(seed: &[T], target_len: usize) -> Result<Vec<T>> {
    if seed.is_empty() {
        return Err(HarnessError::InvalidWorkloadSeed);
    }

    let mut out = seed.to_vec();
    while out.len() < target_len {
        out.extend_from_within(..);
    }
    Ok(out)
}

/// Doubled lines joined by a single `'\n'` (no trailing newline).
pub fn build_block<S: AsRef<str> + Clone>(seed_lines: &[S], target_lines: usize) -> Result<String> {
    let lines = grow_by_doubling(seed_lines, target_lines)?;
    let bytes: usize = lines.iter().map(|l| l.as_ref().len() + 1).sum();

    let mut block = String::with_capacity(bytes);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            block.push('\n');
        }
        block.push_str(line.as_ref());
    }
    Ok(block)
}

/// Append whole `line\n` chunks until the block reaches `byte_target` bytes.
pub fn construct_many_lines<S: AsRef<str>>(seed_lines: &[S], byte_target: usize) -> Result<String> {
    if seed_lines.is_empty() {
        return Err(HarnessError::InvalidWorkloadSeed);
    }

    let mut chunk = String::new();
    for line in seed_lines {
        chunk.push_str(line.as_ref());
        chunk.push('\n');
    }

    let mut block = String::with_capacity(byte_target + chunk.len());
    while block.len() < byte_target {
        block.push_str(&chunk);
    }
    Ok(block)
}

/// Requested size of a generated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSize {
    /// At least this many lines, doubled from the seed; no trailing newline.
    Lines(usize),
    /// At least this many bytes of whole `line\n` chunks.
    Bytes(usize),
}

/// Block text from [`LINE_SEED`] at the requested size.
pub fn generate_block(size: BlockSize) -> Result<String> {
    match size {
        BlockSize::Lines(n) => build_block(&LINE_SEED, n),
        BlockSize::Bytes(n) => construct_many_lines(&LINE_SEED, n),
    }
}

/// Deterministic integer literals of 1 to 18 digits.
pub fn random_int_strings(rng: &mut ChaCha8Rng, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let digits = rng.gen_range(1..=18u32);
            let max = 10u64.pow(digits);
            let min = if digits == 1 { 0 } else { 10u64.pow(digits - 1) };
            rng.gen_range(min..max).to_string()
        })
        .collect()
}

/// Deterministic decimal literals with 0 to 9 fractional digits.
pub fn random_double_strings(rng: &mut ChaCha8Rng, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let precision = rng.gen_range(0..=9usize);
            let magnitude = 10f64.powi(rng.gen_range(0..=8));
            let value: f64 = rng.gen::<f64>() * magnitude;
            format!("{value:.precision$}")
        })
        .collect()
}

/// SHA-256 hex digest over the items, each followed by `'\n'`.
pub fn fingerprint<S: AsRef<str>>(items: &[S]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Size and digest of one workload, recorded in the report metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    pub items: usize,
    pub bytes: usize,
    pub sha256: String,
}

impl WorkloadInfo {
    pub fn of<S: AsRef<str>>(items: &[S]) -> Self {
        Self {
            items: items.len(),
            bytes: items.iter().map(|s| s.as_ref().len()).sum(),
            sha256: fingerprint(items),
        }
    }
}

/// Sizes for the standard corpus.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Minimum element count for the single-field corpora.
    pub field_target: usize,
    /// Minimum line count for the text block.
    pub block_lines: usize,
    /// Seed for the random corpora.
    pub seed: u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            field_target: 1_000,
            block_lines: 100_000,
            seed: 0,
        }
    }
}

/// Every workload the built-in suites time, built once.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub int_strings: Arc<Vec<String>>,
    pub double_strings: Arc<Vec<String>>,
    pub double_values: Arc<Vec<f64>>,
    pub random_int_strings: Arc<Vec<String>>,
    pub random_double_strings: Arc<Vec<String>>,
    pub lines: Arc<Vec<String>>,
    pub block: Arc<String>,
}

impl Corpus {
    pub fn build(config: &CorpusConfig) -> Result<Self> {
        let block = build_block(&LINE_SEED, config.block_lines)?;
        Self::with_block(config, block)
    }

    /// Same as [`Corpus::build`] but times an externally supplied block.
    pub fn with_block(config: &CorpusConfig, block: String) -> Result<Self> {
        let owned = |seed: &[&str]| -> Vec<String> { seed.iter().map(|s| s.to_string()).collect() };

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let random_ints = random_int_strings(&mut rng, config.field_target);
        let random_doubles = random_double_strings(&mut rng, config.field_target);

        Ok(Self {
            int_strings: Arc::new(grow_by_doubling(&owned(&INT_SEED), config.field_target)?),
            double_strings: Arc::new(grow_by_doubling(&owned(&DOUBLE_SEED), config.field_target)?),
            double_values: Arc::new(grow_by_doubling(&DOUBLE_VALUE_SEED, config.field_target)?),
            random_int_strings: Arc::new(random_ints),
            random_double_strings: Arc::new(random_doubles),
            lines: Arc::new(owned(&LINE_SEED)),
            block: Arc::new(block),
        })
    }

    /// Workload sizes and digests keyed by workload name.
    pub fn describe(&self) -> Vec<(String, WorkloadInfo)> {
        vec![
            ("int_strings".to_string(), WorkloadInfo::of(self.int_strings.as_slice())),
            ("double_strings".to_string(), WorkloadInfo::of(self.double_strings.as_slice())),
            (
                "random_int_strings".to_string(),
                WorkloadInfo::of(self.random_int_strings.as_slice()),
            ),
            (
                "random_double_strings".to_string(),
                WorkloadInfo::of(self.random_double_strings.as_slice()),
            ),
            ("lines".to_string(), WorkloadInfo::of(self.lines.as_slice())),
            ("block".to_string(), WorkloadInfo::of(&[self.block.as_str()])),
        ]
    }
}

/// Block file metadata from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
    pub lines: u64,
    pub bytes: u64,
}

fn write_header<W: Write>(writer: &mut W, meta: &BlockMeta) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&meta.lines.to_le_bytes())?;
    writer.write_all(&meta.bytes.to_le_bytes())?;
    writer.write_all(&[0u8; 12])?; // reserved
    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<BlockMeta> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(HarnessError::InvalidBlockFile(format!(
            "bad magic bytes: expected {:?}, got {:?}",
            MAGIC, magic
        )));
    }

    let mut buf4 = [0u8; 4];
    let mut buf8 = [0u8; 8];

    reader.read_exact(&mut buf4)?;
    let version = u32::from_le_bytes(buf4);
    if version != FORMAT_VERSION {
        return Err(HarnessError::InvalidBlockFile(format!(
            "unsupported format version: {version}"
        )));
    }

    reader.read_exact(&mut buf8)?;
    let lines = u64::from_le_bytes(buf8);

    reader.read_exact(&mut buf8)?;
    let bytes = u64::from_le_bytes(buf8);

    let mut reserved = [0u8; 12];
    reader.read_exact(&mut reserved)?;

    Ok(BlockMeta { lines, bytes })
}

/// Persist a text block so that later runs can time identical input.
pub fn write_block<P: AsRef<Path>>(path: P, block: &str) -> Result<BlockMeta> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);

    let meta = BlockMeta {
        lines: block.lines().count() as u64,
        bytes: block.len() as u64,
    };
    write_header(&mut writer, &meta)?;
    writer.write_all(block.as_bytes())?;
    writer.flush()?;
    Ok(meta)
}

pub fn read_block_meta<P: AsRef<Path>>(path: P) -> Result<BlockMeta> {
    let mut reader = BufReader::new(File::open(path)?);
    read_header(&mut reader)
}

pub fn load_block<P: AsRef<Path>>(path: P) -> Result<(BlockMeta, String)> {
    let file = File::open(path)?;
    let body_len = file.metadata()?.len().saturating_sub(HEADER_LEN);
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let meta = read_header(&mut reader)?;

    // The header is untrusted; size the buffer from the file instead.
    if meta.bytes != body_len {
        return Err(HarnessError::InvalidBlockFile(format!(
            "header says {} bytes, body has {}",
            meta.bytes, body_len
        )));
    }

    let mut body = Vec::with_capacity(body_len as usize);
    reader.read_to_end(&mut body)?;
    if body.len() as u64 != meta.bytes {
        return Err(HarnessError::InvalidBlockFile(format!(
            "header says {} bytes, body has {}",
            meta.bytes,
            body.len()
        )));
    }

    let text = String::from_utf8(body)
        .map_err(|e| HarnessError::InvalidBlockFile(format!("body is not UTF-8: {e}")))?;
    Ok((meta, text))
}
