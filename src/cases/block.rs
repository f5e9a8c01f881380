//! `BlockParse/*` and `BlockParseParallel/*`: the whole newline-delimited
//! `row col value` block in one pass.

use std::hint::black_box;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::cases::bulk::{line_chunks, load_array, load_f64_array};
use crate::cases::whole_case;
use crate::error::{CaseError, Result};
use crate::harness::RunState;
use crate::registry::Registry;
use crate::workload::Corpus;

/// Chunk sizes swept by the parallel cases.
pub const PARALLEL_CHUNK_BYTES: [usize; 2] = [64 * 1024, 1024 * 1024];

/// Worker counts swept by the parallel cases.
pub const PARALLEL_THREADS: [usize; 4] = [1, 2, 4, 8];

pub type Row = (i64, i64, f64);

/// `row col value` with std conversions.
pub fn parse_row_std(line: &str) -> std::result::Result<Row, CaseError> {
    let mut it = line.split_ascii_whitespace();
    let row = it.next().ok_or("missing row")?.parse::<i64>()?;
    let col = it.next().ok_or("missing col")?.parse::<i64>()?;
    let value = it.next().ok_or("missing value")?.parse::<f64>()?;
    if it.next().is_some() {
        return Err(format!("trailing fields in {line:?}").into());
    }
    Ok((row, col, value))
}

/// `row col value` with `lexical-core` integers and a `fast-float` value,
/// scanning bytes instead of splitting into tokens. A trailing `'\r'` is
/// whitespace, so CRLF blocks parse the same as LF ones.
pub fn parse_row_fast(line: &str) -> std::result::Result<Row, CaseError> {
    let bytes = line.as_bytes();
    let skip_ws = |mut i: usize| {
        while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\r') {
            i += 1;
        }
        i
    };

    let start = skip_ws(0);
    let (row, n) = lexical_core::parse_partial::<i64>(&bytes[start..])
        .map_err(|e| format!("row in {line:?}: {e:?}"))?;

    let start = skip_ws(start + n);
    let (col, n) = lexical_core::parse_partial::<i64>(&bytes[start..])
        .map_err(|e| format!("col in {line:?}: {e:?}"))?;

    let start = skip_ws(start + n);
    let (value, n) = fast_float::parse_partial::<f64, _>(&bytes[start..])
        .map_err(|e| format!("value in {line:?}: {e:?}"))?;

    if skip_ws(start + n) != bytes.len() {
        return Err(format!("trailing bytes in {line:?}").into());
    }
    Ok((row, col, value))
}

fn parse_text<P>(text: &str, parse: P) -> std::result::Result<usize, CaseError>
where
    P: Fn(&str) -> std::result::Result<Row, CaseError>,
{
    let mut rows = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        black_box(parse(line)?);
        rows += 1;
    }
    Ok(rows)
}

fn row_case<P>(registry: &mut Registry, name: &str, block: &Arc<String>, rows: u64, parse: P) -> Result<()>
where
    P: Fn(&str) -> std::result::Result<Row, CaseError> + Send + Sync + 'static,
{
    let block = Arc::clone(block);
    let bytes = block.len() as u64;
    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            let parsed = parse_text(&block, &parse)?;
            if parsed as u64 != rows {
                return Err(format!("parsed {parsed} rows, expected {rows}").into());
            }
        }
        state.set_bytes_per_iteration(bytes);
        state.set_fields_per_iteration(rows * 3);
        Ok(())
    })
}

/// `64KiB`, `1MiB`, ...
fn size_label(bytes: usize) -> String {
    if bytes >= 1 << 20 && bytes % (1 << 20) == 0 {
        format!("{}MiB", bytes >> 20)
    } else if bytes >= 1 << 10 && bytes % (1 << 10) == 0 {
        format!("{}KiB", bytes >> 10)
    } else {
        format!("{bytes}B")
    }
}

fn parallel_case(
    registry: &mut Registry,
    name: &str,
    block: &Arc<String>,
    rows: u64,
    parse: fn(&str) -> std::result::Result<Row, CaseError>,
    pool: &Arc<ThreadPool>,
    chunk_bytes: usize,
) -> Result<()> {
    let block = Arc::clone(block);
    let pool = Arc::clone(pool);
    let chunks = line_chunks(&block, chunk_bytes);
    let bytes = block.len() as u64;
    let name = format!(
        "{name}/{}/{}",
        size_label(chunk_bytes),
        pool.current_num_threads()
    );

    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            let parsed: usize = pool.install(|| {
                chunks
                    .par_iter()
                    .map(|range| parse_text(&block[range.clone()], parse))
                    .try_reduce(|| 0, |a, b| Ok(a + b))
            })?;
            if parsed as u64 != rows {
                return Err(format!("parsed {parsed} rows, expected {rows}").into());
            }
        }
        state.set_bytes_per_iteration(bytes);
        state.set_fields_per_iteration(rows * 3);
        state.set_counter("threads", pool.current_num_threads() as f64);
        state.set_counter("chunk_bytes", chunk_bytes as f64);
        state.set_counter("chunks", chunks.len() as f64);
        Ok(())
    })
}

pub fn register(registry: &mut Registry, corpus: &Corpus) -> Result<()> {
    let block = &corpus.block;
    let rows = block.lines().filter(|l| !l.trim().is_empty()).count() as u64;
    let tokens = block.split_ascii_whitespace().count() as u64;
    let bytes = block.len() as u64;

    row_case(registry, "BlockParse/split_ascii_whitespace+parse", block, rows, parse_row_std)?;
    row_case(registry, "BlockParse/lexical_core+fast_float", block, rows, parse_row_fast)?;

    {
        let block = Arc::clone(block);
        whole_case(registry, "BlockParse/bulk", bytes, tokens, move || {
            load_array::<f64>(&block)
        })?;
    }
    {
        let block = Arc::clone(block);
        whole_case(registry, "BlockParse/bulk+fast_float", bytes, tokens, move || {
            load_f64_array(&block)
        })?;
    }

    // One pool per worker count, shared by every case that uses it.
    let pools = PARALLEL_THREADS
        .iter()
        .map(|&n| ThreadPoolBuilder::new().num_threads(n).build().map(Arc::new))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for pool in &pools {
        for chunk_bytes in PARALLEL_CHUNK_BYTES {
            parallel_case(
                registry,
                "BlockParseParallel/rayon+lexical_core+fast_float",
                block,
                rows,
                parse_row_fast,
                pool,
                chunk_bytes,
            )?;
        }
    }
    for pool in &pools {
        parallel_case(
            registry,
            "BlockParseParallel/rayon+parse",
            block,
            rows,
            parse_row_std,
            pool,
            PARALLEL_CHUNK_BYTES[1],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{build_block, CorpusConfig, LINE_SEED};

    #[test]
    fn test_row_parsers_agree() {
        for line in ["123456 234567 333.323", "1 234567 333.323", "1 2 3", "  7\t8  9.5 "] {
            assert_eq!(parse_row_std(line).unwrap(), parse_row_fast(line).unwrap(), "{line}");
        }
        assert_eq!(parse_row_std("1 2 3").unwrap(), (1, 2, 3.0));
    }

    #[test]
    fn test_row_parsers_reject_bad_lines() {
        for line in ["1 2", "1 2 3 4", "a 2 3", "1 2 x"] {
            assert!(parse_row_std(line).is_err(), "std {line}");
            assert!(parse_row_fast(line).is_err(), "fast {line}");
        }
    }

    #[test]
    fn test_row_parsers_accept_crlf() {
        for line in ["1 2 3\r", "123456 234567 333.323\r"] {
            assert_eq!(parse_row_std(line).unwrap(), parse_row_fast(line).unwrap(), "{line:?}");
        }
    }

    #[test]
    fn test_size_labels() {
        assert_eq!(size_label(64 * 1024), "64KiB");
        assert_eq!(size_label(1024 * 1024), "1MiB");
        assert_eq!(size_label(1000), "1000B");
    }

    fn crlf_corpus() -> Corpus {
        let config = CorpusConfig {
            field_target: 4,
            block_lines: 0,
            seed: 0,
        };
        let block = build_block(&LINE_SEED, 12_000).unwrap().replace('\n', "\r\n");
        Corpus::with_block(&config, block).unwrap()
    }

    #[test]
    fn test_parallel_sweep_registered() {
        let mut reg = Registry::new();
        register(&mut reg, &crlf_corpus()).unwrap();

        let parallel: Vec<&str> = reg
            .list_cases()
            .filter(|n| n.starts_with("BlockParseParallel/"))
            .collect();
        assert_eq!(
            parallel.len(),
            PARALLEL_THREADS.len() * (PARALLEL_CHUNK_BYTES.len() + 1)
        );
        assert!(parallel.contains(&"BlockParseParallel/rayon+lexical_core+fast_float/64KiB/4"));
        assert!(parallel.contains(&"BlockParseParallel/rayon+parse/1MiB/8"));
    }

    #[test]
    fn test_crlf_block_parses_everywhere() {
        let corpus = crlf_corpus();
        assert!(corpus.block.len() > PARALLEL_CHUNK_BYTES[0]);

        let mut reg = Registry::new();
        register(&mut reg, &corpus).unwrap();

        for name in reg.list_cases() {
            let body = reg.get(name).unwrap();
            let mut state = RunState::new(1);
            body(&mut state).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(state.fields_per_iteration(), Some(12_288 * 3), "{name}");
        }

        let body = reg
            .get("BlockParseParallel/rayon+lexical_core+fast_float/64KiB/2")
            .unwrap();
        let mut state = RunState::new(1);
        body(&mut state).unwrap();
        assert_eq!(state.counters().get("threads"), Some(&2.0));
        assert!(state.counters()["chunks"] >= 2.0);
    }

    #[test]
    fn test_parse_text_skips_blank_lines() {
        assert_eq!(parse_text("1 2 3\n\n4 5 6\n", parse_row_std).unwrap(), 2);
    }
}
