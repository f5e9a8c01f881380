//! Line-level building blocks: splitting the block into lines, tokenizing and
//! parsing single lines, and the raw byte scan that bounds everything else.

use std::hint::black_box;
use std::io::{BufRead, Cursor};
use std::sync::Arc;

use crate::cases::block::{parse_row_fast, parse_row_std, Row};
use crate::cases::total_bytes;
use crate::error::{CaseError, Result};
use crate::harness::RunState;
use crate::registry::Registry;
use crate::workload::Corpus;

const FIELDS_PER_LINE: usize = 3;

fn split_case<F>(registry: &mut Registry, name: &str, block: &Arc<String>, split: F) -> Result<()>
where
    F: Fn(&str) -> std::result::Result<usize, CaseError> + Send + Sync + 'static,
{
    let block = Arc::clone(block);
    let bytes = block.len() as u64;
    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            black_box(split(block.as_str())?);
        }
        state.set_bytes_per_iteration(bytes);
        Ok(())
    })
}

fn tokenize_case<F>(registry: &mut Registry, name: &str, lines: &Arc<Vec<String>>, tokenize: F) -> Result<()>
where
    F: for<'a> Fn(&'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> + Send + Sync + 'static,
{
    let lines = Arc::clone(lines);
    let bytes = total_bytes(lines.as_slice());
    let fields = (lines.len() * FIELDS_PER_LINE) as u64;
    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            for line in lines.iter() {
                let n = tokenize(line.as_str()).map(black_box).count();
                if n != FIELDS_PER_LINE {
                    return Err(format!("{line:?} has {n} tokens").into());
                }
            }
        }
        state.set_bytes_per_iteration(bytes);
        state.set_fields_per_iteration(fields);
        Ok(())
    })
}

fn ascii_tokens(line: &str) -> Box<dyn Iterator<Item = &str> + '_> {
    Box::new(line.split_ascii_whitespace())
}

fn space_tokens(line: &str) -> Box<dyn Iterator<Item = &str> + '_> {
    Box::new(line.split(' ').filter(|t| !t.is_empty()))
}

fn line_parse_case(
    registry: &mut Registry,
    name: &str,
    lines: &Arc<Vec<String>>,
    parse: fn(&str) -> std::result::Result<Row, CaseError>,
) -> Result<()> {
    let lines = Arc::clone(lines);
    let bytes = total_bytes(lines.as_slice());
    let fields = (lines.len() * FIELDS_PER_LINE) as u64;
    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            for line in lines.iter() {
                black_box(parse(line)?);
            }
        }
        state.set_bytes_per_iteration(bytes);
        state.set_fields_per_iteration(fields);
        Ok(())
    })
}

pub fn register(registry: &mut Registry, corpus: &Corpus) -> Result<()> {
    let block = &corpus.block;

    split_case(registry, "SplitLines/str::lines", block, |b: &str| {
        Ok(b.lines().map(black_box).count())
    })?;
    split_case(registry, "SplitLines/split('\\n')", block, |b: &str| {
        Ok(b.split('\n').map(black_box).count())
    })?;
    split_case(registry, "SplitLines/BufRead::lines", block, |b: &str| {
        let mut n = 0;
        for line in Cursor::new(b.as_bytes()).lines() {
            black_box(line?);
            n += 1;
        }
        Ok(n)
    })?;
    split_case(registry, "SplitLines/byte_scan", block, |b: &str| {
        let mut rest = b.as_bytes();
        let mut n = 0;
        while let Some(i) = rest.iter().position(|&c| c == b'\n') {
            black_box(i);
            rest = &rest[i + 1..];
            n += 1;
        }
        Ok(n)
    })?;
    split_case(registry, "ScanSpeed", block, |b: &str| {
        let mut n = 0;
        for c in b.bytes() {
            black_box(c);
            n += 1;
        }
        Ok(n)
    })?;

    tokenize_case(registry, "LineTokenize/split_ascii_whitespace", &corpus.lines, ascii_tokens)?;
    tokenize_case(registry, "LineTokenize/split(' ')", &corpus.lines, space_tokens)?;

    line_parse_case(registry, "LineParse/str::parse", &corpus.lines, parse_row_std)?;
    line_parse_case(registry, "LineParse/lexical_core+fast_float", &corpus.lines, parse_row_fast)?;

    Ok(())
}
