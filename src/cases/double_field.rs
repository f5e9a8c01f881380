//! `DoubleFieldParse/*` and `DoubleFieldFormat/*`.

use std::fmt::Write as _;
use std::hint::black_box;
use std::sync::Arc;

use crate::cases::bulk::{load_array, load_f64_array};
use crate::cases::{per_field_case, total_bytes, whole_case};
use crate::error::{CaseError, Result};
use crate::harness::RunState;
use crate::registry::Registry;
use crate::workload::Corpus;

fn fast_f64(field: &str) -> std::result::Result<f64, CaseError> {
    fast_float::parse::<f64, _>(field).map_err(|e| format!("{field:?}: {e:?}").into())
}

fn lexical_f64(field: &str) -> std::result::Result<f64, CaseError> {
    lexical_core::parse::<f64>(field.as_bytes()).map_err(|e| format!("{field:?}: {e:?}").into())
}

pub fn register(registry: &mut Registry, corpus: &Corpus) -> Result<()> {
    let fields = &corpus.double_strings;

    per_field_case(registry, "DoubleFieldParse/str::parse", fields, |f: &str| {
        Ok(f.parse::<f64>()?)
    })?;
    per_field_case(registry, "DoubleFieldParse/fast_float", fields, fast_f64)?;
    per_field_case(registry, "DoubleFieldParse/lexical_core", fields, lexical_f64)?;

    {
        let fields = Arc::clone(fields);
        let bytes = total_bytes(fields.as_slice());
        let count = fields.len() as u64;
        whole_case(registry, "DoubleFieldParse/collect", bytes, count, move || {
            Ok(fields
                .iter()
                .map(|f| f.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()?)
        })?;
    }

    {
        let text = Arc::new(fields.join("\n"));
        let bytes = total_bytes(fields.as_slice());
        let count = fields.len() as u64;

        let std_text = Arc::clone(&text);
        whole_case(registry, "DoubleFieldParse/bulk", bytes, count, move || {
            load_array::<f64>(&std_text)
        })?;
        whole_case(registry, "DoubleFieldParse/bulk+fast_float", bytes, count, move || {
            load_f64_array(&text)
        })?;
    }

    per_field_case(
        registry,
        "DoubleFieldParse/str::parse/random",
        &corpus.random_double_strings,
        |f: &str| Ok(f.parse::<f64>()?),
    )?;

    register_format(registry, &corpus.double_values)
}

/// Shortest round-trip formatting of `f64` values.
fn register_format(registry: &mut Registry, values: &Arc<Vec<f64>>) -> Result<()> {
    let count = values.len() as u64;
    let bytes: u64 = values.iter().map(|v| v.to_string().len() as u64).sum();

    {
        let values = Arc::clone(values);
        registry.register("DoubleFieldFormat/to_string", move |state: &mut RunState| {
            while state.should_continue() {
                for v in values.iter() {
                    black_box(v.to_string());
                }
            }
            state.set_bytes_per_iteration(bytes);
            state.set_fields_per_iteration(count);
            Ok(())
        })?;
    }

    {
        let values = Arc::clone(values);
        registry.register("DoubleFieldFormat/write!", move |state: &mut RunState| {
            let mut buf = String::with_capacity(32);
            while state.should_continue() {
                for v in values.iter() {
                    buf.clear();
                    write!(buf, "{v}")?;
                    black_box(buf.as_str());
                }
            }
            state.set_bytes_per_iteration(bytes);
            state.set_fields_per_iteration(count);
            Ok(())
        })?;
    }

    {
        let values = Arc::clone(values);
        registry.register("DoubleFieldFormat/lexical_core", move |state: &mut RunState| {
            let mut buf = [0u8; lexical_core::BUFFER_SIZE];
            while state.should_continue() {
                for v in values.iter() {
                    black_box(lexical_core::write(*v, &mut buf).len());
                }
            }
            state.set_bytes_per_iteration(bytes);
            state.set_fields_per_iteration(count);
            Ok(())
        })?;
    }

    Ok(())
}
