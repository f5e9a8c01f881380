//! Built-in benchmark suites.
//!
//! Each suite is a plain function that registers its cases; [`SUITES`] is the
//! static list the entry point walks. Workloads come from a [`Corpus`] built
//! before registration and are captured by the case closures.

use std::hint::black_box;
use std::sync::Arc;

use crate::error::{CaseError, Result};
use crate::harness::RunState;
use crate::registry::Registry;
use crate::workload::Corpus;

pub mod block;
pub mod bulk;
pub mod double_field;
pub mod int_field;
pub mod lines;

pub type Suite = fn(&mut Registry, &Corpus) -> Result<()>;

pub const SUITES: &[Suite] = &[
    int_field::register,
    double_field::register,
    lines::register,
    block::register,
];

/// Register every built-in case in suite order.
pub fn register_all(registry: &mut Registry, corpus: &Corpus) -> Result<()> {
    for suite in SUITES {
        suite(registry, corpus)?;
    }
    Ok(())
}

pub(crate) fn total_bytes<S: AsRef<str>>(items: &[S]) -> u64 {
    items.iter().map(|s| s.as_ref().len() as u64).sum()
}

/// One conversion call per field, results discarded through `black_box`.
pub(crate) fn per_field_case<T, P>(
    registry: &mut Registry,
    name: &str,
    fields: &Arc<Vec<String>>,
    parse: P,
) -> Result<()>
where
    P: Fn(&str) -> std::result::Result<T, CaseError> + Send + Sync + 'static,
{
    let fields = Arc::clone(fields);
    let bytes = total_bytes(fields.as_slice());
    let count = fields.len() as u64;

    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            for field in fields.iter() {
                black_box(parse(field.as_str())?);
            }
        }
        state.set_bytes_per_iteration(bytes);
        state.set_fields_per_iteration(count);
        Ok(())
    })
}

/// Whole-workload conversion that yields one value per field.
pub(crate) fn whole_case<T, P>(
    registry: &mut Registry,
    name: &str,
    bytes: u64,
    fields: u64,
    convert: P,
) -> Result<()>
where
    P: Fn() -> std::result::Result<Vec<T>, CaseError> + Send + Sync + 'static,
{
    registry.register(name, move |state: &mut RunState| {
        while state.should_continue() {
            let values = convert()?;
            if values.len() as u64 != fields {
                return Err(format!("expected {fields} values, got {}", values.len()).into());
            }
            black_box(values);
        }
        state.set_bytes_per_iteration(bytes);
        state.set_fields_per_iteration(fields);
        Ok(())
    })
}
