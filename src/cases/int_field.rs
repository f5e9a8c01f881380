//! `IntFieldParse/*`: single integer fields to `i64`.

use std::sync::Arc;

use crate::cases::bulk::load_array;
use crate::cases::{per_field_case, total_bytes, whole_case};
use crate::error::{CaseError, Result};
use crate::registry::Registry;
use crate::workload::Corpus;

fn lexical_i64(field: &str) -> std::result::Result<i64, CaseError> {
    lexical_core::parse::<i64>(field.as_bytes()).map_err(|e| format!("{field:?}: {e:?}").into())
}

pub fn register(registry: &mut Registry, corpus: &Corpus) -> Result<()> {
    let fields = &corpus.int_strings;

    per_field_case(registry, "IntFieldParse/str::parse", fields, |f: &str| {
        Ok(f.parse::<i64>()?)
    })?;

    per_field_case(registry, "IntFieldParse/from_str_radix", fields, |f: &str| {
        Ok(i64::from_str_radix(f, 10)?)
    })?;

    per_field_case(registry, "IntFieldParse/lexical_core", fields, lexical_i64)?;

    {
        let fields = Arc::clone(fields);
        let bytes = total_bytes(fields.as_slice());
        let count = fields.len() as u64;
        whole_case(registry, "IntFieldParse/collect", bytes, count, move || {
            Ok(fields
                .iter()
                .map(|f| f.parse::<i64>())
                .collect::<std::result::Result<Vec<_>, _>>()?)
        })?;
    }

    {
        // Joined once here so the timed loop only sees the conversion.
        let text = fields.join("\n");
        let bytes = total_bytes(fields.as_slice());
        let count = fields.len() as u64;
        whole_case(registry, "IntFieldParse/bulk", bytes, count, move || {
            load_array::<i64>(&text)
        })?;
    }

    per_field_case(
        registry,
        "IntFieldParse/str::parse/random",
        &corpus.random_int_strings,
        |f: &str| Ok(f.parse::<i64>()?),
    )?;

    Ok(())
}
