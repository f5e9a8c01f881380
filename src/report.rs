//! Normalizes raw timings into rates and renders the result table.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::error::{HarnessError, Result};
use crate::harness::Measured;
use crate::schema::{BenchReport, ResultRecord, Status};
use crate::ReportFormat;

/// Per-second rates for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub bytes_per_second: Option<f64>,
    pub fields_per_second: Option<f64>,
}

/// `iterations * per_iteration / elapsed` for each supplied total.
///
/// Knows nothing about what a "field" is; the case supplies both totals.
pub fn compute_rates(
    iterations: u64,
    elapsed: Duration,
    bytes_per_iteration: Option<u64>,
    fields_per_iteration: Option<u64>,
) -> Result<Rates> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Err(HarnessError::DivisionByZeroTiming { iterations });
    }

    let rate = |per_iter: u64| {
        let r = (iterations as f64) * (per_iter as f64) / secs;
        r.is_finite().then_some(r.max(0.0))
    };

    Ok(Rates {
        bytes_per_second: bytes_per_iteration.and_then(rate),
        fields_per_second: fields_per_iteration.and_then(rate),
    })
}

/// Turn a finished measurement into a report row.
pub fn record(name: &str, m: &Measured) -> Result<ResultRecord> {
    let rates = compute_rates(
        m.iterations,
        m.elapsed,
        m.bytes_per_iteration,
        m.fields_per_iteration,
    )?;

    Ok(ResultRecord {
        name: name.to_string(),
        status: Status::Ok,
        iters: m.iterations,
        rounds: m.rounds,
        total_ns: m.elapsed.as_nanos(),
        ns_per_iter: m.ns_per_iter(),
        bytes_processed: m.bytes_per_iteration.map(|b| b.saturating_mul(m.iterations)),
        throughput_bytes_per_s: rates.bytes_per_second,
        fields_converted: m.fields_per_iteration.map(|f| f.saturating_mul(m.iterations)),
        fields_per_s: rates.fields_per_second,
        error_kind: None,
        error: None,
        extra: json!({
            "repetitions": m.samples.len(),
            "samples_ns": m.samples.iter().map(|d| d.as_nanos() as u64).collect::<Vec<_>>(),
            "relative_stddev": m.relative_stddev(),
            "counters": m.counters,
        }),
    })
}

fn human_rate(v: Option<f64>, unit: &str) -> String {
    let Some(v) = v else {
        return "-".to_string();
    };
    let (scaled, prefix) = if v >= 1e9 {
        (v / 1e9, "G")
    } else if v >= 1e6 {
        (v / 1e6, "M")
    } else if v >= 1e3 {
        (v / 1e3, "k")
    } else {
        (v, "")
    };
    format!("{scaled:.2} {prefix}{unit}/s")
}

fn human_duration(ns: u128) -> String {
    let ns = ns as f64;
    if ns >= 1e9 {
        format!("{:.3} s", ns / 1e9)
    } else if ns >= 1e6 {
        format!("{:.3} ms", ns / 1e6)
    } else if ns >= 1e3 {
        format!("{:.3} us", ns / 1e3)
    } else {
        format!("{ns:.0} ns")
    }
}

/// Fixed-width table in result order.
pub struct Table<'a>(pub &'a [ResultRecord]);

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_w = self
            .0
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("Case".len());

        writeln!(
            f,
            "{:<name_w$}  {:>12}  {:>12}  {:>16}  {:>16}",
            "Case", "Iterations", "Time", "Bytes", "Fields"
        )?;
        writeln!(f, "{}", "-".repeat(name_w + 2 + 12 + 2 + 12 + 2 + 16 + 2 + 16))?;

        for r in self.0 {
            match r.status {
                Status::Ok => writeln!(
                    f,
                    "{:<name_w$}  {:>12}  {:>12}  {:>16}  {:>16}",
                    r.name,
                    r.iters,
                    human_duration(r.total_ns),
                    human_rate(r.throughput_bytes_per_s, "B"),
                    human_rate(r.fields_per_s, "fld"),
                )?,
                Status::Failed => writeln!(
                    f,
                    "{:<name_w$}  {}: {}",
                    r.name,
                    r.error_kind.as_deref().unwrap_or("Failed"),
                    r.error.as_deref().unwrap_or(""),
                )?,
            }
        }
        Ok(())
    }
}

pub fn render_table(results: &[ResultRecord]) -> String {
    Table(results).to_string()
}

pub fn render(report: &BenchReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Table => Ok(render_table(&report.results)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

pub fn write_json<P: AsRef<Path>>(path: P, report: &BenchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_rate_normalized() {
        let rates = compute_rates(100, Duration::from_secs(2), Some(50), None).unwrap();
        let bps = rates.bytes_per_second.unwrap();
        assert!((bps - 2500.0).abs() < 1e-9);
        assert_eq!(rates.fields_per_second, None);
    }

    #[test]
    fn test_fields_rate_normalized() {
        let rates = compute_rates(4, Duration::from_millis(500), Some(10), Some(3)).unwrap();
        assert!((rates.bytes_per_second.unwrap() - 80.0).abs() < 1e-9);
        assert!((rates.fields_per_second.unwrap() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_elapsed_rejected() {
        let err = compute_rates(100, Duration::ZERO, Some(50), Some(1)).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::DivisionByZeroTiming { iterations: 100 }
        ));
    }

    #[test]
    fn test_record_from_measurement() {
        let m = Measured {
            iterations: 10,
            elapsed: Duration::from_millis(100),
            rounds: 2,
            samples: vec![Duration::from_millis(100)],
            bytes_per_iteration: Some(7),
            fields_per_iteration: Some(2),
            counters: [("threads".to_string(), 2.0)].into_iter().collect(),
        };
        let r = record("IntFieldParse/x", &m).unwrap();
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.bytes_processed, Some(70));
        assert_eq!(r.fields_converted, Some(20));
        assert!((r.fields_per_s.unwrap() - 200.0).abs() < 1e-9);
        assert_eq!(r.total_ns, 100_000_000);
        assert_eq!(r.extra["counters"]["threads"], 2.0);
    }

    #[test]
    fn test_table_lists_failures() {
        let ok = ResultRecord {
            name: "A".into(),
            status: Status::Ok,
            iters: 5,
            rounds: 1,
            total_ns: 2_000_000,
            ns_per_iter: 400_000.0,
            bytes_processed: Some(10),
            throughput_bytes_per_s: Some(5_000.0),
            fields_converted: None,
            fields_per_s: None,
            error_kind: None,
            error: None,
            extra: serde_json::Value::Null,
        };
        let bad = ResultRecord::failed("LongerName/b", "CaseFailed", "boom".into());
        let table = render_table(&[ok, bad]);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("A "));
        assert!(lines[2].contains("5.00 kB/s"));
        assert!(lines[2].contains("2.000 ms"));
        assert!(lines[2].ends_with('-'));
        assert!(lines[3].contains("CaseFailed: boom"));
    }

    #[test]
    fn test_human_rate_units() {
        assert_eq!(human_rate(None, "B"), "-");
        assert_eq!(human_rate(Some(12.0), "fld"), "12.00 fld/s");
        assert_eq!(human_rate(Some(2.5e6), "fld"), "2.50 Mfld/s");
        assert_eq!(human_rate(Some(3.5e9), "B"), "3.50 GB/s");
    }
}
