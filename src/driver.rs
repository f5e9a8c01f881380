use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};
use regex::Regex;

use crate::error::{HarnessError, Result};
use crate::harness::{run_adaptive, TimingConfig};
use crate::registry::{CaseBody, Registry};
use crate::report;
use crate::schema::ResultRecord;

/// Case-name selector. A name matches when it contains the pattern verbatim
/// or when the pattern, read as a regular expression, matches it. Case names
/// such as `BlockParse/lexical_core+fast_float` therefore select themselves.
///
/// A pattern that is not a valid regular expression still works as a
/// literal; it is only an error when it is neither.
#[derive(Debug, Clone)]
pub struct CaseFilter {
    pattern: String,
    re: Option<Regex>,
}

impl CaseFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let re = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e @ regex::Error::CompiledTooBig(_)) => return Err(e.into()),
            Err(e) => {
                debug!("filter {pattern:?} is not a regex ({e}); matching it literally");
                None
            }
        };
        Ok(Self {
            pattern: pattern.to_string(),
            re,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        name.contains(self.pattern.as_str()) || self.re.as_ref().is_some_and(|re| re.is_match(name))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Names selected by `filter`, in registration order.
pub fn select<'a>(registry: &'a Registry, filter: Option<&CaseFilter>) -> Result<Vec<&'a str>> {
    let selected: Vec<&str> = registry
        .list_cases()
        .filter(|name| filter.map_or(true, |f| f.matches(name)))
        .collect();

    if selected.is_empty() {
        return Err(HarnessError::NoMatchingCases {
            filter: filter.map(|f| f.pattern().to_string()).unwrap_or_default(),
        });
    }
    Ok(selected)
}

pub struct Driver<'a> {
    registry: &'a Registry,
    timing: TimingConfig,
}

impl<'a> Driver<'a> {
    pub fn new(registry: &'a Registry, timing: TimingConfig) -> Self {
        Self { registry, timing }
    }

    /// Run every selected case, one at a time. Failures inside a case become
    /// failed rows; only selection errors abort the run.
    pub fn run(&self, filter: Option<&CaseFilter>) -> Result<Vec<ResultRecord>> {
        let names = select(self.registry, filter)?;
        info!("running {} of {} cases", names.len(), self.registry.len());

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let body = self.registry.get(name)?;
            info!("{name}: started");

            let row = match self.run_case(body).and_then(|m| report::record(name, &m)) {
                Ok(row) => {
                    info!(
                        "{name}: {} iterations in {} ns",
                        row.iters, row.total_ns
                    );
                    row
                }
                Err(e) if e.is_case_local() => {
                    warn!("{name}: {e}");
                    ResultRecord::failed(name, e.kind(), e.to_string())
                }
                Err(e) => return Err(e),
            };
            results.push(row);
        }
        Ok(results)
    }

    fn run_case(&self, body: &CaseBody) -> Result<crate::harness::Measured> {
        match panic::catch_unwind(AssertUnwindSafe(|| run_adaptive(body.as_ref(), &self.timing))) {
            Ok(res) => res,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "case body panicked".to_string());
                Err(HarnessError::CaseFailed(format!("panic: {msg}").into()))
            }
        }
    }
}

/// Process exit status for a finished (or aborted) run.
pub fn exit_status(result: &Result<Vec<ResultRecord>>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(HarnessError::NoMatchingCases { .. }) => 1,
        Err(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaseError;
    use crate::harness::RunState;
    use std::time::Duration;

    fn noop(state: &mut RunState) -> std::result::Result<(), CaseError> {
        while state.should_continue() {
            std::hint::black_box(0u8);
        }
        state.set_fields_per_iteration(1);
        Ok(())
    }

    fn timing() -> TimingConfig {
        TimingConfig {
            min_time: Duration::from_micros(200),
            ..TimingConfig::default()
        }
    }

    #[test]
    fn test_filter_substring() {
        let mut reg = Registry::new();
        reg.register("IntFieldParse/a", noop).unwrap();
        reg.register("DoubleFieldParse/b", noop).unwrap();

        let f = CaseFilter::new("Int").unwrap();
        assert_eq!(select(&reg, Some(&f)).unwrap(), vec!["IntFieldParse/a"]);
        assert_eq!(select(&reg, None).unwrap().len(), 2);
    }

    #[test]
    fn test_no_match_is_an_error() {
        let mut reg = Registry::new();
        reg.register("IntFieldParse/a", noop).unwrap();

        let f = CaseFilter::new("Block").unwrap();
        let res = Driver::new(&reg, timing()).run(Some(&f));
        assert!(matches!(res, Err(HarnessError::NoMatchingCases { ref filter }) if filter == "Block"));
        assert_eq!(exit_status(&res), 1);
    }

    #[test]
    fn test_exact_names_select_themselves() {
        let names = [
            "BlockParse/lexical_core+fast_float",
            "SplitLines/split('\\n')",
            "DoubleFieldParse/bulk+fast_float",
            "DoubleFieldFormat/write!",
        ];
        let mut reg = Registry::new();
        for name in names {
            reg.register(name, noop).unwrap();
        }
        reg.register("BlockParse/bulk", noop).unwrap();

        for name in names {
            let f = CaseFilter::new(name).unwrap();
            assert_eq!(select(&reg, Some(&f)).unwrap(), vec![name], "{name}");
        }
    }

    #[test]
    fn test_regex_filter() {
        let mut reg = Registry::new();
        reg.register("BlockParse/bulk", noop).unwrap();
        reg.register("BlockParse/bulk+fast_float", noop).unwrap();
        reg.register("IntFieldParse/bulk", noop).unwrap();

        let f = CaseFilter::new("^BlockParse/bulk$").unwrap();
        assert_eq!(select(&reg, Some(&f)).unwrap(), vec!["BlockParse/bulk"]);

        let f = CaseFilter::new("Parse/bulk$").unwrap();
        assert_eq!(
            select(&reg, Some(&f)).unwrap(),
            vec!["BlockParse/bulk", "IntFieldParse/bulk"]
        );
    }

    #[test]
    fn test_unparsable_regex_matches_literally() {
        let mut reg = Registry::new();
        reg.register("SplitLines/split('\\n')", noop).unwrap();
        reg.register("SplitLines/str::lines", noop).unwrap();

        let f = CaseFilter::new("split(").unwrap();
        assert_eq!(
            select(&reg, Some(&f)).unwrap(),
            vec!["SplitLines/split('\\n')"]
        );
    }

    #[test]
    fn test_panic_is_isolated() {
        let mut reg = Registry::new();
        reg.register("a", noop).unwrap();
        reg.register("b", |_: &mut RunState| -> std::result::Result<(), CaseError> {
            panic!("kaboom")
        })
        .unwrap();
        reg.register("c", noop).unwrap();

        let res = Driver::new(&reg, timing()).run(None);
        assert_eq!(exit_status(&res), 0);
        let rows = res.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(!rows[0].is_failed());
        assert!(rows[1].is_failed());
        assert_eq!(rows[1].error_kind.as_deref(), Some("CaseFailed"));
        assert!(rows[1].error.as_deref().unwrap().contains("kaboom"));
        assert!(!rows[2].is_failed());
    }
}
