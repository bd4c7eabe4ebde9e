use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Filter, Native, RcIter};
use jaq_json::Val;
use tracing::debug;

use super::shape_results;
use crate::error::{JsonMapError, Result};
use crate::value::DecodedValue;

/// A compiled jq program with the jq standard library in scope.
pub struct JqFilter {
    source: String,
    filter: Filter<Native<Val>>,
}

impl fmt::Debug for JqFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JqFilter").field("source", &self.source).finish()
    }
}

impl JqFilter {
    /// Loads and compiles `source`. A blank program is the identity filter.
    pub fn parse(source: &str) -> Result<Self> {
        let code = if source.trim().is_empty() { "." } else { source };

        let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = Arena::default();
        let modules = loader
            .load(&arena, File { code, path: () })
            .map_err(|errs| JsonMapError::query(source, format!("syntax error: {errs:?}")))?;

        let filter = Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(|errs| JsonMapError::query(source, format!("compile error: {errs:?}")))?;

        Ok(Self {
            source: source.to_string(),
            filter,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every output of the program, in order. The first runtime error aborts
    /// the run.
    pub fn run(&self, input: &DecodedValue) -> Result<Vec<DecodedValue>> {
        let input = Val::from(serde_json::Value::from(input));

        // Integer arithmetic inside the engine can overflow and panic
        // (`isize::MIN % -1`); report that as a failed query instead.
        let outputs = panic::catch_unwind(AssertUnwindSafe(|| {
            let inputs = RcIter::new(core::iter::empty());
            self.filter
                .run((Ctx::new([], &inputs), input))
                .map(|output| {
                    output
                        .map(|value| DecodedValue::from(serde_json::Value::from(value)))
                        .map_err(|err| format!("{err:?}"))
                })
                .collect::<std::result::Result<Vec<_>, String>>()
        }))
        .map_err(|_| JsonMapError::query(&self.source, "arithmetic overflow"))?;

        outputs.map_err(|message| JsonMapError::query(&self.source, message))
    }
}

pub fn run_jq(filter: &str, input: &DecodedValue) -> Result<DecodedValue> {
    let compiled = JqFilter::parse(filter)?;
    let outputs = compiled.run(input)?;
    debug!(filter, results = outputs.len(), "jq filter evaluated");
    Ok(shape_results(outputs))
}
