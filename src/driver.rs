// This module runs whole programs. Driver holds the read-only inputs shared by every unit (the
// userop library, the register source, the configuration and an optional taint client) and
// pushes each unit through the pipeline: translate, verify, dead-code elimination, verify again,
// type inference with the configured mismatch policy, scheduling into a lowering plan and the
// text backend. Each unit ends as one UnitOutcome. Recoverable errors make it a Fallback and
// graph invariant violations make it Aborted; either way the other units are unaffected. With
// more than one thread the units are split into contiguous chunks, each chunk is translated on a
// scoped thread with its own arena and session, and the outcomes are put back in source order.

//! Multi-unit translation driver.

use crate::config::{MismatchPolicy, TranslatorConfig};
use crate::core::collab::{analysis_client, RegisterSource, TaintClient};
use crate::core::{
    Backend, LoweringPlan, OpId, SessionStats, TextBackend, TranslateError, TranslateResult,
    TranslationSession, TypeDiagnostic, TypeInference, UseDefGraph, UseropLibrary, ValueId,
};
use crate::pcode::{Program, Unit};
use crate::translator::Translator;
use bumpalo::Bump;
use std::fmt;
use thiserror::Error;

/// Errors that stop a run before any unit is translated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Unknown analysis client '{0}'")]
    UnknownClient(String),
}

/// A unit that made it through every pass.
#[derive(Debug)]
pub struct UnitReport {
    pub name: String,
    pub graph: UseDefGraph,
    /// Live operations in schedule order.
    pub order: Vec<OpId>,
    pub inference: TypeInference,
    /// Operations removed by dead-code elimination.
    pub removed: usize,
    pub tainted: Option<Vec<ValueId>>,
    /// The sections selected by the print options.
    pub listing: String,
}

/// What happened to one unit.
#[derive(Debug)]
pub enum UnitOutcome {
    Translated(UnitReport),
    /// The unit runs on the un-optimized path instead.
    Fallback { unit: String, error: TranslateError },
    /// A graph invariant was violated while processing the unit.
    Aborted { unit: String, error: TranslateError },
}

impl UnitOutcome {
    pub fn name(&self) -> &str {
        match self {
            UnitOutcome::Translated(report) => &report.name,
            UnitOutcome::Fallback { unit, .. } | UnitOutcome::Aborted { unit, .. } => unit,
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, UnitOutcome::Translated(_))
    }

    pub fn report(&self) -> Option<&UnitReport> {
        match self {
            UnitOutcome::Translated(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TranslateError> {
        match self {
            UnitOutcome::Translated(_) => None,
            UnitOutcome::Fallback { error, .. } | UnitOutcome::Aborted { error, .. } => Some(error),
        }
    }
}

/// Outcomes of a run, in source order, with merged statistics.
#[derive(Debug)]
pub struct RunResult {
    pub outcomes: Vec<UnitOutcome>,
    pub stats: SessionStats,
}

impl RunResult {
    pub fn outcome(&self, name: &str) -> Option<&UnitOutcome> {
        self.outcomes.iter().find(|o| o.name() == name)
    }

    /// Whether every unit was translated.
    pub fn all_translated(&self) -> bool {
        self.outcomes.iter().all(UnitOutcome::is_translated)
    }

    /// Render every outcome, optionally followed by the statistics.
    pub fn render(&self, with_stats: bool) -> String {
        RenderedRun {
            result: self,
            with_stats,
        }
        .to_string()
    }
}

struct RenderedRun<'r> {
    result: &'r RunResult,
    with_stats: bool,
}

impl fmt::Display for RenderedRun<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.result.outcomes {
            match outcome {
                UnitOutcome::Translated(report) => {
                    writeln!(
                        f,
                        "unit {}: translated, {} ops, {} removed",
                        report.name,
                        report.order.len(),
                        report.removed
                    )?;
                    f.write_str(&report.listing)?;
                }
                UnitOutcome::Fallback { unit, error } => {
                    writeln!(f, "unit {}: fallback: {}", unit, error)?;
                }
                UnitOutcome::Aborted { unit, error } => {
                    writeln!(f, "unit {}: aborted: {}", unit, error)?;
                }
            }
        }
        if self.with_stats {
            write!(f, "{}", self.result.stats)?;
        }
        Ok(())
    }
}

/// The per-unit text selected by the print options.
struct UnitListing<'u> {
    name: &'u str,
    graph: Option<&'u UseDefGraph>,
    inference: Option<&'u TypeInference>,
    plan: Option<&'u str>,
    taint: Option<(&'u str, &'u [ValueId])>,
}

impl fmt::Display for UnitListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(graph) = self.graph {
            write!(f, "Graph for {}:\n{}", self.name, graph)?;
        }
        if let Some(inference) = self.inference {
            writeln!(f, "Types for {}:", self.name)?;
            for (value, ty) in inference.types.sorted() {
                writeln!(f, "  {}: {}", value, ty)?;
            }
            for diag in &inference.diagnostics {
                writeln!(f, "  warning: {}", diag)?;
            }
        }
        if let Some(plan) = self.plan {
            write!(f, "Plan for {}:\n{}", self.name, plan)?;
        }
        if let Some((client, values)) = self.taint {
            let names: Vec<String> = values.iter().map(ValueId::to_string).collect();
            writeln!(
                f,
                "Tainted by {} in {}: {}",
                client,
                self.name,
                names.join(", ")
            )?;
        }
        Ok(())
    }
}

pub struct Driver<'a> {
    userops: &'a UseropLibrary,
    registers: &'a (dyn RegisterSource + Sync),
    config: &'a TranslatorConfig,
    taint: Option<Box<dyn TaintClient>>,
}

impl<'a> Driver<'a> {
    pub fn new(
        userops: &'a UseropLibrary,
        registers: &'a (dyn RegisterSource + Sync),
        config: &'a TranslatorConfig,
    ) -> Result<Self, DriverError> {
        let taint = match &config.taint {
            Some(name) => Some(
                analysis_client(name).ok_or_else(|| DriverError::UnknownClient(name.clone()))?,
            ),
            None => None,
        };
        Ok(Self {
            userops,
            registers,
            config,
            taint,
        })
    }

    pub fn run(&self, program: &Program) -> RunResult {
        let units = &program.units;
        let threads = self.config.threads.clamp(1, units.len().max(1));

        if threads == 1 {
            let arena = Bump::new();
            let session = TranslationSession::new(&arena);
            let outcomes = units.iter().map(|u| self.run_unit(u, &session)).collect();
            return RunResult {
                outcomes,
                stats: session.stats(),
            };
        }

        let chunk = units.len().div_ceil(threads);
        log::debug!(
            "Translating {} units on {} threads, {} per thread",
            units.len(),
            threads,
            chunk
        );

        let mut outcomes = Vec::with_capacity(units.len());
        let mut stats = SessionStats::default();
        std::thread::scope(|scope| {
            let handles: Vec<_> = units
                .chunks(chunk)
                .map(|chunk| {
                    scope.spawn(move || {
                        let arena = Bump::new();
                        let session = TranslationSession::new(&arena);
                        let outcomes: Vec<UnitOutcome> =
                            chunk.iter().map(|u| self.run_unit(u, &session)).collect();
                        (outcomes, session.stats())
                    })
                })
                .collect();

            // Joining in spawn order keeps the outcomes in source order.
            for handle in handles {
                match handle.join() {
                    Ok((chunk_outcomes, chunk_stats)) => {
                        outcomes.extend(chunk_outcomes);
                        stats.merge(&chunk_stats);
                    }
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
        });

        RunResult { outcomes, stats }
    }

    /// Run one unit through every pass.
    pub fn run_unit(&self, unit: &Unit, session: &TranslationSession<'_>) -> UnitOutcome {
        session.begin_unit(&unit.name);
        let result = self.process(unit, session);
        session.end_unit();

        match result {
            Ok(report) => {
                session.record_translated();
                UnitOutcome::Translated(report)
            }
            Err(error) if error.is_recoverable() => {
                log::warn!("Unit {} falls back: {}", unit.name, error);
                session.record_fallback();
                UnitOutcome::Fallback {
                    unit: unit.name.clone(),
                    error,
                }
            }
            Err(error) => {
                log::error!("Unit {} aborted: {}", unit.name, error);
                session.record_aborted();
                UnitOutcome::Aborted {
                    unit: unit.name.clone(),
                    error,
                }
            }
        }
    }

    fn process(&self, unit: &Unit, session: &TranslationSession<'_>) -> TranslateResult<UnitReport> {
        let translator = Translator::new(self.userops, self.registers, session);
        let mut graph = translator.translate(unit)?.graph;
        if self.config.verify {
            graph.check_consistency()?;
        }

        let removed = if self.config.eliminate_dead_code {
            let removed = graph.eliminate_dead_code()?;
            session.record_dce(removed);
            if self.config.verify {
                graph.check_consistency()?;
            }
            removed
        } else {
            0
        };

        let inference = TypeInference::run(&graph)?;
        session.record_diagnostics(inference.diagnostics.len());
        for diag in &inference.diagnostics {
            log::debug!("{}: {}", unit.name, diag);
        }
        if self.config.mismatch_policy == MismatchPolicy::Reject {
            if let Some(TypeDiagnostic::Mismatch {
                op,
                position,
                expected,
                found,
            }) = inference.first_mismatch()
            {
                return Err(TranslateError::TypeRejected {
                    op: *op,
                    position: *position,
                    expected: *expected,
                    found: found.behavior(),
                });
            }
        }

        let tainted = self
            .taint
            .as_ref()
            .map(|client| crate::core::tainted_values(&graph, client.as_ref()));

        let plan = LoweringPlan::new(&graph, inference)?;
        let plan_text = if self.config.print.plan {
            Some(TextBackend::new().lower(&plan)?)
        } else {
            None
        };
        let LoweringPlan {
            order, inference, ..
        } = plan;

        let print = &self.config.print;
        let listing = UnitListing {
            name: &unit.name,
            graph: print.graph.then_some(&graph),
            inference: print.types.then_some(&inference),
            plan: plan_text.as_deref(),
            taint: match (&self.taint, &tainted) {
                (Some(client), Some(values)) => Some((client.name(), values.as_slice())),
                _ => None,
            },
        }
        .to_string();

        Ok(UnitReport {
            name: unit.name.clone(),
            graph,
            order,
            inference,
            removed,
            tainted,
            listing,
        })
    }
}

/// Translate every unit of `program`.
pub fn translate_units(
    program: &Program,
    userops: &UseropLibrary,
    registers: &(dyn RegisterSource + Sync),
    config: &TranslatorConfig,
) -> Result<RunResult, DriverError> {
    let driver = Driver::new(userops, registers, config)?;
    Ok(driver.run(program))
}
