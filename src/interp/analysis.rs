//! The whole-program driver.
//!
//! [`run_analysis`] binds the program's pipeline to the target architecture, declares the
//! architecture-level variables every block shares, and steps the blocks in order. The
//! result is the reachability map the substitution layer consumes.

use log::{debug, info};

use crate::{
    config::AnalysisConfig,
    events::{EventKind, EventLog},
    interp::{AnalysisContext, Stepper, Target},
    ir::{BlockRef, Path, Program},
    state::{ExecutionState, ReachabilityMap, VariableInit},
    Result,
};

/// The outcome of a symbolic analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The state after the last block.
    pub state: ExecutionState,
    /// Reachability conditions of every recorded program point.
    pub reachability: ReachabilityMap,
}

/// Symbolically executes the whole pipeline of `program`.
///
/// Architecture variables (`hdr`, `meta`, `standard_metadata` on v1model) are declared
/// with symbolic inputs before the first block runs; all headers start invalid.
///
/// # Arguments
///
/// * `program` - The typed program
/// * `target` - The architecture the program is compiled for
/// * `config` - Analysis settings
/// * `events` - Sink for diagnostics
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the pipeline does not fit the architecture or
/// names an unknown block, and any error raised while stepping a block. No partial result
/// is returned.
pub fn run_analysis(
    program: &Program,
    target: &dyn Target,
    config: &AnalysisConfig,
    events: &EventLog,
) -> Result<AnalysisResult> {
    let arch = target.arch_spec();
    if program.pipeline.len() != arch.len() {
        return Err(malformed_error!(
            "Package {} expects {} blocks, the program instantiates {}",
            arch.package,
            arch.len(),
            program.pipeline.len()
        ));
    }
    let blocks = program
        .pipeline
        .iter()
        .map(|name| {
            program
                .block(name)
                .ok_or_else(|| malformed_error!("Pipeline block {} is not declared", name))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut state = ExecutionState::new();
    for (index, block) in blocks.iter().enumerate() {
        for (param_index, param) in block.params().iter().enumerate() {
            let Some(external) = arch.param_name(index, param_index) else {
                continue;
            };
            let path = Path::new(external);
            if !state.is_declared(&path) {
                state.declare_variable(&path, &param.ty, VariableInit::Symbolic);
            }
        }
    }

    let ctx = AnalysisContext::new(program, target, config, events);
    let stepper = Stepper::new(ctx);
    for (index, block) in blocks.iter().enumerate() {
        let arch_block = &arch.blocks[index];
        let externals: Vec<Option<&str>> = (0..block.params().len())
            .map(|param| arch.param_name(index, param))
            .collect();
        match block {
            BlockRef::Control(control) => stepper.step_control(&mut state, control, &externals)?,
            BlockRef::Parser(parser) => stepper.step_parser(&mut state, parser, &externals)?,
        }
        debug!("stepped {} as {}", block.name(), arch_block.name);
        events
            .record(EventKind::BlockStepped)
            .entity(block.name())
            .message(format!("{} block {}", arch_block.name, block.name()));
    }

    let reachability = state.reachability().clone();
    info!(
        "analysis on {} finished with {} program points",
        target.name(),
        reachability.len()
    );
    Ok(AnalysisResult {
        state,
        reachability,
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        config::AnalysisConfig,
        events::{EventKind, EventLog},
        interp::{run_analysis, V1Model},
        ir::Program,
        Error,
    };

    #[test]
    fn test_pipeline_must_fit_architecture() {
        let program = Program {
            pipeline: vec!["ingress".to_string()],
            ..Program::default()
        };
        let events = EventLog::new();
        let result = run_analysis(&program, &V1Model::new(), &AnalysisConfig::default(), &events);
        assert!(matches!(result, Err(Error::Malformed { .. })));
        assert!(!events.has(EventKind::BlockStepped));
    }

    #[test]
    fn test_unknown_block_is_malformed() {
        let program = Program {
            pipeline: ["p", "vc", "ig", "eg", "cc", "dp"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            ..Program::default()
        };
        let events = EventLog::new();
        let result = run_analysis(&program, &V1Model::new(), &AnalysisConfig::default(), &events);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
