//! Symbolic execution of parsers.
//!
//! Parser states are explored depth-first from `start`. Every select transition forks
//! one path per case that can still match; the path on which no case matches is the
//! implicit reject path and continues in place. Loops are cut at
//! [`AnalysisConfig::max_parser_depth`](crate::config::AnalysisConfig::max_parser_depth).

use log::warn;

use crate::{
    events::EventKind,
    expr::{Expr, SymbolicVariable},
    interp::{ExpressionResolver, Stepper},
    ir::{KeySetElement, ParserDecl, Path, SelectCase, SelectKey, Transition},
    state::{ExecutionState, ProgramPoint, VariableInit},
    Result,
};

const ACCEPT: &str = "accept";
const REJECT: &str = "reject";

impl Stepper<'_> {
    /// Applies a parser block.
    ///
    /// Parameters are copied in from the architecture variables named in `externals`,
    /// every path through the state machine is explored and merged, and `out`/`inout`
    /// parameters are copied back.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for transitions to undeclared states or select
    /// cases whose key count differs from the select, and any error raised by the state
    /// statements.
    pub fn step_parser(
        &self,
        state: &mut ExecutionState,
        parser: &ParserDecl,
        externals: &[Option<&str>],
    ) -> Result<()> {
        state.push_namespace(parser.name.as_str());
        for (index, param) in parser.params.iter().enumerate() {
            if let Some(external) = externals.get(index).copied().flatten() {
                state.copy_in(param, external)?;
            }
        }
        for (name, ty) in &parser.locals {
            state.declare_variable(&Path::new(name.as_str()), ty, VariableInit::Zero);
        }

        self.step_parser_state(state, parser, ParserDecl::START, 0)?;

        for (index, param) in parser.params.iter().enumerate() {
            if let Some(external) = externals.get(index).copied().flatten() {
                state.copy_out(param, external)?;
            }
        }
        state.pop_namespace()?;
        Ok(())
    }

    fn step_parser_state(
        &self,
        state: &mut ExecutionState,
        parser: &ParserDecl,
        name: &str,
        depth: usize,
    ) -> Result<()> {
        if name == ACCEPT || name == REJECT {
            return Ok(());
        }
        if depth >= self.ctx.config.max_parser_depth {
            warn!(
                "parser {} exceeded depth {} in state {}",
                parser.name, self.ctx.config.max_parser_depth, name
            );
            self.ctx
                .events
                .record(EventKind::ParserDepthExceeded)
                .entity(parser.name.as_str())
                .message(format!("stopped in state {name} at depth {depth}"));
            return Ok(());
        }
        let parser_state = parser
            .state(name)
            .ok_or_else(|| malformed_error!("Parser {} has no state {}", parser.name, name))?;

        self.step_all(state, &parser_state.statements)?;

        match &parser_state.transition {
            Transition::Accept | Transition::Reject => Ok(()),
            Transition::Goto(next) => self.step_parser_state(state, parser, next, depth + 1),
            Transition::Select { keys, cases } => {
                let mut resolver = ExpressionResolver::new(self.ctx, state);
                let values = keys
                    .iter()
                    .map(|key| resolver.compute_result(key))
                    .collect::<Result<Vec<_>>>()?;
                self.step_select(state, parser, &values, cases, depth)
            }
        }
    }

    fn step_select(
        &self,
        state: &mut ExecutionState,
        parser: &ParserDecl,
        values: &[Expr],
        cases: &[SelectCase],
        depth: usize,
    ) -> Result<()> {
        let mut matched = Expr::bool(false);
        let mut forks = Vec::with_capacity(cases.len());
        for case in cases {
            let case_match = self.select_case_match(parser, values, case)?;
            let condition = Expr::and(Expr::not(matched.clone()), case_match.clone());
            matched = Expr::or(matched, case_match);
            state.add_reachability_mapping(ProgramPoint::SelectCase(case.id), &condition);

            if condition.as_bool() == Some(false) {
                continue;
            }
            let mut fork = state.clone();
            fork.push_execution_condition(&condition);
            self.step_parser_state(&mut fork, parser, &case.next, depth + 1)?;
            forks.push((condition, fork));
        }
        for (condition, fork) in &forks {
            state.merge(fork, Some(condition));
        }
        Ok(())
    }

    /// Builds the condition under which `case` matches the selected `values`.
    fn select_case_match(
        &self,
        parser: &ParserDecl,
        values: &[Expr],
        case: &SelectCase,
    ) -> Result<Expr> {
        if let [SelectKey::Element(KeySetElement::Default | KeySetElement::DontCare)] =
            case.keys.as_slice()
        {
            return Ok(Expr::bool(true));
        }
        if case.keys.len() != values.len() {
            return Err(malformed_error!(
                "Select case {} of parser {} has {} keys, expected {}",
                case.id,
                parser.name,
                case.keys.len(),
                values.len()
            ));
        }
        let mut case_match = Expr::bool(true);
        for (value, key) in values.iter().zip(&case.keys) {
            let key_match = match key {
                SelectKey::Element(element) => element_match(value, element),
                SelectKey::ValueSet(name) => {
                    let value_set = parser.value_set(name).ok_or_else(|| {
                        malformed_error!("Parser {} has no value set {}", parser.name, name)
                    })?;
                    let entity = value_set.control_plane_name.as_str();
                    Expr::and(
                        Expr::variable(SymbolicVariable::value_set_configured(entity)),
                        Expr::eq(
                            value.clone(),
                            Expr::variable(SymbolicVariable::value_set_member(
                                entity,
                                value_set.ty,
                            )),
                        ),
                    )
                }
            };
            case_match = Expr::and(case_match, key_match);
        }
        Ok(case_match)
    }
}

fn element_match(value: &Expr, element: &KeySetElement) -> Expr {
    use crate::expr::BinaryOp;

    match element {
        KeySetElement::Value(v) => Expr::eq(value.clone(), v.clone().into()),
        KeySetElement::Default | KeySetElement::DontCare => Expr::bool(true),
        KeySetElement::Masked { value: v, mask } => Expr::eq(
            Expr::binary(BinaryOp::BAnd, value.clone(), mask.clone().into()),
            Expr::binary(BinaryOp::BAnd, v.clone().into(), mask.clone().into()),
        ),
        KeySetElement::Range { min, max } => Expr::and(
            Expr::binary(BinaryOp::Le, min.clone().into(), value.clone()),
            Expr::binary(BinaryOp::Le, value.clone(), max.clone().into()),
        ),
    }
}
