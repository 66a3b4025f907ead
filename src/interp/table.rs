//! Symbolic execution of match-action tables.
//!
//! A table application is turned into a [`TableResult`]: formulas for `hit`, `miss` and
//! `action_run` over the table's control-plane variables, plus the side effects of every
//! action the table may run, merged into the calling state under the condition that
//! selects it.
//!
//! Three shapes are distinguished:
//!
//! - keyless tables never hit; only the default action runs,
//! - immutable tables (`const entries`) replay their entries in priority order,
//! - all other tables may run any action of their action list, chosen by
//!   `{table}_action` and guarded by the symbolic key match.
//!
//! Unless the default action is `const`, the control plane may also replace it; every
//! eligible action is then executed as a miss alternative under
//! `{table}_default_action == action`.

use log::debug;

use crate::{
    events::EventKind,
    expr::{Expr, SymbolicVariable, ValueType},
    interp::{AnalysisContext, ExpressionResolver, MatchKindHandler, Stepper},
    ir::{ActionDecl, ConstEntry, Expression, TableDecl},
    state::{ExecutionState, ProgramPoint},
    Result,
};

/// The symbolic outcome of one table application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableResult {
    /// Control-plane name of the table.
    pub table_name: String,
    /// Holds when an entry matched.
    pub hit: Expr,
    /// Holds when no entry matched.
    pub miss: Expr,
    /// The name of the executed action, as a string-valued expression.
    pub action_run: Expr,
}

/// A resolved key element with its match kind handler.
struct ResolvedKey<'a> {
    field: String,
    expr: Expr,
    ty: ValueType,
    handler: &'a dyn MatchKindHandler,
}

/// Executes tables on behalf of an expression resolver.
#[derive(Debug, Clone, Copy)]
pub struct TableExecutor<'a> {
    ctx: AnalysisContext<'a>,
}

impl<'a> TableExecutor<'a> {
    /// Creates an executor for one analysis run.
    #[must_use]
    pub fn new(ctx: AnalysisContext<'a>) -> Self {
        Self { ctx }
    }

    /// Applies `table` to `state`.
    ///
    /// # Arguments
    ///
    /// * `state` - The calling state; receives the merged effects of all actions
    /// * `table` - The applied table
    ///
    /// # Returns
    ///
    /// The symbolic hit, miss and action_run of the application.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for keys without a name annotation, action calls
    /// with the wrong number of arguments or unknown actions, and
    /// [`crate::Error::Unimplemented`] for unknown match kinds.
    pub fn execute(&self, state: &mut ExecutionState, table: &TableDecl) -> Result<TableResult> {
        let result = if table.keys.is_empty() {
            self.execute_keyless(state, table)?
        } else {
            let keys = self.resolve_keys(state, table)?;
            let initial = state.clone();

            let (default_run, miss_runs) = self.process_default_action(state, &initial, table)?;
            let (hit, hit_run) = if table.is_immutable() {
                self.process_constant_entries(state, &initial, table, &keys)?
            } else {
                self.process_table_actions(state, &initial, table, &keys)?
            };

            let miss = Expr::not(hit.clone());
            self.record_action_points(state, table, &miss, &miss_runs, &hit_run);
            TableResult {
                table_name: table.control_plane_name.clone(),
                action_run: hit_run
                    .into_iter()
                    .rev()
                    .fold(default_run, |acc, (cond, name)| {
                        Expr::mux(cond, Expr::string(name), acc)
                    }),
                hit,
                miss,
            }
        };

        debug!(
            "table {} executed: hit = {}",
            result.table_name, result.hit
        );
        self.ctx
            .events
            .record(EventKind::TableExecuted)
            .entity(result.table_name.as_str())
            .message(format!("action_run = {}", result.action_run));
        Ok(result)
    }

    fn execute_keyless(&self, state: &mut ExecutionState, table: &TableDecl) -> Result<TableResult> {
        let default = &table.default_action;
        let action = self.ctx.program.action(&default.name)?;
        let args = self.literal_args(state, action, &default.args)?;
        Stepper::new(self.ctx).run_action(state, action, args)?;

        if self.ctx.config.record_table_actions {
            for action_ref in &table.actions {
                let reached = Expr::bool(action_ref.name == default.name);
                state.add_reachability_mapping(
                    ProgramPoint::table_action(&table.control_plane_name, &action_ref.name),
                    &reached,
                );
            }
        }
        Ok(TableResult {
            table_name: table.control_plane_name.clone(),
            hit: Expr::bool(false),
            miss: Expr::bool(true),
            action_run: Expr::string(default.name.as_str()),
        })
    }

    fn resolve_keys(
        &self,
        state: &mut ExecutionState,
        table: &TableDecl,
    ) -> Result<Vec<ResolvedKey<'a>>> {
        let mut keys = Vec::with_capacity(table.keys.len());
        for key in &table.keys {
            let field = key.name.clone().ok_or_else(|| {
                malformed_error!(
                    "Non-constant table key without an annotation in table {}",
                    table.name
                )
            })?;
            let handler = self.ctx.target.match_kinds().get(&key.match_kind)?;
            let expr = ExpressionResolver::new(self.ctx, state).compute_result(&key.expression)?;
            keys.push(ResolvedKey {
                field,
                expr,
                ty: key.ty,
                handler,
            });
        }
        Ok(keys)
    }

    /// Resolves the literal arguments of an action call written in the program.
    fn literal_args(
        &self,
        state: &mut ExecutionState,
        action: &ActionDecl,
        args: &[Expression],
    ) -> Result<Vec<Expr>> {
        if action.params.len() != args.len() {
            return Err(malformed_error!(
                "Method call does not have the same number of arguments as action {} has parameters",
                action.name
            ));
        }
        let mut resolver = ExpressionResolver::new(self.ctx, state);
        args.iter().map(|arg| resolver.compute_result(arg)).collect()
    }

    /// Runs the default action in place, then every control-plane alternative to it.
    ///
    /// Returns the action_run value on a miss and the `(condition, action)` pairs of the
    /// miss path.
    fn process_default_action(
        &self,
        state: &mut ExecutionState,
        initial: &ExecutionState,
        table: &TableDecl,
    ) -> Result<(Expr, Vec<(Expr, String)>)> {
        let table_name = &table.control_plane_name;
        let default = &table.default_action;
        let default_decl = self.ctx.program.action(&default.name)?;
        let args = self.literal_args(state, default_decl, &default.args)?;
        Stepper::new(self.ctx).run_action(state, default_decl, args)?;

        let mut miss_run = Expr::string(default.name.as_str());
        if table.default_is_const {
            return Ok((miss_run, vec![(Expr::bool(true), default.name.clone())]));
        }

        let chosen = Expr::variable(SymbolicVariable::default_action(table_name));
        let mut alternatives = Vec::new();
        let mut miss_runs = Vec::new();
        for action_ref in &table.actions {
            if action_ref.table_only || action_ref.name == default.name {
                continue;
            }
            let action = self.ctx.program.action(&action_ref.name)?;
            let condition = Expr::eq(
                chosen.clone(),
                Expr::string(action.control_plane_name.as_str()),
            );
            let mut alternative = initial.clone();
            alternative.push_execution_condition(&condition);
            let args = symbolic_args(table_name, action);
            Stepper::new(self.ctx).run_action(&mut alternative, action, args)?;
            state.merge(&alternative, Some(&condition));

            miss_run = Expr::mux(condition.clone(), Expr::string(action.name.as_str()), miss_run);
            miss_runs.push((condition.clone(), action.name.clone()));
            alternatives.push(condition);
        }
        miss_runs.push((Expr::not(Expr::any(alternatives)), default.name.clone()));
        Ok((miss_run, miss_runs))
    }

    /// Replays the constant entries of an immutable table.
    ///
    /// Returns the hit condition and the `(condition, action)` pairs in match order.
    fn process_constant_entries(
        &self,
        state: &mut ExecutionState,
        initial: &ExecutionState,
        table: &TableDecl,
        keys: &[ResolvedKey<'_>],
    ) -> Result<(Expr, Vec<(Expr, String)>)> {
        let entries = table
            .entries
            .as_ref()
            .map(|e| e.entries.as_slice())
            .unwrap_or_default();
        let ordered = order_entries(entries, keys);

        let mut matched = Expr::bool(false);
        let mut hit_runs = Vec::with_capacity(ordered.len());
        for entry in ordered {
            if entry.keys.len() != keys.len() {
                return Err(malformed_error!(
                    "Entry of table {} has {} keys, expected {}",
                    table.name,
                    entry.keys.len(),
                    keys.len()
                ));
            }
            let mut entry_match = Expr::bool(true);
            for (key, element) in keys.iter().zip(&entry.keys) {
                let matches = key.handler.literal_match(&key.expr, key.ty, element)?;
                entry_match = Expr::and(entry_match, matches);
            }
            let condition = Expr::and(Expr::not(matched.clone()), entry_match.clone());
            matched = Expr::or(matched, entry_match);

            let action = self.ctx.program.action(&entry.action.name)?;
            let mut entry_state = initial.clone();
            let args = self.literal_args(&mut entry_state, action, &entry.action.args)?;
            entry_state.push_execution_condition(&condition);
            Stepper::new(self.ctx).run_action(&mut entry_state, action, args)?;
            state.merge(&entry_state, Some(&condition));

            hit_runs.push((condition, action.name.clone()));
        }
        Ok((matched, hit_runs))
    }

    /// Enumerates every action the control plane may install in entries.
    ///
    /// Returns the hit condition and the `(condition, action)` pairs in declaration order.
    fn process_table_actions(
        &self,
        state: &mut ExecutionState,
        initial: &ExecutionState,
        table: &TableDecl,
        keys: &[ResolvedKey<'_>],
    ) -> Result<(Expr, Vec<(Expr, String)>)> {
        let table_name = &table.control_plane_name;
        let mut base_hit = Expr::variable(SymbolicVariable::table_active(table_name));
        for key in keys {
            let matches = key
                .handler
                .symbolic_match(table_name, &key.field, &key.expr, key.ty)?;
            base_hit = Expr::and(base_hit, matches);
        }

        let choice = Expr::variable(SymbolicVariable::action_choice(table_name));
        let mut choices = Vec::new();
        let mut hit_runs = Vec::new();
        for action_ref in &table.actions {
            if action_ref.default_only {
                continue;
            }
            let action = self.ctx.program.action(&action_ref.name)?;
            let chosen = Expr::eq(
                choice.clone(),
                Expr::string(action.control_plane_name.as_str()),
            );
            let condition = Expr::and(base_hit.clone(), chosen.clone());

            let mut action_state = initial.clone();
            action_state.push_execution_condition(&condition);
            let args = symbolic_args(table_name, action);
            Stepper::new(self.ctx).run_action(&mut action_state, action, args)?;
            state.merge(&action_state, Some(&condition));

            hit_runs.push((condition, action.name.clone()));
            choices.push(chosen);
        }
        let hit = Expr::and(base_hit, Expr::any(choices));
        Ok((hit, hit_runs))
    }

    /// Records one reachability point per action of the table.
    ///
    /// Miss-path conditions are conjoined with the table miss; actions that never run are
    /// recorded as unreachable.
    fn record_action_points(
        &self,
        state: &mut ExecutionState,
        table: &TableDecl,
        miss: &Expr,
        miss_runs: &[(Expr, String)],
        hit_runs: &[(Expr, String)],
    ) {
        if !self.ctx.config.record_table_actions {
            return;
        }
        for action_ref in &table.actions {
            let on_miss = miss_runs
                .iter()
                .filter(|(_, name)| *name == action_ref.name)
                .map(|(cond, _)| Expr::and(miss.clone(), cond.clone()));
            let on_hit = hit_runs
                .iter()
                .filter(|(_, name)| *name == action_ref.name)
                .map(|(cond, _)| cond.clone());
            let reached = Expr::any(on_miss.chain(on_hit));
            state.add_reachability_mapping(
                ProgramPoint::table_action(&table.control_plane_name, &action_ref.name),
                &reached,
            );
        }
    }
}

/// Creates the control-plane arguments `{table}_{action}_{param}` of a table action.
///
/// Boolean parameters are carried as `bit<1>` and compared against 1.
fn symbolic_args(table: &str, action: &ActionDecl) -> Vec<Expr> {
    action
        .params
        .iter()
        .map(|param| match param.ty.as_value() {
            Some(ValueType::Bool) => Expr::eq(
                Expr::variable(SymbolicVariable::action_argument(
                    table,
                    &action.control_plane_name,
                    &param.control_plane_name,
                    ValueType::bits(1),
                )),
                Expr::bits(1, 1),
            ),
            ty => Expr::variable(SymbolicVariable::action_argument(
                table,
                &action.control_plane_name,
                &param.control_plane_name,
                ty.unwrap_or(ValueType::Int),
            )),
        })
        .collect()
}

/// Orders constant entries for matching.
///
/// Longer total lpm prefixes match first; among equal prefixes higher priorities win, and
/// entries of equal priority keep their source order.
fn order_entries<'e>(entries: &'e [ConstEntry], keys: &[ResolvedKey<'_>]) -> Vec<&'e ConstEntry> {
    let prefix = |entry: &ConstEntry| -> u32 {
        keys.iter()
            .zip(&entry.keys)
            .filter_map(|(key, element)| key.handler.prefix_len(element, key.ty))
            .sum()
    };
    let mut ordered: Vec<_> = entries.iter().collect();
    ordered.sort_by(|a, b| {
        prefix(b)
            .cmp(&prefix(a))
            .then_with(|| b.priority.unwrap_or(0).cmp(&a.priority.unwrap_or(0)))
    });
    ordered
}
