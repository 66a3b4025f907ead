//! Symbolic execution of statements, controls and actions.

use crate::{
    expr::Expr,
    interp::{AnalysisContext, ExpressionResolver},
    ir::{
        ActionDecl, ControlDecl, Direction, Expression, Path, Statement, StatementKind,
        SwitchCase, SwitchLabel, TableMember, Type,
    },
    state::{ExecutionState, ProgramPoint, VariableInit},
    Result,
};

/// Steps statements over an [`ExecutionState`].
///
/// Straight-line statements update the state in place. Branches fork the state, step
/// each side on its own copy and merge the copies back, so after a statement the state
/// describes every path through it at once.
#[derive(Debug, Clone, Copy)]
pub struct Stepper<'a> {
    pub(crate) ctx: AnalysisContext<'a>,
}

impl<'a> Stepper<'a> {
    /// Creates a stepper for one analysis run.
    #[must_use]
    pub fn new(ctx: AnalysisContext<'a>) -> Self {
        Self { ctx }
    }

    fn resolver<'s>(&self, state: &'s mut ExecutionState) -> ExpressionResolver<'a, 's> {
        ExpressionResolver::new(self.ctx, state)
    }

    /// Steps a sequence of statements in order.
    ///
    /// # Errors
    ///
    /// Returns the first error any statement produces.
    pub fn step_all(&self, state: &mut ExecutionState, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.step(state, statement)?;
        }
        Ok(())
    }

    /// Steps one statement.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unimplemented`] for `exit` and `return`, and any error
    /// raised while resolving the statement's expressions.
    pub fn step(&self, state: &mut ExecutionState, statement: &Statement) -> Result<()> {
        match &statement.kind {
            StatementKind::Assign { target, value } => self.assign(state, target, value),
            StatementKind::Empty => Ok(()),
            StatementKind::Block(statements) => {
                state.push_namespace(format!("block{}", statement.id));
                self.step_all(state, statements)?;
                state.pop_namespace()?;
                Ok(())
            }
            StatementKind::If {
                condition,
                then,
                otherwise,
            } => self.step_if(state, statement, condition, then, otherwise.as_deref()),
            StatementKind::Switch { expression, cases } => {
                self.step_switch(state, expression, cases)
            }
            StatementKind::Call(call) => {
                self.resolver(state).call(call)?;
                Ok(())
            }
            StatementKind::Declare { name, ty, init } => {
                let path = Path::new(name.as_str());
                state.declare_variable(&path, ty, VariableInit::Zero);
                match init {
                    Some(value) => self.assign(state, &path, value),
                    None => Ok(()),
                }
            }
            StatementKind::Exit | StatementKind::Return => Err(unimplemented_error!(
                "Statement {:?} not implemented in the core stepper",
                statement.kind
            )),
        }
    }

    fn assign(&self, state: &mut ExecutionState, target: &Path, value: &Expression) -> Result<()> {
        if let Expression::List { .. } = value {
            return self.assign_struct(state, target, value);
        }
        if let Type::Value(_) = state.get_type(target)? {
            let value = self.resolver(state).compute_result(value)?;
            return state.set(target, value);
        }
        match value.as_path() {
            Some(source) => state.set_struct_like(target, source),
            None => Err(unimplemented_error!(
                "Unsupported assignment of {:?} to composite {}",
                value,
                target
            )),
        }
    }

    /// Assigns a struct, header or stack initializer leaf by leaf.
    ///
    /// Every component is resolved against the state before the assignment, so an
    /// initializer may read the target it overwrites. Validity bits are written before the
    /// data fields.
    fn assign_struct(
        &self,
        state: &mut ExecutionState,
        target: &Path,
        value: &Expression,
    ) -> Result<()> {
        let (leaves, valids) = state.flat_fields(target)?;
        let mut fields = Vec::new();
        let mut validity = Vec::new();
        flatten_initializer(value, &mut fields, &mut validity);

        if leaves.len() != fields.len() {
            return Err(malformed_error!(
                "The size of target fields ({}) and the size of source fields ({}) are different",
                leaves.len(),
                fields.len()
            ));
        }
        if valids.len() != validity.len() {
            return Err(malformed_error!(
                "The size of target valid fields ({}) and the size of source valid fields ({}) are different",
                valids.len(),
                validity.len()
            ));
        }

        let resolved = fields
            .into_iter()
            .map(|field| self.resolver(state).compute_result(field))
            .collect::<Result<Vec<_>>>()?;
        for (path, valid) in valids.iter().zip(validity) {
            state.set(path, Expr::bool(valid))?;
        }
        for ((path, _), value) in leaves.iter().zip(resolved) {
            state.set(path, value)?;
        }
        Ok(())
    }

    fn step_if(
        &self,
        state: &mut ExecutionState,
        statement: &Statement,
        condition: &Expression,
        then: &Statement,
        otherwise: Option<&Statement>,
    ) -> Result<()> {
        let condition = self.resolver(state).compute_result(condition)?;
        state.add_reachability_mapping(ProgramPoint::Statement(statement.id), &condition);

        let mut taken = state.clone();
        taken.push_execution_condition(&condition);
        self.step(&mut taken, then)?;

        if let Some(otherwise) = otherwise {
            self.step(state, otherwise)?;
        }
        state.merge(&taken, None);
        Ok(())
    }

    fn step_switch(
        &self,
        state: &mut ExecutionState,
        expression: &Expression,
        cases: &[SwitchCase],
    ) -> Result<()> {
        let table_mode = matches!(
            expression,
            Expression::TableMember {
                member: TableMember::ActionRun,
                ..
            }
        );
        let selected = self.resolver(state).compute_result(expression)?;

        let mut matched = Expr::bool(false);
        let mut not_matched = Vec::new();
        let mut group = Vec::new();
        let mut pending = Vec::new();
        let mut stashed = Vec::new();
        for case in cases {
            let label = match &case.label {
                SwitchLabel::Default => break,
                SwitchLabel::Action(name) if table_mode => Expr::string(name.as_str()),
                SwitchLabel::Action(name) => {
                    return Err(malformed_error!(
                        "Action label {} outside a switch on action_run",
                        name
                    ))
                }
                SwitchLabel::Value(value) => self.resolver(state).compute_result(value)?,
            };
            matched = Expr::or(matched, Expr::eq(selected.clone(), label));
            group.push(case.id);

            let Some(body) = &case.body else {
                continue;
            };
            pending.push(body.as_ref());
            if !body.is_block() {
                continue;
            }

            let condition = Expr::and(Expr::all(not_matched.iter().cloned()), matched.clone());
            not_matched.push(Expr::not(matched));
            matched = Expr::bool(false);
            for id in group.drain(..) {
                state.add_reachability_mapping(ProgramPoint::SwitchCase(id), &condition);
            }

            let mut case_state = state.clone();
            case_state.push_execution_condition(&condition);
            for statement in pending.drain(..) {
                self.step(&mut case_state, statement)?;
            }
            stashed.push(case_state);
        }

        if let Some(default) = cases.iter().find(|c| c.label == SwitchLabel::Default) {
            let condition = Expr::all(not_matched.iter().cloned());
            state.add_reachability_mapping(ProgramPoint::SwitchCase(default.id), &condition);
            if let Some(body) = &default.body {
                self.step(state, body)?;
            }
        }
        for case_state in &stashed {
            state.merge(case_state, None);
        }
        Ok(())
    }

    /// Applies a control block.
    ///
    /// Parameters are copied in from the architecture variables named in `externals`,
    /// locals are declared, the body runs, and `out`/`inout` parameters are copied back.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the body, or [`crate::Error::UnresolvedName`] if an
    /// architecture variable is missing.
    pub fn step_control(
        &self,
        state: &mut ExecutionState,
        control: &ControlDecl,
        externals: &[Option<&str>],
    ) -> Result<()> {
        state.push_namespace(control.name.as_str());
        for (index, param) in control.params.iter().enumerate() {
            if let Some(external) = externals.get(index).copied().flatten() {
                state.copy_in(param, external)?;
            }
        }
        for (name, ty) in &control.locals {
            state.declare_variable(&Path::new(name.as_str()), ty, VariableInit::Zero);
        }

        self.step_all(state, &control.body)?;

        for (index, param) in control.params.iter().enumerate() {
            if let Some(external) = externals.get(index).copied().flatten() {
                state.copy_out(param, external)?;
            }
        }
        state.pop_namespace()?;
        Ok(())
    }

    /// Runs an action invoked by a table.
    ///
    /// Every parameter of a table action is directionless and bound to the matching
    /// entry of `args`, which may be literals or control-plane variables.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the number of arguments does not match the
    /// parameters.
    pub fn run_action(
        &self,
        state: &mut ExecutionState,
        action: &ActionDecl,
        args: Vec<Expr>,
    ) -> Result<()> {
        if action.params.len() != args.len() {
            return Err(malformed_error!(
                "Action {} has {} parameters but is called with {} arguments",
                action.name,
                action.params.len(),
                args.len()
            ));
        }
        state.push_namespace(action.name.as_str());
        for (param, arg) in action.params.iter().zip(args) {
            if param.direction != Direction::None || param.ty.as_value().is_none() {
                return Err(unimplemented_error!(
                    "Parameter {} of table action {} must be a directionless scalar",
                    param.name,
                    action.name
                ));
            }
            let path = Path::new(param.name.as_str());
            state.declare_variable(&path, &param.ty, VariableInit::Zero);
            state.set(&path, arg)?;
        }
        self.step_all(state, &action.body)?;
        state.pop_namespace()?;
        Ok(())
    }
}

/// Flattens an initializer into its scalar components and header validities, in the
/// order [`Type::flatten`] lists the leaves of the target.
fn flatten_initializer<'e>(
    value: &'e Expression,
    fields: &mut Vec<&'e Expression>,
    validity: &mut Vec<bool>,
) {
    match value {
        Expression::List { components, valid } => {
            for component in components {
                flatten_initializer(component, fields, validity);
            }
            if let Some(valid) = valid {
                validity.push(*valid);
            }
        }
        other => fields.push(other),
    }
}
