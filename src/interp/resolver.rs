//! Resolution of program expressions into symbolic expressions.

use crate::{
    expr::{BinaryOp, Expr, Simplifier, SymbolicVariable, UnaryOp},
    interp::{AnalysisContext, Stepper, TableExecutor},
    ir::{Direction, Expression, MethodCall, Path, TableMember, Type},
    state::{ExecutionState, VariableInit},
    Result,
};

/// Turns [`Expression`]s into [`Expr`]s over the bindings of an execution state.
///
/// Resolution has side effects: applying a table, invoking an action or calling an extern
/// updates the state the resolver was created for.
pub struct ExpressionResolver<'a, 's> {
    ctx: AnalysisContext<'a>,
    state: &'s mut ExecutionState,
}

impl<'a, 's> ExpressionResolver<'a, 's> {
    /// Creates a resolver working on `state`.
    pub fn new(ctx: AnalysisContext<'a>, state: &'s mut ExecutionState) -> Self {
        Self { ctx, state }
    }

    /// Returns the analysis context.
    #[must_use]
    pub fn context(&self) -> AnalysisContext<'a> {
        self.ctx
    }

    /// Returns the state being updated.
    #[must_use]
    pub fn state(&self) -> &ExecutionState {
        self.state
    }

    /// Returns the state being updated, mutably.
    pub fn state_mut(&mut self) -> &mut ExecutionState {
        self.state
    }

    /// Resolves an expression.
    ///
    /// The result is simplified unless intermediate folding is disabled in the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression reads an undeclared name, applies an unknown
    /// table, or uses a construct the interpreter does not model.
    pub fn compute_result(&mut self, expr: &Expression) -> Result<Expr> {
        let result = self.resolve(expr)?;
        if self.ctx.config.fold_intermediate {
            Ok(Simplifier::new().simplify(&result))
        } else {
            Ok(result)
        }
    }

    fn resolve(&mut self, expr: &Expression) -> Result<Expr> {
        match expr {
            Expression::Literal(l) => Ok(Expr::literal(l.clone())),
            Expression::Path(path) => {
                if let Type::Value(_) = self.state.get_type(path)? {
                    self.state.get(path)
                } else {
                    Err(malformed_error!("Composite {} used as a value", path))
                }
            }
            Expression::Unary { op, operand } => {
                let operand = self.resolve(operand)?;
                Ok(match op {
                    UnaryOp::LNot => Expr::not(operand),
                    _ => Expr::unary(*op, operand),
                })
            }
            Expression::Binary { op, left, right } => {
                let left = self.resolve(left)?;
                let right = self.resolve(right)?;
                Ok(match op {
                    BinaryOp::LAnd => Expr::and(left, right),
                    BinaryOp::LOr => Expr::or(left, right),
                    _ => Expr::binary(*op, left, right),
                })
            }
            Expression::Mux {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.resolve(condition)?;
                let then = self.resolve(then)?;
                let otherwise = self.resolve(otherwise)?;
                Ok(Expr::mux(condition, then, otherwise))
            }
            Expression::Cast { ty, operand } => Ok(Expr::cast(*ty, self.resolve(operand)?)),
            Expression::List { .. } => Err(malformed_error!(
                "Struct initializer used outside an assignment"
            )),
            Expression::Call(call) => self
                .call(call)?
                .ok_or_else(|| malformed_error!("Call {:?} has no value", call)),
            Expression::TableMember { table, member } => {
                let table = self.ctx.program.table(table)?;
                let result = TableExecutor::new(self.ctx).execute(self.state, table)?;
                Ok(match member {
                    TableMember::Hit => result.hit,
                    TableMember::Miss => result.miss,
                    TableMember::ActionRun => result.action_run,
                })
            }
        }
    }

    /// Executes a method call.
    ///
    /// # Returns
    ///
    /// The call's value, or `None` for calls without one.
    ///
    /// # Errors
    ///
    /// Returns an error if the callee is unknown or its arguments do not fit.
    pub fn call(&mut self, call: &MethodCall) -> Result<Option<Expr>> {
        match call {
            MethodCall::ApplyTable(name) => {
                let table = self.ctx.program.table(name)?;
                TableExecutor::new(self.ctx).execute(self.state, table)?;
                Ok(None)
            }
            MethodCall::Action { name, args } => {
                self.invoke_action(name, args)?;
                Ok(None)
            }
            MethodCall::IsValid(header) => self.state.get(&header.valid()).map(Some),
            MethodCall::SetValid(header) => {
                self.state.set(&header.valid(), Expr::bool(true))?;
                Ok(None)
            }
            MethodCall::SetInvalid(header) => {
                self.state.set(&header.valid(), Expr::bool(false))?;
                Ok(None)
            }
            MethodCall::Extern { name, args } => match name.as_str() {
                "extract" => {
                    let header = args
                        .first()
                        .and_then(Expression::as_path)
                        .ok_or_else(|| malformed_error!("extract needs a header argument"))?;
                    self.extract(header)?;
                    Ok(None)
                }
                "emit" => Ok(None),
                _ => {
                    let target = self.ctx.target;
                    target.call_extern(self, name, args)
                }
            },
        }
    }

    /// Marks a header valid and binds its fields to the packet's input values.
    fn extract(&mut self, header: &Path) -> Result<()> {
        let (leaves, valids) = self.state.flat_fields(header)?;
        for (leaf, ty) in leaves {
            let input = Expr::variable(SymbolicVariable::input(leaf.as_str(), ty));
            self.state.set(&leaf, input)?;
        }
        for valid in valids {
            self.state.set(&valid, Expr::bool(true))?;
        }
        Ok(())
    }

    /// Binds every leaf of `path` to a fresh input value produced by `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvedName`] if `path` is not declared.
    pub fn havoc(&mut self, path: &Path, origin: &str) -> Result<()> {
        let (leaves, _) = self.state.flat_fields(path)?;
        for (leaf, ty) in leaves {
            let input = SymbolicVariable::input(&format!("{origin}.{leaf}"), ty);
            self.state.set(&leaf, Expr::variable(input))?;
        }
        Ok(())
    }

    /// Invokes an action directly, with directional arguments.
    fn invoke_action(&mut self, name: &str, args: &[Expression]) -> Result<()> {
        let action = self.ctx.program.action(name)?;
        if action.params.len() != args.len() {
            return Err(malformed_error!(
                "Action {} expects {} arguments, got {}",
                name,
                action.params.len(),
                args.len()
            ));
        }

        // Arguments are evaluated before any parameter is bound.
        let mut inputs = Vec::with_capacity(args.len());
        for (param, arg) in action.params.iter().zip(args) {
            let input = match (&param.ty, param.direction) {
                (_, Direction::Out) => None,
                (Type::Value(_), _) => Some(self.compute_result(arg)?),
                _ => None,
            };
            inputs.push(input);
        }

        self.state.push_namespace(action.name.as_str());
        for ((param, arg), input) in action.params.iter().zip(args).zip(inputs) {
            let local = Path::new(param.name.as_str());
            self.state.declare_variable(&local, &param.ty, VariableInit::Zero);
            match input {
                Some(value) => self.state.set(&local, value)?,
                None if param.direction != Direction::Out => {
                    let source = arg.as_path().ok_or_else(|| {
                        malformed_error!("Argument for {} of {} must be a variable", param.name, name)
                    })?;
                    self.state.set_struct_like(&local, source)?;
                }
                None => {}
            }
        }

        Stepper::new(self.ctx).step_all(self.state, &action.body)?;

        for (param, arg) in action.params.iter().zip(args) {
            if !param.direction.copies_out() {
                continue;
            }
            let target = arg.as_path().ok_or_else(|| {
                malformed_error!("Argument for {} of {} must be a variable", param.name, name)
            })?;
            let local = Path::new(param.name.as_str());
            if let Type::Value(_) = param.ty {
                let value = self.state.get(&local)?;
                self.state.set(target, value)?;
            } else {
                self.state.set_struct_like(target, &local)?;
            }
        }
        self.state.pop_namespace()?;
        Ok(())
    }
}
