//! The symbolic execution state.

use imbl::{OrdMap as ImOrdMap, Vector as ImVector};

use crate::{
    expr::{Expr, SymbolicVariable, ValueType},
    ir::{Direction, Param, Path, Type},
    state::{ProgramPoint, ReachabilityMap},
    Error, Result,
};

/// How the leaves of a newly declared variable are initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableInit {
    /// Every leaf starts at the zero value of its type.
    Zero,
    /// Every leaf is a data-plane input named by its path.
    Symbolic,
}

/// Bindings, namespaces, path condition and reachability of one execution path.
///
/// All collections are `imbl` persistent structures, so [`Clone`] is O(1) and a clone
/// shares no mutable storage with its origin. Forking a branch is a plain `clone()`.
///
/// Variables are stored flattened: every scalar leaf and every header validity bit has
/// its own binding. Composite paths only carry a declared type. Namespaces record the
/// blocks being stepped and do not qualify paths; see [`Program`](crate::ir::Program) for
/// the naming precondition this relies on.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    bindings: ImOrdMap<Path, Expr>,
    types: ImOrdMap<Path, Type>,
    namespaces: ImVector<String>,
    path_condition: Expr,
    reachability: ReachabilityMap,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionState {
    /// Creates an empty state whose path condition is `true`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: ImOrdMap::new(),
            types: ImOrdMap::new(),
            namespaces: ImVector::new(),
            path_condition: Expr::bool(true),
            reachability: ReachabilityMap::new(),
        }
    }

    /// Enters a namespace.
    pub fn push_namespace(&mut self, name: impl Into<String>) {
        self.namespaces.push_back(name.into());
    }

    /// Leaves the innermost namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no namespace is open.
    pub fn pop_namespace(&mut self) -> Result<String> {
        self.namespaces
            .pop_back()
            .ok_or_else(|| malformed_error!("Namespace stack is empty"))
    }

    /// Returns the innermost namespace.
    #[must_use]
    pub fn current_namespace(&self) -> Option<&str> {
        self.namespaces.back().map(String::as_str)
    }

    /// Returns the number of open namespaces.
    #[must_use]
    pub fn namespace_depth(&self) -> usize {
        self.namespaces.len()
    }

    /// Declares a variable and initialises its leaves.
    ///
    /// Header validity bits start out `false` regardless of `init`. Redeclaring a path
    /// resets it.
    ///
    /// # Arguments
    ///
    /// * `path` - The variable's path
    /// * `ty` - The declared type
    /// * `init` - How to initialise the scalar leaves
    pub fn declare_variable(&mut self, path: &Path, ty: &Type, init: VariableInit) {
        for (node, node_ty) in ty.nodes(path) {
            self.types.insert(node, node_ty);
        }
        let (leaves, valids) = ty.flatten(path);
        for (leaf, leaf_ty) in leaves {
            let value = match init {
                VariableInit::Zero => Expr::literal(leaf_ty.zero()),
                VariableInit::Symbolic => {
                    Expr::variable(SymbolicVariable::input(leaf.as_str(), leaf_ty))
                }
            };
            self.bindings.insert(leaf, value);
        }
        for valid in valids {
            self.bindings.insert(valid, Expr::bool(false));
        }
    }

    /// Reads the value bound to a scalar path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if nothing is bound at `path`.
    pub fn get(&self, path: &Path) -> Result<Expr> {
        self.bindings
            .get(path)
            .cloned()
            .ok_or_else(|| Error::UnresolvedName(path.to_string()))
    }

    /// Binds a value to a declared scalar path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if `path` was never declared.
    pub fn set(&mut self, path: &Path, value: Expr) -> Result<()> {
        if !self.bindings.contains_key(path) {
            return Err(Error::UnresolvedName(path.to_string()));
        }
        self.bindings.insert(path.clone(), value);
        Ok(())
    }

    /// Returns the declared type of a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if `path` was never declared.
    pub fn get_type(&self, path: &Path) -> Result<&Type> {
        self.types
            .get(path)
            .ok_or_else(|| Error::UnresolvedName(path.to_string()))
    }

    /// Checks whether `path` is declared.
    #[must_use]
    pub fn is_declared(&self, path: &Path) -> bool {
        self.types.contains_key(path)
    }

    /// Flattens a declared composite into its scalar leaves and validity bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if `path` was never declared.
    pub fn flat_fields(&self, path: &Path) -> Result<(Vec<(Path, ValueType)>, Vec<Path>)> {
        Ok(self.get_type(path)?.flatten(path))
    }

    /// Copies every leaf and validity bit of `source` onto `target`.
    ///
    /// Both paths must be declared with the same shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if either side is missing a leaf.
    pub fn set_struct_like(&mut self, target: &Path, source: &Path) -> Result<()> {
        let (leaves, valids) = self.flat_fields(target)?;
        for leaf in valids.into_iter().chain(leaves.into_iter().map(|(p, _)| p)) {
            let from = leaf
                .rebase(target, source)
                .ok_or_else(|| Error::UnresolvedName(leaf.to_string()))?;
            let value = self.get(&from)?;
            self.set(&leaf, value)?;
        }
        Ok(())
    }

    /// Copies an architecture-level variable into a block parameter.
    ///
    /// The parameter is declared under its own name and receives the value of
    /// `external`. Headers of `out` parameters are invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if `external` is not declared.
    pub fn copy_in(&mut self, param: &Param, external: &str) -> Result<()> {
        let internal = Path::new(param.name.as_str());
        let external = Path::new(external);
        if internal == external {
            self.get_type(&external)?;
        } else {
            self.declare_variable(&internal, &param.ty, VariableInit::Zero);
            self.set_struct_like(&internal, &external)?;
        }
        if param.direction == Direction::Out {
            let (_, valids) = self.flat_fields(&internal)?;
            for valid in valids {
                self.set(&valid, Expr::bool(false))?;
            }
        }
        Ok(())
    }

    /// Copies a block parameter back to the architecture-level variable.
    ///
    /// Only `out` and `inout` parameters are copied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedName`] if either side is not declared.
    pub fn copy_out(&mut self, param: &Param, external: &str) -> Result<()> {
        if !param.direction.copies_out() || param.name == external {
            return Ok(());
        }
        self.set_struct_like(&Path::new(external), &Path::new(param.name.as_str()))
    }

    /// Returns the condition under which this state is reached.
    #[must_use]
    pub fn path_condition(&self) -> &Expr {
        &self.path_condition
    }

    /// Conjoins `condition` to the path condition.
    pub fn push_execution_condition(&mut self, condition: &Expr) {
        self.path_condition = Expr::and(self.path_condition.clone(), condition.clone());
    }

    /// Records that `point` is reached under the path condition and `condition`.
    pub fn add_reachability_mapping(&mut self, point: ProgramPoint, condition: &Expr) {
        let reached = Expr::and(self.path_condition.clone(), condition.clone());
        self.reachability.add(point, reached);
    }

    /// Returns the reachability map collected so far.
    #[must_use]
    pub fn reachability(&self) -> &ReachabilityMap {
        &self.reachability
    }

    /// Consumes the state, returning its reachability map.
    #[must_use]
    pub fn into_reachability(self) -> ReachabilityMap {
        self.reachability
    }

    /// Joins another state into this one.
    ///
    /// Every binding that differs becomes `condition ? other : self`; bindings only
    /// present in `other` are taken over. Reachability maps are joined. The path
    /// condition of `self` is kept.
    ///
    /// # Arguments
    ///
    /// * `other` - The state to join, usually a clone forked from this one
    /// * `condition` - When `other` applies; `None` uses `other`'s path condition
    pub fn merge(&mut self, other: &Self, condition: Option<&Expr>) {
        let condition = condition.unwrap_or(&other.path_condition);
        for (path, theirs) in other.bindings.iter() {
            let merged = match self.bindings.get(path) {
                Some(ours) if ours == theirs => continue,
                Some(ours) => Expr::mux(condition.clone(), theirs.clone(), ours.clone()),
                None => theirs.clone(),
            };
            self.bindings.insert(path.clone(), merged);
        }
        for (path, ty) in other.types.iter() {
            if !self.types.contains_key(path) {
                self.types.insert(path.clone(), ty.clone());
            }
        }
        self.reachability.join(&other.reachability);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        expr::{Expr, SymbolicVariable, ValueType},
        ir::{Direction, NodeId, Param, Path, Type},
        state::{ExecutionState, ProgramPoint, VariableInit},
        Error,
    };

    fn ethernet() -> Type {
        Type::header("ethernet_t", vec![("dst", Type::bits(48)), ("etherType", Type::bits(16))])
    }

    fn cond(name: &str) -> Expr {
        Expr::variable(SymbolicVariable::table_active(name))
    }

    #[test]
    fn test_declare_zero_and_symbolic() {
        let mut state = ExecutionState::new();
        state.declare_variable(&Path::new("x"), &Type::bits(8), VariableInit::Zero);
        state.declare_variable(&Path::new("eth"), &ethernet(), VariableInit::Symbolic);

        assert_eq!(state.get(&Path::new("x")).unwrap(), Expr::bits(0, 8));
        assert_eq!(
            state.get(&Path::new("eth.dst")).unwrap(),
            Expr::variable(SymbolicVariable::input("eth.dst", ValueType::bits(48)))
        );
        assert_eq!(state.get(&Path::new("eth.$valid")).unwrap(), Expr::bool(false));
        assert!(state.get_type(&Path::new("eth")).unwrap().is_header());
    }

    #[test]
    fn test_unresolved_names() {
        let mut state = ExecutionState::new();
        assert!(matches!(state.get(&Path::new("y")), Err(Error::UnresolvedName(_))));
        assert!(matches!(
            state.set(&Path::new("y"), Expr::bits(1, 8)),
            Err(Error::UnresolvedName(_))
        ));
    }

    #[test]
    fn test_namespace_stack() {
        let mut state = ExecutionState::new();
        state.push_namespace("ingress");
        assert_eq!(state.current_namespace(), Some("ingress"));
        assert_eq!(state.pop_namespace().unwrap(), "ingress");
        assert!(matches!(state.pop_namespace(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut state = ExecutionState::new();
        state.declare_variable(&Path::new("x"), &Type::bits(8), VariableInit::Zero);
        let mut fork = state.clone();
        fork.set(&Path::new("x"), Expr::bits(7, 8)).unwrap();
        assert_eq!(state.get(&Path::new("x")).unwrap(), Expr::bits(0, 8));
        assert_eq!(fork.get(&Path::new("x")).unwrap(), Expr::bits(7, 8));
    }

    #[test]
    fn test_merge_builds_mux() {
        let x = Path::new("x");
        let mut state = ExecutionState::new();
        state.declare_variable(&x, &Type::bits(8), VariableInit::Zero);
        state.declare_variable(&Path::new("y"), &Type::bits(8), VariableInit::Zero);

        let mut fork = state.clone();
        fork.push_execution_condition(&cond("c"));
        fork.set(&x, Expr::bits(1, 8)).unwrap();
        state.set(&x, Expr::bits(2, 8)).unwrap();
        state.merge(&fork, None);

        assert_eq!(
            state.get(&x).unwrap(),
            Expr::mux(cond("c"), Expr::bits(1, 8), Expr::bits(2, 8))
        );
        assert_eq!(state.get(&Path::new("y")).unwrap(), Expr::bits(0, 8));
        assert_eq!(state.path_condition(), &Expr::bool(true));
    }

    #[test]
    fn test_reachability_under_path_condition() {
        let mut state = ExecutionState::new();
        state.push_execution_condition(&cond("a"));
        let point = ProgramPoint::Statement(NodeId::new(0));
        state.add_reachability_mapping(point.clone(), &cond("b"));
        assert_eq!(
            state.reachability().get(&point),
            Some(&Expr::and(cond("a"), cond("b")))
        );
    }

    #[test]
    fn test_copy_in_and_out() {
        let headers = Type::structure("headers_t", vec![("eth", ethernet())]);
        let mut state = ExecutionState::new();
        state.declare_variable(&Path::new("hdr"), &headers, VariableInit::Symbolic);
        state.set(&Path::new("hdr.eth.$valid"), Expr::bool(true)).unwrap();

        let param = Param::new("h", headers.clone(), Direction::InOut);
        state.copy_in(&param, "hdr").unwrap();
        assert_eq!(state.get(&Path::new("h.eth.$valid")).unwrap(), Expr::bool(true));

        state.set(&Path::new("h.eth.etherType"), Expr::bits(0x800, 16)).unwrap();
        state.copy_out(&param, "hdr").unwrap();
        assert_eq!(
            state.get(&Path::new("hdr.eth.etherType")).unwrap(),
            Expr::bits(0x800, 16)
        );

        let out = Param::new("o", headers, Direction::Out);
        state.copy_in(&out, "hdr").unwrap();
        assert_eq!(state.get(&Path::new("o.eth.$valid")).unwrap(), Expr::bool(false));
    }
}
