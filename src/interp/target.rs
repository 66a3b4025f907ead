//! Target architectures.
//!
//! A [`Target`] supplies everything the interpreter needs to know about the device a
//! program is compiled for: the layout of its pipeline ([`ArchSpec`]), the match kinds it
//! supports, and the semantics of its extern functions. The target is constructed once
//! and passed down by reference through the [`AnalysisContext`](crate::interp::AnalysisContext).

use std::fmt;

use crate::{
    expr::Expr,
    interp::{ExpressionResolver, MatchKindRegistry},
    ir::{Expression, Path},
    Result,
};

/// One programmable block of an architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchBlock {
    /// Canonical block name, e.g. `Ingress`.
    pub name: &'static str,
    /// The architecture-level variable each apply parameter is bound to; `None` for
    /// extern objects such as `packet_in`.
    pub params: Vec<Option<&'static str>>,
}

/// The pipeline layout of an architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchSpec {
    /// Name of the package, e.g. `V1Switch`.
    pub package: &'static str,
    /// Blocks in pipeline order.
    pub blocks: Vec<ArchBlock>,
}

impl ArchSpec {
    /// Returns the number of programmable blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the architecture has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the external name bound to parameter `param` of block `block`.
    #[must_use]
    pub fn param_name(&self, block: usize, param: usize) -> Option<&'static str> {
        self.blocks.get(block)?.params.get(param).copied().flatten()
    }
}

/// Target-specific behavior of the interpreter.
pub trait Target {
    /// The target's name, e.g. `bmv2`.
    fn name(&self) -> &str;

    /// The pipeline layout.
    fn arch_spec(&self) -> &ArchSpec;

    /// The match kinds the target supports.
    fn match_kinds(&self) -> &MatchKindRegistry;

    /// Executes a call of an extern the core interpreter does not know.
    ///
    /// # Arguments
    ///
    /// * `resolver` - The resolver of the calling statement, giving access to the state
    /// * `name` - The extern's name
    /// * `args` - The unresolved arguments
    ///
    /// # Returns
    ///
    /// The call's value for externs used as expressions, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unimplemented`] for externs the target does not model.
    fn call_extern(
        &self,
        resolver: &mut ExpressionResolver<'_, '_>,
        name: &str,
        args: &[Expression],
    ) -> Result<Option<Expr>>;
}

/// The BMv2 simple switch running the `v1model` architecture.
pub struct V1Model {
    arch: ArchSpec,
    match_kinds: MatchKindRegistry,
}

impl V1Model {
    /// The egress port that drops a packet.
    pub const DROP_PORT: u128 = 511;

    /// Creates the target with every core match kind registered.
    #[must_use]
    pub fn new() -> Self {
        let arch = ArchSpec {
            package: "V1Switch",
            blocks: vec![
                ArchBlock {
                    name: "Parser",
                    params: vec![None, Some("hdr"), Some("meta"), Some("standard_metadata")],
                },
                ArchBlock {
                    name: "VerifyChecksum",
                    params: vec![Some("hdr"), Some("meta")],
                },
                ArchBlock {
                    name: "Ingress",
                    params: vec![Some("hdr"), Some("meta"), Some("standard_metadata")],
                },
                ArchBlock {
                    name: "Egress",
                    params: vec![Some("hdr"), Some("meta"), Some("standard_metadata")],
                },
                ArchBlock {
                    name: "ComputeChecksum",
                    params: vec![Some("hdr"), Some("meta")],
                },
                ArchBlock {
                    name: "Deparser",
                    params: vec![None, Some("hdr")],
                },
            ],
        };
        Self {
            arch,
            match_kinds: MatchKindRegistry::core(),
        }
    }
}

impl Default for V1Model {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for V1Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V1Model")
            .field("package", &self.arch.package)
            .finish_non_exhaustive()
    }
}

fn path_arg<'e>(name: &str, args: &'e [Expression], index: usize) -> Result<&'e Path> {
    args.get(index)
        .and_then(Expression::as_path)
        .ok_or_else(|| malformed_error!("Argument {} of {} must be a variable", index, name))
}

impl Target for V1Model {
    fn name(&self) -> &str {
        "bmv2"
    }

    fn arch_spec(&self) -> &ArchSpec {
        &self.arch
    }

    fn match_kinds(&self) -> &MatchKindRegistry {
        &self.match_kinds
    }

    fn call_extern(
        &self,
        resolver: &mut ExpressionResolver<'_, '_>,
        name: &str,
        args: &[Expression],
    ) -> Result<Option<Expr>> {
        match name {
            "mark_to_drop" => {
                let metadata = path_arg(name, args, 0)?;
                resolver
                    .state_mut()
                    .set(&metadata.member("egress_spec"), Expr::bits(Self::DROP_PORT, 9))?;
            }
            // Outputs depend on packet contents or device state.
            "hash" | "random" | "read" => {
                resolver.havoc(path_arg(name, args, 0)?, name)?;
            }
            "execute_meter" => {
                resolver.havoc(path_arg(name, args, 1)?, name)?;
            }
            "update_checksum" | "update_checksum_with_payload" => {
                resolver.havoc(path_arg(name, args, 2)?, name)?;
            }
            "verify_checksum" | "verify_checksum_with_payload" | "count" | "write" | "digest"
            | "clone" | "clone_preserving_field_list" | "resubmit_preserving_field_list"
            | "recirculate_preserving_field_list" | "truncate" | "log_msg" | "assert"
            | "assume" => {}
            _ => {
                return Err(unimplemented_error!(
                    "Unknown or unimplemented extern method: {}",
                    name
                ))
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use crate::interp::{Target, V1Model};

    #[test]
    fn test_v1model_layout() {
        let target = V1Model::new();
        let arch = target.arch_spec();
        assert_eq!(arch.len(), 6);
        assert_eq!(arch.blocks[2].name, "Ingress");
        assert_eq!(arch.param_name(0, 0), None);
        assert_eq!(arch.param_name(0, 1), Some("hdr"));
        assert_eq!(arch.param_name(5, 1), Some("hdr"));
        assert_eq!(arch.param_name(5, 2), None);
        assert!(target.match_kinds().contains("range"));
    }
}
