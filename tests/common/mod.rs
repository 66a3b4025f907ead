//! Program builders shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use p4reach::{
    expr::{Expr, SymbolicVariable, ValueType},
    ir::{
        ActionCall, ActionDecl, ActionRef, ControlDecl, Direction, Expression, IdAllocator,
        KeyElement, MethodCall, NodeId, Param, ParserDecl, ParserState, Path, Program, Statement,
        StatementKind, TableDecl, Transition, Type,
    },
};

pub const INGRESS: &str = "MyIngress";
pub const TABLE: &str = "MyIngress.fwd";

pub fn assign(ids: &IdAllocator, target: &str, value: Expression) -> Statement {
    Statement::new(
        ids.fresh(),
        StatementKind::Assign {
            target: Path::new(target),
            value,
        },
    )
}

/// `forward(bit<9> port)` and `drop()`, both writing `standard_metadata.egress_spec`.
pub fn forwarding_actions(ids: &IdAllocator) -> Vec<ActionDecl> {
    let mut forward = ActionDecl::new(
        "forward",
        vec![Param::new("port", Type::bits(9), Direction::None)],
        vec![assign(ids, "standard_metadata.egress_spec", Expression::path("port"))],
    );
    forward.control_plane_name = "MyIngress.forward".to_string();
    let mut drop = ActionDecl::new(
        "drop",
        vec![],
        vec![assign(
            ids,
            "standard_metadata.egress_spec",
            Expression::bits(511, 9),
        )],
    );
    drop.control_plane_name = "MyIngress.drop".to_string();
    vec![forward, drop]
}

/// A table over the given keys that can run `forward` and defaults to `drop`.
pub fn forwarding_table(keys: Vec<KeyElement>) -> TableDecl {
    let mut table = TableDecl::new(
        "fwd",
        keys,
        vec![ActionRef::new("forward"), ActionRef::new("drop")],
        ActionCall::new("drop", vec![]),
    );
    table.control_plane_name = TABLE.to_string();
    table
}

pub fn exact_key(field: &str) -> KeyElement {
    KeyElement::new(
        Expression::path(&format!("hdr.{field}")),
        ValueType::bits(8),
        "exact",
        &format!("hdr.{field}"),
    )
}

fn headers() -> Type {
    Type::structure(
        "headers_t",
        vec![("dst", Type::bits(8)), ("src", Type::bits(8))],
    )
}

fn standard_metadata() -> Type {
    Type::structure(
        "standard_metadata_t",
        vec![("ingress_port", Type::bits(9)), ("egress_spec", Type::bits(9))],
    )
}

fn metadata() -> Type {
    Type::structure("meta_t", vec![("dropped", Type::bits(1))])
}

fn empty_control(name: &str) -> ControlDecl {
    ControlDecl {
        name: name.to_string(),
        params: vec![],
        locals: vec![],
        actions: vec![],
        tables: vec![],
        body: vec![],
    }
}

/// A complete v1model program:
///
/// ```text
/// apply {
///     fwd.apply();
///     if (standard_metadata.egress_spec == 511) { meta.dropped = 1; }
/// }
/// ```
///
/// Returns the program and the node id of the `if` statement.
pub fn forwarding_program(table: TableDecl) -> (Program, NodeId) {
    let ids = IdAllocator::new();
    let actions = forwarding_actions(&ids);
    let branch = ids.fresh();
    let body = vec![
        Statement::new(
            ids.fresh(),
            StatementKind::Call(MethodCall::ApplyTable(table.name.clone())),
        ),
        Statement::new(
            branch,
            StatementKind::If {
                condition: Expression::equals(
                    Expression::path("standard_metadata.egress_spec"),
                    Expression::bits(511, 9),
                ),
                then: Box::new(assign(&ids, "meta.dropped", Expression::bits(1, 1))),
                otherwise: None,
            },
        ),
    ];
    let ingress = ControlDecl {
        name: INGRESS.to_string(),
        params: vec![
            Param::new("hdr", headers(), Direction::InOut),
            Param::new("meta", metadata(), Direction::InOut),
            Param::new("standard_metadata", standard_metadata(), Direction::InOut),
        ],
        locals: vec![],
        actions,
        tables: vec![table],
        body,
    };
    let parser = ParserDecl {
        name: "MyParser".to_string(),
        params: vec![],
        locals: vec![],
        states: vec![ParserState {
            name: "start".to_string(),
            statements: vec![],
            transition: Transition::Accept,
        }],
        value_sets: vec![],
    };
    let program = Program {
        parsers: vec![parser],
        controls: vec![
            empty_control("MyVerifyChecksum"),
            ingress,
            empty_control("MyEgress"),
            empty_control("MyComputeChecksum"),
            empty_control("MyDeparser"),
        ],
        pipeline: [
            "MyParser",
            "MyVerifyChecksum",
            INGRESS,
            "MyEgress",
            "MyComputeChecksum",
            "MyDeparser",
        ]
        .iter()
        .map(ToString::to_string)
        .collect(),
        ..Program::default()
    };
    (program, branch)
}

/// Assigns the packet field `hdr.{field}`.
pub fn field(field: &str, value: u128) -> (SymbolicVariable, Expr) {
    (
        SymbolicVariable::input(&format!("hdr.{field}"), ValueType::bits(8)),
        Expr::bits(value, 8),
    )
}

pub fn assignments(
    pairs: impl IntoIterator<Item = (SymbolicVariable, Expr)>,
) -> BTreeMap<SymbolicVariable, Expr> {
    pairs.into_iter().collect()
}

