//! Whole-program runs: analysis, default configuration, updates and folding.

mod common;

use common::{exact_key, field, forwarding_program, forwarding_table, TABLE};
use p4reach::{
    config::AnalysisConfig,
    control_plane::{
        apply_updates, ControlPlaneStateInitializer, Entity, FieldMatch, TableEntryRecord,
        UpdateKind,
    },
    events::{EventKind, EventLog},
    expr::{Expr, Literal},
    interp::{run_analysis, AnalysisContext, TableExecutor, V1Model},
    ir::{ActionCall, ConstEntry, Expression, KeySetElement, Path, TableEntries, Type},
    state::{ExecutionState, ProgramPoint, VariableInit},
    substitution::SubstitutionMap,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn constant_entry_table() -> p4reach::ir::TableDecl {
    let mut table = forwarding_table(vec![exact_key("dst"), exact_key("src")]);
    table.entries = Some(TableEntries {
        is_const: true,
        entries: vec![ConstEntry {
            keys: vec![
                KeySetElement::Value(Literal::bits(5, 8)),
                KeySetElement::Value(Literal::bits(7, 8)),
            ],
            action: ActionCall::new("forward", vec![Expression::bits(1, 9)]),
            priority: Some(10),
        }],
    });
    table
}

#[test]
fn test_two_field_constant_entry_selects_action() {
    init_logging();
    let (program, _) = forwarding_program(constant_entry_table());
    let target = V1Model::new();
    let config = AnalysisConfig::default();
    let events = EventLog::new();

    let constraints =
        ControlPlaneStateInitializer::new(&program, &target, &events).default_constraints();
    assert_eq!(events.count_kind(EventKind::RecordRejected), 0);

    // Apply the table on its own to inspect `action_run`.
    let mut state = ExecutionState::new();
    for leaf in ["hdr.dst", "hdr.src"] {
        state.declare_variable(&Path::new(leaf), &Type::bits(8), VariableInit::Symbolic);
    }
    state.declare_variable(
        &Path::new("standard_metadata.egress_spec"),
        &Type::bits(9),
        VariableInit::Zero,
    );
    let ctx = AnalysisContext::new(&program, &target, &config, &events);
    let table = program.table("fwd").unwrap();
    let result = TableExecutor::new(ctx).execute(&mut state, table).unwrap();
    assert_eq!(result.table_name, TABLE);

    let mut matching = constraints.assignments();
    matching.extend([field("dst", 5), field("src", 7)]);
    assert_eq!(result.action_run.fold(&matching), Expr::string("forward"));
    assert_eq!(result.hit.fold(&matching), Expr::bool(true));

    let mut other = constraints.assignments();
    other.extend([field("dst", 5), field("src", 8)]);
    assert_eq!(result.action_run.fold(&other), Expr::string("drop"));
    assert_eq!(result.miss.fold(&other), Expr::bool(true));

    // The entry's action wrote its argument.
    let egress = state.get(&Path::new("standard_metadata.egress_spec")).unwrap();
    assert_eq!(egress.fold(&matching), Expr::bits(1, 9));
    assert_eq!(egress.fold(&other), Expr::bits(511, 9));
}

#[test]
fn test_default_configuration_decides_every_point() {
    init_logging();
    let (program, branch) = forwarding_program(forwarding_table(vec![exact_key("dst")]));
    let target = V1Model::new();
    let events = EventLog::new();

    let analysis = run_analysis(&program, &target, &AnalysisConfig::default(), &events).unwrap();
    assert_eq!(events.count_kind(EventKind::BlockStepped), 6);

    let constraints =
        ControlPlaneStateInitializer::new(&program, &target, &events).default_constraints();
    let mut substitution = SubstitutionMap::from_reachability(&analysis.reachability);
    assert!(substitution.recompute(&constraints).unwrap());

    // No entry installed: the table always misses and drops.
    let forward = ProgramPoint::table_action(TABLE, "forward");
    let drop = ProgramPoint::table_action(TABLE, "drop");
    let dropped = ProgramPoint::Statement(branch);
    assert_eq!(substitution.is_expression_constant(&forward), Some(Literal::Bool(false)));
    assert_eq!(substitution.is_expression_constant(&drop), Some(Literal::Bool(true)));
    assert_eq!(substitution.is_expression_constant(&dropped), Some(Literal::Bool(true)));
    assert_eq!(substitution.dead_points().collect::<Vec<_>>(), vec![&forward]);
}

#[test]
fn test_update_makes_points_packet_dependent() {
    init_logging();
    let (program, branch) = forwarding_program(forwarding_table(vec![exact_key("dst")]));
    let target = V1Model::new();
    let events = EventLog::new();

    let analysis = run_analysis(&program, &target, &AnalysisConfig::default(), &events).unwrap();
    let mut constraints =
        ControlPlaneStateInitializer::new(&program, &target, &events).default_constraints();
    let mut substitution = SubstitutionMap::from_reachability(&analysis.reachability);
    substitution.recompute(&constraints).unwrap();

    let record = TableEntryRecord::new(TABLE, "MyIngress.forward")
        .with_match("hdr.dst", FieldMatch::Exact(Literal::bits(5, 8)))
        .with_param("port", Literal::bits(2, 9));
    let touched = apply_updates(
        &program,
        &target,
        &mut constraints,
        &[Entity::TableEntry(UpdateKind::Insert, record)],
        &events,
    );
    assert!(events.has(EventKind::RecordApplied));
    assert!(substitution.recompute_scoped(&touched, &constraints).unwrap());

    // Whether the entry hits now depends on the packet.
    let forward = ProgramPoint::table_action(TABLE, "forward");
    assert_eq!(substitution.is_expression_constant(&forward), None);
    assert_eq!(
        substitution.is_expression_constant(&ProgramPoint::Statement(branch)),
        None
    );

    // Under a concrete packet the original formulas decide.
    let condition = substitution.get(&forward).unwrap().original().clone();
    let mut packet = constraints.assignments();
    packet.extend([field("dst", 5)]);
    assert_eq!(condition.fold(&packet), Expr::bool(true));
    packet.extend([field("dst", 6)]);
    assert_eq!(condition.fold(&packet), Expr::bool(false));
}
