//! Properties of the table encodings and of incremental refolding, checked over whole
//! packet-field domains.

mod common;

use common::{exact_key, field, forwarding_program, forwarding_table, TABLE};
use p4reach::{
    config::AnalysisConfig,
    control_plane::{
        apply_updates, ControlPlaneConstraints, ControlPlaneStateInitializer, Entity,
        FieldMatch, TableEntryRecord, UpdateKind,
    },
    events::{EventKind, EventLog},
    expr::{Expr, Literal, SymbolicVariable, ValueType},
    interp::{run_analysis, V1Model},
    ir::{
        ActionCall, ConstEntry, Expression, KeyElement, KeySetElement, NodeId, Path, Program,
        TableDecl, TableEntries,
    },
    state::ProgramPoint,
    substitution::SubstitutionMap,
};

struct Fixture {
    program: Program,
    branch: NodeId,
    target: V1Model,
    events: EventLog,
    constraints: ControlPlaneConstraints,
    substitution: SubstitutionMap,
    analysis: p4reach::interp::AnalysisResult,
}

impl Fixture {
    fn new(keys: Vec<KeyElement>) -> Self {
        Self::with_table(forwarding_table(keys))
    }

    fn with_table(table: TableDecl) -> Self {
        let (program, branch) = forwarding_program(table);
        let target = V1Model::new();
        let events = EventLog::new();
        let analysis =
            run_analysis(&program, &target, &AnalysisConfig::default(), &events).unwrap();
        let constraints =
            ControlPlaneStateInitializer::new(&program, &target, &events).default_constraints();
        let mut substitution = SubstitutionMap::from_reachability(&analysis.reachability);
        substitution.recompute(&constraints).unwrap();
        Self {
            program,
            branch,
            target,
            events,
            constraints,
            substitution,
            analysis,
        }
    }

    /// Applies `records` and refolds the touched points.
    fn apply(&mut self, records: &[Entity]) -> bool {
        let touched = apply_updates(
            &self.program,
            &self.target,
            &mut self.constraints,
            records,
            &self.events,
        );
        self.substitution
            .recompute_scoped(&touched, &self.constraints)
            .unwrap()
    }

    fn condition(&self, point: &ProgramPoint) -> Expr {
        self.substitution.get(point).unwrap().original().clone()
    }

    /// Folds the condition of `point` for a packet with `hdr.dst = dst`.
    fn reached(&self, point: &ProgramPoint, dst: u128) -> Option<bool> {
        let mut packet = self.constraints.assignments();
        packet.extend([field("dst", dst)]);
        self.condition(point).fold(&packet).as_bool()
    }
}

fn key(match_kind: &str) -> KeyElement {
    KeyElement::new(Expression::path("hdr.dst"), ValueType::bits(8), match_kind, "hdr.dst")
}

fn forward_to(port: u128) -> TableEntryRecord {
    TableEntryRecord::new(TABLE, "MyIngress.forward").with_param("port", Literal::bits(port, 9))
}

fn insert(record: TableEntryRecord) -> Entity {
    Entity::TableEntry(UpdateKind::Insert, record)
}

fn forward_point() -> ProgramPoint {
    ProgramPoint::table_action(TABLE, "forward")
}

fn drop_point() -> ProgramPoint {
    ProgramPoint::table_action(TABLE, "drop")
}

#[test]
fn test_exact_entry_matches_only_its_value() {
    for installed in [0u128, 1, 127, 255] {
        let mut fixture = Fixture::new(vec![exact_key("dst")]);
        fixture.apply(&[insert(
            forward_to(2).with_match("hdr.dst", FieldMatch::Exact(Literal::bits(installed, 8))),
        )]);
        for dst in 0..256 {
            assert_eq!(
                fixture.reached(&forward_point(), dst),
                Some(dst == installed),
                "entry {installed}, packet {dst}"
            );
        }
    }
}

#[test]
fn test_lpm_entry_matches_its_prefix() {
    let value = 0b1010_0110u128;
    for prefix_len in 0..=8u32 {
        let mut fixture = Fixture::new(vec![key("lpm")]);
        fixture.apply(&[insert(forward_to(2).with_match(
            "hdr.dst",
            FieldMatch::Lpm {
                value: Literal::bits(value, 8),
                prefix_len,
            },
        ))]);
        let mask = (0xffu128 << (8 - prefix_len)) & 0xff;
        for dst in 0..256 {
            assert_eq!(
                fixture.reached(&forward_point(), dst),
                Some(dst & mask == value & mask),
                "prefix /{prefix_len}, packet {dst}"
            );
        }
    }
}

#[test]
fn test_actions_of_one_application_exclude_each_other() {
    let mut fixture = Fixture::new(vec![key("ternary")]);
    fixture.apply(&[insert(
        forward_to(3)
            .with_match(
                "hdr.dst",
                FieldMatch::Ternary {
                    value: Literal::bits(0x10, 8),
                    mask: Literal::bits(0xf0, 8),
                },
            )
            .with_priority(1),
    )]);

    let both = Expr::and(
        fixture.condition(&forward_point()),
        fixture.condition(&drop_point()),
    );
    let either = Expr::or(
        fixture.condition(&forward_point()),
        fixture.condition(&drop_point()),
    );
    for dst in 0..256 {
        let mut packet = fixture.constraints.assignments();
        packet.extend([field("dst", dst)]);
        assert_eq!(both.fold(&packet), Expr::bool(false), "packet {dst}");
        assert_eq!(either.fold(&packet), Expr::bool(true), "packet {dst}");
    }
}

#[test]
fn test_constant_entries_match_at_most_once() {
    let overlapping = |value: u128, mask: u128, action: &str, args, priority| ConstEntry {
        keys: vec![KeySetElement::Masked {
            value: Literal::bits(value, 8),
            mask: Literal::bits(mask, 8),
        }],
        action: ActionCall::new(action, args),
        priority: Some(priority),
    };
    let mut table = forwarding_table(vec![key("ternary")]);
    table.entries = Some(TableEntries {
        is_const: true,
        entries: vec![
            overlapping(0x00, 0x80, "forward", vec![Expression::bits(1, 9)], 1),
            overlapping(0x01, 0x01, "drop", vec![], 5),
        ],
    });
    let fixture = Fixture::with_table(table);

    let both = Expr::and(
        fixture.condition(&forward_point()),
        fixture.condition(&drop_point()),
    );
    for dst in 0..256 {
        let mut packet = fixture.constraints.assignments();
        packet.extend([field("dst", dst)]);
        assert_eq!(both.fold(&packet), Expr::bool(false), "packet {dst}");
        // The odd low half hits both entries; the higher priority one wins.
        let forwarded = dst < 0x80 && dst & 1 == 0;
        assert_eq!(fixture.reached(&forward_point(), dst), Some(forwarded), "packet {dst}");
    }
}

#[test]
fn test_unchanged_configuration_refolds_to_the_same_cache() {
    let mut fixture = Fixture::new(vec![exact_key("dst")]);
    fixture.apply(&[insert(
        forward_to(2).with_match("hdr.dst", FieldMatch::Exact(Literal::bits(1, 8))),
    )]);
    let before: Vec<_> = fixture
        .substitution
        .iter()
        .map(|(point, entry)| (point.clone(), entry.folded().cloned()))
        .collect();

    assert!(!fixture.substitution.recompute(&fixture.constraints).unwrap());
    assert!(!fixture.substitution.recompute(&fixture.constraints).unwrap());
    let after: Vec<_> = fixture
        .substitution
        .iter()
        .map(|(point, entry)| (point.clone(), entry.folded().cloned()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_insertion_order_does_not_change_the_configuration() {
    let low = forward_to(1)
        .with_match(
            "hdr.dst",
            FieldMatch::Ternary {
                value: Literal::bits(0x00, 8),
                mask: Literal::bits(0x80, 8),
            },
        )
        .with_priority(1);
    let high = forward_to(2)
        .with_match(
            "hdr.dst",
            FieldMatch::Ternary {
                value: Literal::bits(0x01, 8),
                mask: Literal::bits(0x01, 8),
            },
        )
        .with_priority(5);

    let mut forward = Fixture::new(vec![key("ternary")]);
    forward.apply(&[insert(low.clone()), insert(high.clone())]);
    let mut backward = Fixture::new(vec![key("ternary")]);
    backward.apply(&[insert(high), insert(low)]);

    assert_eq!(
        forward.constraints.constraint(),
        backward.constraints.constraint()
    );
    assert_eq!(
        forward.constraints.assignments(),
        backward.constraints.assignments()
    );
}

#[test]
fn test_branch_join_selects_the_taken_side() {
    let mut fixture = Fixture::new(vec![exact_key("dst")]);
    fixture.apply(&[insert(
        forward_to(2).with_match("hdr.dst", FieldMatch::Exact(Literal::bits(5, 8))),
    )]);

    let dropped = fixture
        .analysis
        .state
        .get(&Path::new("meta.dropped"))
        .unwrap();
    let untouched = Expr::variable(SymbolicVariable::input("meta.dropped", ValueType::bits(1)));
    for dst in 0..256 {
        let mut packet = fixture.constraints.assignments();
        packet.extend([field("dst", dst)]);
        let expected = if dst == 5 {
            untouched.clone()
        } else {
            Expr::bits(1, 1)
        };
        assert_eq!(dropped.fold(&packet), expected, "packet {dst}");
        assert_eq!(
            fixture.reached(&ProgramPoint::Statement(fixture.branch), dst),
            Some(dst != 5)
        );
    }
}

#[test]
fn test_repeated_update_is_rejected_and_changes_nothing() {
    let mut fixture = Fixture::new(vec![exact_key("dst")]);
    let record = forward_to(2).with_match("hdr.dst", FieldMatch::Exact(Literal::bits(9, 8)));

    assert!(fixture.apply(&[insert(record.clone())]));
    let before: Vec<_> = fixture
        .substitution
        .iter()
        .map(|(point, entry)| (point.clone(), entry.folded().cloned()))
        .collect();

    assert!(!fixture.apply(&[insert(record)]));
    assert_eq!(fixture.events.count_kind(EventKind::RecordRejected), 1);
    let after: Vec<_> = fixture
        .substitution
        .iter()
        .map(|(point, entry)| (point.clone(), entry.folded().cloned()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_scoped_refold_matches_full_refold() {
    let mut fixture = Fixture::new(vec![exact_key("dst")]);
    let entry = forward_to(2).with_match("hdr.dst", FieldMatch::Exact(Literal::bits(5, 8)));
    let batches = vec![
        vec![insert(entry.clone())],
        vec![Entity::DefaultAction {
            table: TABLE.to_string(),
            action: "MyIngress.forward".to_string(),
            params: [("port".to_string(), Literal::bits(4, 9))].into_iter().collect(),
        }],
        vec![Entity::TableEntry(UpdateKind::Delete, entry)],
    ];

    for batch in &batches {
        fixture.apply(batch);

        let mut full = SubstitutionMap::from_reachability(&fixture.analysis.reachability);
        full.recompute(&fixture.constraints).unwrap();
        for (point, entry) in fixture.substitution.iter() {
            assert_eq!(
                entry.folded(),
                full.get(point).and_then(|e| e.folded()),
                "{point}"
            );
        }
    }

    // Empty table with `forward` as the default: every packet is forwarded.
    assert_eq!(
        fixture.substitution.is_expression_constant(&forward_point()),
        Some(Literal::Bool(true))
    );
    assert_eq!(
        fixture.substitution.is_expression_constant(&drop_point()),
        Some(Literal::Bool(false))
    );
}

#[test]
fn test_constant_lpm_entry_with_scattered_mask_is_rejected() {
    let mut table = forwarding_table(vec![key("lpm")]);
    table.entries = Some(TableEntries {
        is_const: true,
        entries: vec![ConstEntry {
            keys: vec![KeySetElement::Masked {
                value: Literal::bits(0xa0, 8),
                mask: Literal::bits(0xaa, 8),
            }],
            action: ActionCall::new("drop", vec![]),
            priority: None,
        }],
    });
    let (program, _) = forwarding_program(table);
    let target = V1Model::new();
    let events = EventLog::new();

    let constraints =
        ControlPlaneStateInitializer::new(&program, &target, &events).default_constraints();
    assert!(constraints.table(TABLE).is_none());
    let rejected = events
        .filter_entity(TABLE)
        .filter(|e| e.kind == EventKind::RecordRejected);
    assert_eq!(rejected.count(), 1);

    let analysis = run_analysis(&program, &target, &AnalysisConfig::default(), &events);
    assert!(matches!(analysis, Err(p4reach::Error::Malformed { .. })));
}
