#![allow(unused)]
extern crate p4reach;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use p4reach::{
    control_plane::{
        objects::{ActionAssignment, TableConfiguration, TableDefaultAction},
        ControlPlaneConstraints,
    },
    expr::{Expr, SymbolicVariable, ValueType},
    state::ProgramPoint,
    substitution::SubstitutionMap,
};
use std::{collections::BTreeSet, hint::black_box};

fn table_name(index: usize) -> String {
    format!("MyIngress.t{index}")
}

/// Builds `tables` tables with two actions each, and the reachability conditions of
/// those actions over a shared packet field.
fn setup(tables: usize) -> (SubstitutionMap, ControlPlaneConstraints) {
    let packet = Expr::variable(SymbolicVariable::input("hdr.dst", ValueType::bits(16)));
    let mut map = SubstitutionMap::new();
    let mut constraints = ControlPlaneConstraints::new();

    for index in 0..tables {
        let table = table_name(index);
        let active = Expr::variable(SymbolicVariable::table_active(&table));
        let key = Expr::variable(SymbolicVariable::table_key(
            &table,
            "hdr.dst",
            ValueType::bits(16),
        ));
        let default = Expr::variable(SymbolicVariable::default_action(&table));
        let hit = Expr::and(active, Expr::eq(packet.clone(), key));

        map.register(
            ProgramPoint::table_action(&table, "forward"),
            Expr::or(
                hit.clone(),
                Expr::and(
                    Expr::not(hit.clone()),
                    Expr::eq(default.clone(), Expr::string("MyIngress.forward")),
                ),
            ),
        );
        map.register(
            ProgramPoint::table_action(&table, "drop"),
            Expr::and(
                Expr::not(hit),
                Expr::eq(default, Expr::string("MyIngress.drop")),
            ),
        );

        let drop = TableDefaultAction::new(ActionAssignment::new(&table, "MyIngress.drop"));
        constraints.insert(table.as_str(), TableConfiguration::new(&table, drop));
    }
    (map, constraints)
}

/// Full refold against a refold scoped to the default action of one table.
fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    for tables in [16usize, 128, 1024] {
        let (map, mut constraints) = setup(tables);
        let changed = table_name(0);
        let forward = TableDefaultAction::new(ActionAssignment::new(&changed, "MyIngress.forward"));
        if let Some(table) = constraints.table_mut(&changed) {
            table.set_default_action(forward);
        }
        let touched: BTreeSet<_> = [SymbolicVariable::default_action(&changed)]
            .into_iter()
            .collect();

        group.throughput(Throughput::Elements((tables * 2) as u64));
        group.bench_with_input(BenchmarkId::new("full", tables), &tables, |b, _| {
            b.iter_batched(
                || map.clone(),
                |mut map| black_box(map.recompute(black_box(&constraints)).unwrap()),
                BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("scoped", tables), &tables, |b, _| {
            b.iter_batched(
                || map.clone(),
                |mut map| {
                    black_box(
                        map.recompute_scoped(black_box(&touched), &constraints)
                            .unwrap(),
                    )
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_recompute);
criterion_main!(benches);
