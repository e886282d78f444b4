//! Block-evaluator benchmarks: the classic polynomial over a compressed
//! operand, per backend and output flavor, plus the last-match shortcut.

use criterion::{criterion_group, criterion_main, Criterion};

use colzip::{
    eval, CArray, CArrayOptions, CTable, Column, Env, EvalOpts, Operand, OutFlavor, Vm,
};

const N: usize = 1_000_000;
const EXPR: &str = "((.25*x + .75)*x - 1.5)*x - 2";

fn operand() -> Column {
    Column::from(
        CArray::arange(
            0i64,
            N as i64,
            1,
            CArrayOptions {
                expectedlen: Some(N),
                ..CArrayOptions::default()
            },
        )
        .unwrap(),
    )
}

fn bench_eval(c: &mut Criterion) {
    let x = operand();
    let mut group = c.benchmark_group("polynomial");
    for (vm, vm_name) in [(Vm::Native, "native"), (Vm::Host, "host")] {
        for (flavor, flavor_name) in [(OutFlavor::Column, "column"), (OutFlavor::Dense, "dense")]
        {
            group.bench_function(format!("{vm_name}/{flavor_name}"), |b| {
                b.iter(|| {
                    let mut env = Env::new();
                    env.insert("x", Operand::Column(&x));
                    eval(
                        EXPR,
                        &env,
                        &EvalOpts {
                            vm: Some(vm),
                            out_flavor: Some(flavor),
                            ..EvalOpts::default()
                        },
                    )
                    .unwrap()
                })
            });
        }
    }
    group.finish();
}

fn bench_last_match(c: &mut Criterion) {
    let x = operand();
    let table = CTable::new(vec![x], Some(vec!["x".into()])).unwrap();
    let mask = table
        .eval(&format!("x > {}", N - 2), &EvalOpts::default())
        .unwrap()
        .into_column()
        .unwrap()
        .into_bool()
        .unwrap();

    let mut group = c.benchmark_group("wheretrue");
    group.bench_function("full_scan_last", |b| {
        b.iter(|| mask.wheretrue(0, None).unwrap().last().unwrap())
    });
    group.bench_function("skip_minus_one", |b| {
        b.iter(|| mask.wheretrue(-1, None).unwrap().next().unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_eval, bench_last_match);
criterion_main!(benches);
