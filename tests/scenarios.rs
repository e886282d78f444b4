//! End-to-end scenarios across the array, table and evaluator layers.

use colzip::{
    eval, CArray, CArrayOptions, CParams, CTable, Column, Env, EvalOpts, Operand, OutFlavor,
    Scalar, Vm, NROW,
};

const N: usize = 1_000_000;

fn arange_i64(n: usize, cparams: CParams) -> CArray<i64> {
    CArray::arange(
        0,
        n as i64,
        1,
        CArrayOptions {
            cparams,
            expectedlen: Some(n),
            ..CArrayOptions::default()
        },
    )
    .unwrap()
}

/// Small deterministic xorshift generator for the random-data scenario.
struct XorShift(u64);

impl XorShift {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Roughly bell-shaped values with a scale of ~100.
    fn next_sample(&mut self) -> f64 {
        let sum: f64 = (0..4)
            .map(|_| (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 - 0.5)
            .sum();
        sum * 200.0
    }
}

#[test]
fn scenario_build_large_then_read() {
    let arr = arange_i64(N, CParams::new(9, true).unwrap());
    assert_eq!(arr.len(), N);
    assert_eq!(arr.get(0).unwrap(), 0);
    assert_eq!(arr.get(N - 1).unwrap(), (N - 1) as i64);
    let head = arr.slice(0, Some(10), 1).unwrap();
    assert_eq!(&head[..], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    // Monotone integers with shuffle on compress very well.
    assert!(arr.compression_ratio() > 10.0);
}

#[test]
fn scenario_polynomial_mask_both_backends() {
    let n = 100_000usize;
    let arr = arange_i64(n, CParams::default());
    let x = Column::from(arr);
    let mut env = Env::new();
    env.insert("x", Operand::Column(&x));
    let expr = "(((.25*x + .75)*x - 1.5)*x - 2) < 0";

    let poly = |v: f64| ((0.25 * v + 0.75) * v - 1.5) * v - 2.0;
    let expected: usize = (0..n).filter(|&i| poly(i as f64) < 0.0).count();

    for vm in [Vm::Native, Vm::Host] {
        let mask = eval(
            expr,
            &env,
            &EvalOpts {
                vm: Some(vm),
                out_flavor: Some(OutFlavor::Column),
                ..EvalOpts::default()
            },
        )
        .unwrap()
        .into_column()
        .unwrap();
        assert_eq!(mask.len(), n);
        let bools = mask.into_bool().unwrap();
        let count = bools.wheretrue(0, None).unwrap().count();
        assert_eq!(count, expected, "vm={vm:?}");
    }
}

#[test]
fn scenario_table_where_with_row_numbers() {
    let n = 100_000usize;
    let make = || Column::from(arange_i64(n, CParams::default()));
    let table = CTable::new(
        vec![make(), make(), make()],
        Some(vec!["x".into(), "y".into(), "z".into()]),
    )
    .unwrap();

    let rows: Vec<_> = table
        .rows_where("x > 5", Some(&[NROW, "y"]), 0, None)
        .unwrap()
        .collect();
    assert_eq!(rows.len(), n - 6);
    assert_eq!(rows[0].get(NROW), Some(Scalar::Int64(6)));
    assert_eq!(rows[0].get("y"), Some(Scalar::Int64(6)));
    let last = rows.last().unwrap();
    assert_eq!(last.get(NROW), Some(Scalar::Int64((n - 1) as i64)));
    assert_eq!(last.get("y"), Some(Scalar::Int64((n - 1) as i64)));
}

#[test]
fn scenario_streamed_appends_fill_chunks() {
    let mut arr: CArray<i64> = CArray::with_options(CArrayOptions {
        expectedlen: Some(N),
        ..CArrayOptions::default()
    });
    assert_eq!(arr.chunklen(), 8192);

    let block: Vec<i64> = (0..100_000).collect();
    for _ in 0..10 {
        arr.append(&block).unwrap();
    }
    assert_eq!(arr.len(), N);
    // Every sealed chunk is full; the remainder sits in the hot buffer.
    assert_eq!(arr.nchunks(), N / arr.chunklen());
    assert_eq!(arr.get(N - 1).unwrap(), 99_999);
}

#[test]
fn scenario_trim_then_resize_with_default() {
    let data: Vec<i64> = (0..100).collect();
    let mut arr = CArray::from_slice_with(
        &data,
        CArrayOptions {
            dflt: -1,
            ..CArrayOptions::default()
        },
    )
    .unwrap();
    arr.trim(30).unwrap();
    assert_eq!(arr.len(), 70);
    arr.resize(200).unwrap();
    assert_eq!(arr.len(), 200);
    assert_eq!(arr.get(69).unwrap(), 69);
    assert_eq!(arr.get(70).unwrap(), -1);
    assert_eq!(arr.get(199).unwrap(), -1);
}

#[test]
fn scenario_last_match_shortcut_on_random_data() {
    let mut rng = XorShift(1);
    let samples: Vec<f64> = (0..N).map(|_| rng.next_sample()).collect();
    let arr = CArray::from_slice(&samples).unwrap();
    let col = Column::from(arr);

    let mut env = Env::new();
    env.insert("a", Operand::Column(&col));
    let mask = eval("a > 100", &env, &EvalOpts::default())
        .unwrap()
        .into_column()
        .unwrap()
        .into_bool()
        .unwrap();

    let expected = samples.iter().rposition(|&v| v > 100.0).unwrap();
    let via_scan: Vec<usize> = mask.wheretrue(0, None).unwrap().collect();
    let via_shortcut: Vec<usize> = mask.wheretrue(-1, None).unwrap().collect();
    assert_eq!(via_shortcut, vec![expected]);
    assert_eq!(via_shortcut[0], *via_scan.last().unwrap());
}

#[test]
fn scenario_roundtrip_all_cparams() {
    let data: Vec<i32> = (0..10_000).map(|i| i * 7 - 300).collect();
    for clevel in [0u8, 1, 5, 9] {
        for shuffle in [false, true] {
            let arr = CArray::from_slice_with(
                &data,
                CArrayOptions {
                    cparams: CParams::new(clevel, shuffle).unwrap(),
                    ..CArrayOptions::default()
                },
            )
            .unwrap();
            assert_eq!(&arr.to_vec()[..], &data[..], "clevel={clevel} shuffle={shuffle}");
        }
    }
}

#[test]
fn scenario_where_matches_direct_filter() {
    let n = 50_000usize;
    let vals: Vec<i64> = (0..n as i64).map(|i| (i * 37) % 1000).collect();
    let arr = CArray::from_slice(&vals).unwrap();
    let mask_vec: Vec<bool> = vals.iter().map(|&v| v < 13).collect();
    let mask = CArray::from_slice(&mask_vec).unwrap();

    let got: Vec<i64> = arr.where_values(&mask, 0, None).unwrap().collect();
    let want: Vec<i64> = vals
        .iter()
        .zip(&mask_vec)
        .filter(|&(_, &m)| m)
        .map(|(&v, _)| v)
        .collect();
    assert_eq!(got, want);
}
