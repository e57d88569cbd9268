use criterion::{black_box, Criterion, criterion_group, criterion_main};
use faer::Mat;
use hylinal::matrix::matmul;
use hylinal::{LocalComm, product, trio_product};

fn bench_product_vs_serial(c: &mut Criterion) {
    let n = 200;
    let data: Vec<f64> = (0..n * n).map(|i| (i as f64).sin()).collect();
    let a = Mat::from_fn(n, n, |i, j| data[j * n + i]);
    let b = Mat::from_fn(n, n, |i, j| data[i * n + j].cos());
    let weights: Vec<f64> = (0..n).map(|i| (i as f64).cos()).collect();
    let comm = LocalComm::solo();

    c.bench_function("hylinal product", |ben| {
        ben.iter(|| {
            let _ab = product(&comm, &[black_box(a.as_ref()), black_box(b.as_ref())]).unwrap();
        })
    });

    c.bench_function("serial matmul", |ben| {
        ben.iter(|| {
            let _ab = matmul(black_box(a.as_ref()), black_box(b.as_ref()));
        })
    });

    c.bench_function("hylinal trio product", |ben| {
        ben.iter(|| {
            let _t = trio_product(&comm, black_box(a.as_ref()), weights.iter().copied()).unwrap();
        })
    });
}

criterion_group!(benches, bench_product_vs_serial);
criterion_main!(benches);
