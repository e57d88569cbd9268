//! Distributed kernels checked against serial references.
//!
//! Every routine is run on process groups emulated with threads: a single
//! rank, several ranks on one host, and two hosts with two ranks each. All
//! ranks must return the same full result.

use approx::assert_abs_diff_eq;
use faer::Mat;
use hylinal::matrix::{adjoint, matmul};
use hylinal::{
    CholeskyDecomposition, Comm, GramSchmidtOptions, HlError, LocalComm, back_substitute,
    duo_product, forward_substitute, iterated_gram_schmidt, product, solve_linear_system,
    trio_product,
};
use num_complex::Complex64;
use rand::Rng;

const LAYOUTS: [&[&str]; 4] = [
    &["node0"],
    &["node0", "node0"],
    &["node0", "node0", "node0"],
    &["node0", "node0", "node1", "node1"],
];

fn random_real(nrows: usize, ncols: usize) -> Mat<f64> {
    let mut rng = rand::thread_rng();
    let vals: Vec<f64> = (0..nrows * ncols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Mat::from_fn(nrows, ncols, |i, j| vals[j * nrows + i])
}

fn random_complex(nrows: usize, ncols: usize) -> Mat<Complex64> {
    let mut rng = rand::thread_rng();
    let vals: Vec<Complex64> = (0..nrows * ncols)
        .map(|_| Complex64::new(rng.r#gen(), rng.r#gen()))
        .collect();
    Mat::from_fn(nrows, ncols, |i, j| vals[j * nrows + i])
}

/// Lower-triangular matrix with a dominant diagonal.
fn random_lower(n: usize) -> Mat<f64> {
    let vals = random_real(n, n);
    Mat::from_fn(n, n, |i, j| match i.cmp(&j) {
        std::cmp::Ordering::Less => 0.0,
        std::cmp::Ordering::Equal => 2.5 + vals[(i, j)],
        std::cmp::Ordering::Greater => 0.5 * vals[(i, j)],
    })
}

fn assert_close_real(a: &Mat<f64>, b: &Mat<f64>, epsilon: f64) {
    assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()));
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            assert_abs_diff_eq!(a[(i, j)], b[(i, j)], epsilon = epsilon);
        }
    }
}

fn assert_close_complex(a: &Mat<Complex64>, b: &Mat<Complex64>, epsilon: f64) {
    assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()));
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            assert!(
                (a[(i, j)] - b[(i, j)]).norm() < epsilon,
                "entry ({i}, {j}): {} vs {}",
                a[(i, j)],
                b[(i, j)]
            );
        }
    }
}

#[test]
fn product_matches_serial_real() {
    let a = random_real(8, 6);
    let b = random_real(6, 8);
    let c = random_real(8, 5);
    let expected = matmul(matmul(a.as_ref(), b.as_ref()).as_ref(), c.as_ref());
    for hosts in LAYOUTS {
        let results = LocalComm::run(hosts, |comm| {
            product(&comm, &[a.as_ref(), b.as_ref(), c.as_ref()]).unwrap()
        });
        for r in &results {
            assert_close_real(r, &expected, 1e-10);
        }
    }
}

#[test]
fn product_matches_serial_complex() {
    let a = random_complex(8, 8);
    let b = random_complex(8, 8);
    let expected = matmul(a.as_ref(), b.as_ref());
    for hosts in LAYOUTS {
        let results = LocalComm::run(hosts, |comm| product(&comm, &[a.as_ref(), b.as_ref()]).unwrap());
        for r in &results {
            assert_close_complex(r, &expected, 1e-10);
        }
    }
}

#[test]
fn product_rejects_bad_factor_lists() {
    let comm = LocalComm::solo();
    assert!(matches!(product::<_, f64>(&comm, &[]), Err(HlError::Shape(_))));
    let a = random_real(3, 4);
    assert!(matches!(
        product(&comm, &[a.as_ref(), a.as_ref()]),
        Err(HlError::Shape(_))
    ));
    let single = product(&comm, &[a.as_ref()]).unwrap();
    assert_close_real(&single, &a, 0.0);
}

#[test]
fn duo_and_trio_products() {
    let a = random_complex(6, 4);
    let weights = [0.5, 1.0, 2.0, -1.0].map(|w| Complex64::new(w, 0.0));
    let diag = Mat::from_fn(4, 4, |i, j| if i == j { weights[i] } else { Complex64::new(0.0, 0.0) });
    let duo_expected = matmul(a.as_ref(), diag.as_ref());
    let trio_expected = matmul(duo_expected.as_ref(), adjoint(a.as_ref()).as_ref());

    let duo = duo_product(a.as_ref(), weights).unwrap();
    assert_close_complex(&duo, &duo_expected, 1e-12);

    for hosts in LAYOUTS {
        let results = LocalComm::run(hosts, |comm| trio_product(&comm, a.as_ref(), weights).unwrap());
        for r in &results {
            assert_close_complex(r, &trio_expected, 1e-10);
        }
    }
    assert!(duo_product(a.as_ref(), weights[..3].iter().copied()).is_err());
}

#[test]
fn triangular_solves() {
    let n = 9;
    let l = random_lower(n);
    let u = adjoint(l.as_ref());
    let b = random_real(n, 4);
    for hosts in LAYOUTS {
        let results = LocalComm::run(hosts, |comm| {
            let x = forward_substitute(&comm, l.as_ref(), b.as_ref()).unwrap();
            let y = back_substitute(&comm, u.as_ref(), b.as_ref()).unwrap();
            (x, y)
        });
        for (x, y) in &results {
            assert_close_real(&matmul(l.as_ref(), x.as_ref()), &b, 1e-10);
            assert_close_real(&matmul(u.as_ref(), y.as_ref()), &b, 1e-10);
        }
    }
}

#[test]
fn triangular_shape_errors() {
    let comm = LocalComm::solo();
    let l = random_lower(4);
    let b = random_real(3, 2);
    assert!(matches!(
        forward_substitute(&comm, l.as_ref(), b.as_ref()),
        Err(HlError::Shape(_))
    ));
    let wide = random_real(3, 4);
    assert!(matches!(
        back_substitute(&comm, wide.as_ref(), b.as_ref()),
        Err(HlError::Shape(_))
    ));
}

#[test]
fn cholesky_of_random_hpd() {
    let n = 8;
    let m = random_complex(n, n);
    let mut a = matmul(adjoint(m.as_ref()).as_ref(), m.as_ref());
    for i in 0..n {
        a[(i, i)] += Complex64::new(n as f64, 0.0);
    }
    for hosts in LAYOUTS {
        let results = LocalComm::run(hosts, |comm| {
            let chol = CholeskyDecomposition::new(&comm, a.as_ref()).unwrap();
            let l = chol.l().unwrap().clone();
            let lt = chol.lt().unwrap().clone();
            (l, lt)
        });
        for (l, lt) in &results {
            for j in 0..n {
                for i in 0..j {
                    assert_eq!(l[(i, j)], Complex64::new(0.0, 0.0));
                }
                assert!(l[(j, j)].re > 0.0 && l[(j, j)].im == 0.0);
            }
            assert_close_complex(lt, &adjoint(l.as_ref()), 1e-14);
            assert_close_complex(&matmul(l.as_ref(), lt.as_ref()), &a, 1e-6);
        }
    }
}

#[test]
fn cholesky_reports_failing_column() {
    let comm = LocalComm::solo();
    let a = Mat::from_fn(3, 3, |i, j| match (i, j) {
        (0, 0) => 4.0,
        (1, 1) => -1.0,
        (2, 2) => 1.0,
        _ => 0.0,
    });
    let chol = CholeskyDecomposition::new(&comm, a.as_ref()).unwrap();
    assert!(matches!(chol.l(), Err(HlError::NotPositiveDefinite { column: 1 })));

    let rect = random_real(3, 2);
    assert!(CholeskyDecomposition::new(&comm, rect.as_ref()).is_err());
}

#[test]
fn gram_schmidt_square_and_tall() {
    for (m, n) in [(8, 8), (8, 5)] {
        let a = random_real(m, n);
        for hosts in LAYOUTS {
            let results = LocalComm::run(hosts, |comm| {
                iterated_gram_schmidt(&comm, a.as_ref(), &GramSchmidtOptions::default()).unwrap()
            });
            for qr in &results {
                assert_eq!((qr.q.nrows(), qr.q.ncols()), (m, m));
                assert_eq!((qr.r.nrows(), qr.r.ncols()), (m, n));
                let qhq = matmul(adjoint(qr.q.as_ref()).as_ref(), qr.q.as_ref());
                assert_close_real(&qhq, &Mat::from_fn(m, m, |i, j| if i == j { 1.0 } else { 0.0 }), 1e-6);
                assert_close_real(&matmul(qr.q.as_ref(), qr.r.as_ref()), &a, 1e-6);
                for j in 0..n {
                    for i in j + 1..m {
                        assert_abs_diff_eq!(qr.r[(i, j)], 0.0, epsilon = 1e-8);
                    }
                }
            }
        }
    }
}

#[test]
fn gram_schmidt_complex() {
    let a = random_complex(6, 4);
    let results = LocalComm::run(&["node0", "node0"], |comm| {
        iterated_gram_schmidt(&comm, a.as_ref(), &GramSchmidtOptions::default()).unwrap()
    });
    for qr in &results {
        let eye = Mat::from_fn(6, 6, |i, j| Complex64::new(if i == j { 1.0 } else { 0.0 }, 0.0));
        assert_close_complex(&matmul(adjoint(qr.q.as_ref()).as_ref(), qr.q.as_ref()), &eye, 1e-6);
        assert_close_complex(&matmul(qr.q.as_ref(), qr.r.as_ref()), &a, 1e-6);
    }
}

#[test]
fn linear_system_through_qr() {
    let n = 7;
    let mut a = random_real(n, n);
    for i in 0..n {
        a[(i, i)] += 3.0;
    }
    let b = random_real(n, 2);
    for hosts in LAYOUTS {
        let results = LocalComm::run(hosts, |comm| {
            assert!(comm.rank() < comm.size());
            solve_linear_system(&comm, a.as_ref(), b.as_ref()).unwrap()
        });
        for x in &results {
            assert_close_real(&matmul(a.as_ref(), x.as_ref()), &b, 1e-8);
        }
    }
}
