//! Dense least squares for the harmonic fit.
//!
//! Matrices are flat row-major `Vec<f64>`. The systems are small (two
//! columns per constituent, at most 74) so normal equations with a Cholesky
//! factorisation are enough.

/// Accumulates `AᵀA` and `Aᵀb` one design row at a time, so the full design
/// matrix never has to be held in memory.
pub(crate) struct NormalEquations {
    n: usize,
    ata: Vec<f64>,
    atb: Vec<f64>,
    rows: usize,
}

impl NormalEquations {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            n,
            ata: vec![0.0; n * n],
            atb: vec![0.0; n],
            rows: 0,
        }
    }

    pub(crate) fn add_row(&mut self, row: &[f64], rhs: f64) {
        debug_assert_eq!(row.len(), self.n);
        for i in 0..self.n {
            let ri = row[i];
            if ri == 0.0 {
                continue;
            }
            self.atb[i] += ri * rhs;
            // Upper triangle only, mirrored in `solve`
            for j in i..self.n {
                self.ata[i * self.n + j] += ri * row[j];
            }
        }
        self.rows += 1;
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    /// Solve with a ridge term of `ridge * max(diag(AᵀA))` added to the
    /// diagonal. Returns `None` if the system is not positive definite.
    pub(crate) fn solve(mut self, ridge: f64) -> Option<Vec<f64>> {
        let n = self.n;
        for i in 0..n {
            for j in 0..i {
                self.ata[i * n + j] = self.ata[j * n + i];
            }
        }

        let max_diag = (0..n)
            .map(|i| self.ata[i * n + i])
            .fold(0.0_f64, f64::max);
        if max_diag <= 0.0 || !max_diag.is_finite() {
            return None;
        }
        let lambda = ridge * max_diag;
        for i in 0..n {
            self.ata[i * n + i] += lambda;
        }

        let l = cholesky(&self.ata, n)?;
        Some(cholesky_solve(&l, n, &self.atb))
    }
}

/// Lower-triangular `L` with `A = L Lᵀ`.
fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}

fn cholesky_solve(l: &[f64], n: usize, b: &[f64]) -> Vec<f64> {
    // Forward substitution: L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * y[k];
        }
        y[i] = sum / l[i * n + i];
    }
    // Back substitution: Lᵀ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}
