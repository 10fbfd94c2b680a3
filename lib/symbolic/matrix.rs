//! Sparse, growable square matrices of [`Expr`]s.

use std::fmt;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap as HashMap;
use crate::{
    error::{ Error, Result },
    symbolic::{ Expr, Symbol, SymbolRegistry },
};

/// Square symbolic matrix stored as an arena of level slots.
///
/// Each row/column index maps to a stable slot id through an ordered slot
/// list, and nonzero entries live in a hash map keyed by `(slot, slot)`.
/// Inserting a new all-zero level is therefore a splice of the slot list and
/// never touches existing entries. Zero entries are never stored.
#[derive(Clone, Debug, Default)]
pub struct SymMatrix {
    slots: Vec<usize>,
    next_slot: usize,
    entries: HashMap<(usize, usize), Expr>,
}

impl SymMatrix {
    /// Create an `n`×`n` zero matrix.
    pub fn zeros(n: usize) -> Self {
        Self { slots: (0..n).collect(), next_slot: n, entries: HashMap::default() }
    }

    /// Create an `n`×`n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::from_diag((0..n).map(|_| Expr::constant(1.0)))
    }

    /// Create a diagonal matrix.
    pub fn from_diag<I>(diag: I) -> Self
    where I: IntoIterator<Item = Expr>
    {
        let diag: Vec<Expr> = diag.into_iter().collect();
        let mut acc = Self::zeros(diag.len());
        diag.into_iter().enumerate().for_each(|(k, e)| acc.set(k, k, e));
        acc
    }

    /// Number of rows (equivalently, columns).
    pub fn dim(&self) -> usize { self.slots.len() }

    fn key(&self, i: usize, j: usize) -> (usize, usize) {
        let n = self.dim();
        if i >= n || j >= n {
            panic!("SymMatrix: index ({}, {}) out of bounds for dimension {}", i, j, n);
        }
        (self.slots[i], self.slots[j])
    }

    /// Borrow the `(i, j)`-th entry, or `None` if it is zero.
    ///
    /// *Panics* if either index is out of bounds.
    pub fn entry(&self, i: usize, j: usize) -> Option<&Expr> {
        self.entries.get(&self.key(i, j))
    }

    /// Return a copy of the `(i, j)`-th entry.
    ///
    /// *Panics* if either index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> Expr {
        self.entry(i, j).cloned().unwrap_or_default()
    }

    /// Overwrite the `(i, j)`-th entry.
    ///
    /// *Panics* if either index is out of bounds.
    pub fn set(&mut self, i: usize, j: usize, value: Expr) {
        let key = self.key(i, j);
        if value.is_zero() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Add `value` to the `(i, j)`-th entry.
    ///
    /// *Panics* if either index is out of bounds.
    pub fn add_to(&mut self, i: usize, j: usize, value: &Expr) {
        let key = self.key(i, j);
        let entry = self.entries.entry(key).or_default();
        *entry += value;
        if entry.is_zero() { self.entries.remove(&key); }
    }

    fn index_map(&self) -> HashMap<usize, usize> {
        self.slots.iter().enumerate().map(|(k, s)| (*s, k)).collect()
    }

    /// Return all nonzero entries as `(i, j, value)` in row-major order.
    pub fn nonzero(&self) -> Vec<(usize, usize, &Expr)> {
        let index = self.index_map();
        let mut acc: Vec<(usize, usize, &Expr)>
            = self.entries.iter()
            .map(|((si, sj), e)| (index[si], index[sj], e))
            .collect();
        acc.sort_by_key(|(i, j, _)| (*i, *j));
        acc
    }

    /// Return the diagonal.
    pub fn diag(&self) -> Vec<Expr> {
        (0..self.dim()).map(|k| self.get(k, k)).collect()
    }

    /// Insert an all-zero row and column at `idx`, shifting every later index
    /// up by one.
    ///
    /// *Panics* if `idx > self.dim()`.
    pub fn insert_level(&mut self, idx: usize) {
        if idx > self.dim() {
            panic!("SymMatrix::insert_level: index {} out of bounds for dimension {}", idx, self.dim());
        }
        self.slots.insert(idx, self.next_slot);
        self.next_slot += 1;
    }

    /// Remove the rows and columns at `indices`, discarding their entries.
    pub fn remove_levels(&mut self, indices: &[usize]) {
        let dropped: Vec<usize>
            = indices.iter()
            .filter_map(|k| self.slots.get(*k).copied())
            .collect();
        self.entries.retain(|(si, sj), _| {
            !dropped.contains(si) && !dropped.contains(sj)
        });
        self.slots.retain(|s| !dropped.contains(s));
    }

    /// Apply a fallible function to every nonzero entry.
    pub fn try_map<F>(&self, mut f: F) -> Result<Self>
    where F: FnMut(usize, usize, &Expr) -> Result<Expr>
    {
        let mut acc = Self::zeros(self.dim());
        for (i, j, e) in self.nonzero() {
            acc.set(i, j, f(i, j, e)?);
        }
        Ok(acc)
    }

    /// Substitute `value` for `sym` in every entry.
    pub fn subs(&self, sym: Symbol, value: &Expr) -> Result<Self> {
        self.try_map(|_, _, e| e.subs(sym, value))
    }

    /// Apply several substitutions in order to every entry.
    pub fn subs_all(&self, rules: &[(Symbol, Expr)]) -> Result<Self> {
        self.try_map(|_, _, e| e.subs_all(rules))
    }

    /// Multiply every entry by a constant.
    pub fn scale(&self, c: C64) -> Self {
        let mut acc = self.clone();
        acc.entries.values_mut().for_each(|e| { *e = e.scale(c); });
        acc
    }

    /// Conjugate transpose, treating every symbol as real.
    pub fn adjoint(&self) -> Self {
        let mut acc = Self::zeros(self.dim());
        for (i, j, e) in self.nonzero() {
            acc.set(j, i, e.conj());
        }
        acc
    }

    /// Entrywise time derivative.
    pub fn diff_t(&self) -> Self {
        let mut acc = Self::zeros(self.dim());
        for (i, j, e) in self.nonzero() {
            acc.set(i, j, e.diff_t());
        }
        acc
    }

    /// Matrix product.
    ///
    /// *Panics* if the dimensions differ.
    pub fn matmul(&self, rhs: &Self) -> Self {
        if self.dim() != rhs.dim() {
            panic!("SymMatrix::matmul: dimension mismatch {} != {}", self.dim(), rhs.dim());
        }
        let mut rows: HashMap<usize, Vec<(usize, &Expr)>> = HashMap::default();
        for (k, j, e) in rhs.nonzero() {
            rows.entry(k).or_default().push((j, e));
        }
        let mut acc = Self::zeros(self.dim());
        for (i, k, a) in self.nonzero() {
            let Some(row) = rows.get(&k) else { continue; };
            for (j, b) in row.iter() {
                acc.add_to(i, *j, &(a * *b));
            }
        }
        acc
    }

    /// Return `true` if no entry contains a phase factor.
    pub fn is_time_independent(&self) -> bool {
        self.entries.values().all(|e| e.is_time_independent())
    }

    /// Replace every phase factor by 1.
    pub fn at_time_zero(&self) -> Self {
        let mut acc = Self::zeros(self.dim());
        for (i, j, e) in self.nonzero() {
            acc.set(i, j, e.at_time_zero());
        }
        acc
    }

    /// Numerically evaluate at time `t`, given values for every remaining
    /// symbol.
    pub fn evaluate(&self, values: &HashMap<Symbol, C64>, t: f64)
        -> Result<nd::Array2<C64>>
    {
        let n = self.dim();
        let mut H: nd::Array2<C64> = nd::Array2::zeros((n, n));
        for (i, j, e) in self.nonzero() {
            H[[i, j]] = e.evaluate(values, t)?;
        }
        Ok(H)
    }

    /// Return a dense copy as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<Expr>> {
        let n = self.dim();
        let mut rows: Vec<Vec<Expr>> = vec![vec![Expr::zero(); n]; n];
        for (i, j, e) in self.nonzero() {
            rows[i][j] = e.clone();
        }
        rows
    }

    /// Check that `self` has dimension `n`.
    pub(crate) fn check_dim(&self, what: &'static str, n: usize) -> Result<()> {
        if self.dim() != n {
            return Err(Error::ShapeMismatch {
                what,
                expected: vec![n, n],
                found: vec![self.dim(), self.dim()],
            });
        }
        Ok(())
    }

    /// Display `self` using the symbol names held by `registry`.
    pub fn display<'a>(&'a self, registry: &'a SymbolRegistry)
        -> SymMatrixDisplay<'a>
    {
        SymMatrixDisplay { matrix: self, registry }
    }
}

impl std::ops::Sub for &SymMatrix {
    type Output = SymMatrix;

    fn sub(self, rhs: &SymMatrix) -> SymMatrix {
        let mut acc = self.clone();
        for (i, j, e) in rhs.nonzero() {
            acc.add_to(i, j, &(-e));
        }
        acc
    }
}

impl std::ops::Add for &SymMatrix {
    type Output = SymMatrix;

    fn add(self, rhs: &SymMatrix) -> SymMatrix {
        let mut acc = self.clone();
        for (i, j, e) in rhs.nonzero() {
            acc.add_to(i, j, e);
        }
        acc
    }
}

impl PartialEq for SymMatrix {
    fn eq(&self, other: &Self) -> bool {
        if self.dim() != other.dim() { return false; }
        let lhs = self.nonzero();
        let rhs = other.nonzero();
        lhs.len() == rhs.len()
            && lhs.iter().zip(rhs.iter())
                .all(|((i1, j1, e1), (i2, j2, e2))| {
                    i1 == i2 && j1 == j2 && e1 == e2
                })
    }
}

/// Helper returned by [`SymMatrix::display`].
pub struct SymMatrixDisplay<'a> {
    matrix: &'a SymMatrix,
    registry: &'a SymbolRegistry,
}

impl<'a> fmt::Display for SymMatrixDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for row in self.matrix.to_rows().iter() {
            let row: Vec<String>
                = row.iter()
                .map(|e| e.display(self.registry).to_string())
                .collect();
            writeln!(f, "  [{}],", row.join(", "))?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbolic::Phase;

    #[test]
    fn insert_level_splices() {
        let mut reg = SymbolRegistry::new();
        let x = reg.named("x");
        let mut m = SymMatrix::zeros(2);
        m.set(0, 1, Expr::symbol(x));
        m.set(1, 1, Expr::constant(2.0));
        m.insert_level(1);
        assert_eq!(m.dim(), 3);
        assert_eq!(m.get(0, 2), Expr::symbol(x));
        assert_eq!(m.get(2, 2), Expr::constant(2.0));
        assert!(m.entry(1, 1).is_none());
        assert!(m.entry(0, 1).is_none());
        m.insert_level(3);
        assert_eq!(m.dim(), 4);
        assert_eq!(m.nonzero().len(), 2);
        m.remove_levels(&[1, 3]);
        assert_eq!(m.dim(), 2);
        assert_eq!(m.get(0, 1), Expr::symbol(x));
    }

    #[test]
    fn products_and_adjoint() {
        let mut reg = SymbolRegistry::new();
        let x = reg.named("x");
        let w = reg.frequency(0);
        let mut m = SymMatrix::zeros(2);
        m.set(0, 1, Expr::term(C64::i(), &[x], Phase::symbol(w)));
        let adj = m.adjoint();
        assert_eq!(adj.get(1, 0), Expr::term(-C64::i(), &[x], Phase::symbol(w).neg()));
        assert!(adj.entry(0, 1).is_none());
        let prod = m.matmul(&adj);
        // (0, 0) = i x e^{iwt} * (-i) x e^{-iwt} = x^2
        assert_eq!(prod.get(0, 0), &Expr::symbol(x) * &Expr::symbol(x));
        assert!(prod.is_time_independent());
        assert_eq!(SymMatrix::identity(2).matmul(&m), m);
        assert!((&m - &m).nonzero().is_empty());
    }

    #[test]
    fn numeric_evaluation() {
        let mut reg = SymbolRegistry::new();
        let x = reg.named("x");
        let mut m = SymMatrix::identity(2);
        m.set(0, 1, Expr::symbol(x).scale(C64::from(0.5)));
        let values: HashMap<Symbol, C64> = [(x, C64::from(4.0))].into_iter().collect();
        let H = m.evaluate(&values, 0.0).unwrap();
        assert_eq!(H[[0, 1]], C64::from(2.0));
        assert_eq!(H[[1, 1]], C64::from(1.0));
        assert_eq!(H[[1, 0]], C64::from(0.0));
    }
}
