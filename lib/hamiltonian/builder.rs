//! Static-frame symbolic Hamiltonian for a set of driven couplings.
//!
//! See also [`rotating`][super::rotating].

use log::{ debug, trace };
use num_complex::Complex64 as C64;
use crate::{
    couplings::{ CouplingField, check_paired },
    error::{ Error, Result },
    hilbert::{ Basis, BasisState },
    symbolic::{ Expr, Phase, Symbol, SymbolRegistry, SymMatrix },
};

/// Absolute tolerance for the hermiticity check on coupling fields.
pub const FIELD_HERMITIAN_TOL: f64 = 1e-12;

/// Hamiltonian builder for a set of couplings driven at symbolic frequencies.
///
/// The generated matrix has the free energy symbol `E{k}` of each state on the
/// diagonal and, for the `c`-th coupling, entries
/// ```text
/// H[i, j] += (P * Ω / main_coupling) / 2 * field[i, j] * exp(+i ω_c t)   (i < j)
/// H[j, i] += (P * Ω / main_coupling) / 2 * field[j, i] * exp(-i ω_c t)
/// ```
/// for every field of the coupling, where `P` is the field's polarization
/// symbol if one is given. Every field must be hermitian to within
/// [`FIELD_HERMITIAN_TOL`].
#[derive(Clone, Debug)]
pub struct HBuilderSymbolic<'a, S>
where S: BasisState
{
    pub(crate) basis: &'a Basis<S>,
    pub(crate) couplings: &'a [CouplingField<S>],
}

impl<'a, S> HBuilderSymbolic<'a, S>
where S: BasisState
{
    /// Create a new `HBuilderSymbolic`.
    pub fn new(basis: &'a Basis<S>, couplings: &'a [CouplingField<S>]) -> Self {
        Self { basis, couplings }
    }

    /// Get a reference to the basis.
    pub fn basis(&self) -> &Basis<S> { self.basis }

    /// Get a reference to the couplings.
    pub fn couplings(&self) -> &[CouplingField<S>] { self.couplings }

    /// Build the static-frame Hamiltonian.
    ///
    /// `rabis[c]` is the Rabi symbol of the `c`-th coupling and
    /// `polarizations[c]`, if present, holds one weighting symbol per field of
    /// that coupling. A polarization list may be shorter than the field list,
    /// in which case the trailing fields carry no extra weighting; it may not
    /// be longer. An empty `polarizations` slice means no coupling is
    /// weighted.
    pub fn gen_static(
        &self,
        registry: &mut SymbolRegistry,
        rabis: &[Symbol],
        polarizations: &[Option<Vec<Symbol>>],
    ) -> Result<SymMatrix>
    {
        check_paired(self.couplings, rabis)?;
        if !polarizations.is_empty() {
            check_paired(self.couplings, polarizations)?;
        }
        let n = self.basis.len();
        let mut H = SymMatrix::from_diag(
            (0..n).map(|k| Expr::symbol(registry.energy(k))));

        for (c, (coupling, rabi)) in self.couplings.iter().zip(rabis).enumerate() {
            if coupling.main_coupling == C64::from(0.0) {
                return Err(Error::ZeroMainCoupling { coupling: c });
            }
            let omega = registry.frequency(c);
            let up = Phase::symbol(omega);
            let dn = up.neg();
            let pols: Option<&[Symbol]>
                = polarizations.get(c).and_then(|p| p.as_deref());
            if let Some(p) = pols {
                if p.len() > coupling.fields.len() {
                    return Err(Error::LengthMismatch {
                        what: "polarization symbols of a coupling",
                        expected: coupling.fields.len(),
                        found: p.len(),
                    });
                }
            }
            let scale = 0.5 / coupling.main_coupling;
            for (f, field) in coupling.fields.iter().enumerate() {
                let (nr, nc) = field.matrix.dim();
                if (nr, nc) != (n, n) {
                    return Err(Error::ShapeMismatch {
                        what: "coupling field matrix",
                        expected: vec![n, n],
                        found: vec![nr, nc],
                    });
                }
                if !field.is_hermitian(FIELD_HERMITIAN_TOL) {
                    return Err(Error::NonHermitianField { coupling: c, field: f });
                }
                let syms: Vec<Symbol>
                    = match pols.and_then(|p| p.get(f)) {
                        Some(pol) => vec![*rabi, *pol],
                        None => vec![*rabi],
                    };
                for ((i, j), a) in field.matrix.indexed_iter() {
                    if i >= j || *a == C64::from(0.0) { continue; }
                    let b = field.matrix[[j, i]];
                    trace!("coupling {} field {}: ({}, {}) <- {}", c, f, i, j, a);
                    H.add_to(i, j, &Expr::term(scale * *a, &syms, up.clone()));
                    H.add_to(j, i, &Expr::term(scale * b, &syms, dn.clone()));
                }
            }
        }
        debug!(
            "built static hamiltonian: {} states, {} couplings, {} nonzero entries",
            n, self.couplings.len(), H.nonzero().len(),
        );
        Ok(H)
    }
}

/// Build the static-frame symbolic Hamiltonian for `states` (with reference
/// energies taken from the diagonal of `h_int`) driven by `couplings`.
///
/// See [`HBuilderSymbolic::gen_static`].
pub fn build_static_hamiltonian<S>(
    registry: &mut SymbolRegistry,
    states: &[S],
    h_int: &ndarray::Array2<C64>,
    couplings: &[CouplingField<S>],
    rabis: &[Symbol],
    polarizations: &[Option<Vec<Symbol>>],
) -> Result<SymMatrix>
where S: BasisState
{
    let basis = Basis::from_hamiltonian(states, h_int)?;
    HBuilderSymbolic::new(&basis, couplings)
        .gen_static(registry, rabis, polarizations)
}

#[cfg(test)]
mod test {
    use ndarray as nd;
    use super::*;

    fn three_level() -> (Vec<&'static str>, nd::Array2<C64>, CouplingField<&'static str>) {
        let states = vec!["g0", "g1", "e"];
        let h_int = nd::Array2::from_diag(
            &nd::array![C64::from(0.0), C64::from(0.1), C64::from(10.0)]);
        let z = C64::from(0.0);
        let sigma_p = nd::array![
            [z, z, C64::new(0.6, 0.2)],
            [z, z, z],
            [C64::new(0.6, -0.2), z, z],
        ];
        let sigma_m = nd::array![
            [z, z, z],
            [z, z, C64::from(-0.8)],
            [z, C64::from(-0.8), z],
        ];
        let coupling
            = CouplingField::new("g0", "e", 1.0)
            .with_ground_states(["g0", "g1"])
            .with_field(sigma_p)
            .with_field(sigma_m);
        (states, h_int, coupling)
    }

    #[test]
    fn entries_and_conjugate_structure() {
        let (states, h_int, coupling) = three_level();
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[coupling], &[om], &[]).unwrap();
        let w = reg.frequency(0);

        for k in 0..3 {
            assert_eq!(H.get(k, k), Expr::symbol(reg.energy(k)));
        }
        let c02 = C64::new(0.6, 0.2) * 0.5;
        assert_eq!(H.get(0, 2), Expr::term(c02, &[om], Phase::symbol(w)));
        assert_eq!(H.get(1, 2), Expr::term(C64::from(-0.4), &[om], Phase::symbol(w)));
        assert!(H.entry(0, 1).is_none());

        // lower triangle = upper triangle with conjugated coefficients and
        // reversed phase
        let mut pairs = 0;
        for (i, j, e) in H.nonzero() {
            if i < j {
                assert_eq!(H.get(j, i).conj(), *e);
                pairs += 1;
            }
        }
        assert_eq!(pairs, 2);
    }

    #[test]
    fn polarization_weights() {
        let (states, h_int, coupling) = three_level();
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let p0 = reg.named("P0");
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[coupling.clone()], &[om],
            &[Some(vec![p0])],
        ).unwrap();
        let w = reg.frequency(0);
        // only the first field is weighted
        let c02 = C64::new(0.6, 0.2) * 0.5;
        assert_eq!(H.get(0, 2), Expr::term(c02, &[om, p0], Phase::symbol(w)));
        assert!(!H.get(1, 2).free_symbols().contains(&p0));

        let p1 = reg.named("P1");
        let p2 = reg.named("P2");
        let err = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[coupling], &[om],
            &[Some(vec![p0, p1, p2])],
        );
        assert!(matches!(err, Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn overlapping_fields_accumulate() {
        let states = vec!["g", "e"];
        let h_int = nd::Array2::from_diag(&nd::array![C64::from(0.0), C64::from(1.0)]);
        let z = C64::from(0.0);
        let f = nd::array![[z, C64::from(1.0)], [C64::from(1.0), z]];
        let coupling
            = CouplingField::new("g", "e", 1.0)
            .with_field(f.clone())
            .with_field(f);
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[coupling], &[om], &[]).unwrap();
        let w = reg.frequency(0);
        assert_eq!(H.get(0, 1), Expr::term(C64::from(1.0), &[om], Phase::symbol(w)));
        assert_eq!(H.get(1, 0), Expr::term(C64::from(1.0), &[om], Phase::symbol(w).neg()));
    }

    #[test]
    fn rejects_bad_input() {
        let (states, h_int, coupling) = three_level();
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let err = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[coupling.clone()], &[om, om], &[]);
        assert!(matches!(err, Err(Error::LengthMismatch { .. })));

        let mut zero = coupling.clone();
        zero.main_coupling = C64::from(0.0);
        let err = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[zero], &[om], &[]);
        assert!(matches!(err, Err(Error::ZeroMainCoupling { coupling: 0 })));

        let z = C64::from(0.0);
        let skewed = coupling.clone().with_field(nd::array![
            [z, z, C64::new(0.0, 1.0)],
            [z, z, z],
            [C64::new(0.0, 1.0), z, z],
        ]);
        let err = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[skewed], &[om], &[]);
        assert!(matches!(
            err, Err(Error::NonHermitianField { coupling: 0, field: 2 })));

        let small = coupling.with_field(nd::Array2::zeros((2, 2)));
        let err = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[small], &[om], &[]);
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
    }
}
