//! Transformation of a static-frame Hamiltonian into the rotating frame of its
//! drives.
//!
//! The phase rates are fixed by eliminating unknowns from the highest state
//! index down, leaving the lowest-index state of each coupled set at rest.
//! This is the reverse of the usual pivot order of a symbolic solver (which
//! leaves the highest-index state free), so a driven two-level system comes
//! out as `[[0, Ω/2], [Ωᶜ/2, -δ]]` rather than `[[δ, Ω/2], [Ωᶜ/2, 0]]`. The
//! two differ only by a global energy offset.
//!
//! See also [`builder`][super::builder].

use log::{ debug, trace };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    couplings::{ CouplingField, check_paired },
    error::{ Error, Result },
    hilbert::{ Basis, BasisState },
    symbolic::{ Expr, Phase, Symbol, SymbolRegistry, SymMatrix },
};

/// Find every coupled pair `(i, j)`, `i < j`, in the upper triangle of `H`
/// along with the single oscillation frequency driving it.
///
/// Fails if any nonzero upper-triangular entry holds zero or several
/// frequency symbols.
pub fn coupled_pairs(registry: &SymbolRegistry, H: &SymMatrix)
    -> Result<Vec<(usize, usize, Symbol)>>
{
    let mut pairs: Vec<(usize, usize, Symbol)> = Vec::new();
    for (i, j, e) in H.nonzero() {
        if i >= j { continue; }
        let freqs: Vec<Symbol>
            = e.free_symbols().into_iter()
            .filter(|s| registry.is_frequency(*s))
            .collect();
        match freqs.as_slice() {
            [w] => {
                trace!("({}, {}) oscillates at {}", i, j, registry.name(*w));
                pairs.push((i, j, *w));
            },
            _ => {
                return Err(Error::FrequencyCount {
                    row: i,
                    col: j,
                    found: freqs.iter()
                        .map(|s| registry.name(*s).to_string())
                        .collect(),
                });
            },
        }
    }
    Ok(pairs)
}

/// Diagonal gauge transform `T(t) = diag(exp(i a_k t))` that removes the
/// oscillating phase factors from a Hamiltonian.
#[derive(Clone, Debug, PartialEq)]
pub struct RotatingFrame {
    rates: Vec<Option<Phase>>,
}

impl RotatingFrame {
    /// Solve `ω = a_i - a_j` for every coupled pair `(i, j, ω)` of an
    /// `n`-state system.
    ///
    /// Unknowns are eliminated from the highest index down, so the
    /// lowest-index state of each connected set of couplings is left free.
    /// Free unknowns are fixed to zero and receive no transform. Pair indices
    /// must be less than `n`.
    pub fn solve(
        registry: &SymbolRegistry,
        n: usize,
        pairs: &[(usize, usize, Symbol)],
    ) -> Result<Self>
    {
        if let Some((i, j, _)) = pairs.iter().find(|(i, j, _)| *i >= n || *j >= n) {
            return Err(Error::ShapeMismatch {
                what: "coupled pair index",
                expected: vec![n, n],
                found: vec![*i, *j],
            });
        }
        let mut rows: Vec<(Vec<i64>, Phase)>
            = pairs.iter()
            .map(|(i, j, w)| {
                let mut coeffs = vec![0_i64; n];
                coeffs[*i] += 1;
                coeffs[*j] -= 1;
                (coeffs, Phase::symbol(*w))
            })
            .collect();
        let mut pivots: Vec<Option<usize>> = vec![None; rows.len()];

        for col in (0..n).rev() {
            let Some(r)
                = (0..rows.len())
                .find(|r| pivots[*r].is_none() && rows[*r].0[col] != 0)
                else { continue; };
            // each row starts as a difference of two unit vectors, so the
            // system stays totally unimodular and every pivot is +/-1
            let p = rows[r].0[col];
            debug_assert!(p.abs() == 1);
            rows[r].0.iter_mut().for_each(|c| { *c *= p; });
            rows[r].1 = Phase::zero().add_scaled(&rows[r].1, p);
            pivots[r] = Some(col);

            let (pivot_coeffs, pivot_rhs) = rows[r].clone();
            for (r2, (coeffs, rhs)) in rows.iter_mut().enumerate() {
                let q = coeffs[col];
                if r2 == r || q == 0 { continue; }
                coeffs.iter_mut().zip(pivot_coeffs.iter())
                    .for_each(|(c, pc)| { *c -= q * *pc; });
                *rhs = rhs.add_scaled(&pivot_rhs, -q);
            }
        }

        let mut rates: Vec<Option<Phase>> = vec![None; n];
        for ((_, rhs), pivot) in rows.into_iter().zip(pivots) {
            match pivot {
                Some(col) => { rates[col] = Some(rhs); },
                None if !rhs.is_zero() => {
                    return Err(Error::InconsistentFrame {
                        residual: rhs.to_expr().display(registry).to_string(),
                    });
                },
                None => { },
            }
        }
        debug!(
            "solved {} of {} phase rates from {} equations",
            rates.iter().filter(|a| a.is_some()).count(), n, pairs.len(),
        );
        Ok(Self { rates })
    }

    /// Solved phase rate of each state; `None` for free states.
    pub fn rates(&self) -> &[Option<Phase>] { &self.rates }

    /// The transform `T(t)` as a symbolic matrix.
    pub fn unitary(&self) -> SymMatrix {
        SymMatrix::from_diag(
            self.rates.iter()
            .map(|a| match a {
                Some(rate) => Expr::oscillation(rate.clone()),
                None => Expr::constant(1.0),
            })
        )
    }

    /// Transform `H` as `T^† H T - i T^† dT/dt`.
    pub fn apply(&self, H: &SymMatrix) -> SymMatrix {
        let T = self.unitary();
        let T_dag = T.adjoint();
        let kinetic = T_dag.matmul(&T.diff_t()).scale(C64::i());
        &T_dag.matmul(H).matmul(&T) - &kinetic
    }
}

/// Transform a static-frame symbolic Hamiltonian to the rotating frame.
///
/// `H` must hold the energy symbols `E{k}` on its diagonal and, in every
/// nonzero upper-triangular entry, phase factors at exactly one coupling
/// frequency `ω{c}`. After the transform, each `ω{c}` is re-expressed as
/// `E_excited - E_ground + δ_c` for the coupling's reference states, the
/// energy symbols are replaced by the diagonal of `h_int`, and the diagonal is
/// shifted so that each coupling's ground and excited manifolds sit at zero on
/// resonance.
pub fn symbolic_hamiltonian_to_rotating_frame<S>(
    registry: &mut SymbolRegistry,
    H: &SymMatrix,
    states: &[S],
    h_int: &nd::Array2<C64>,
    couplings: &[CouplingField<S>],
    detunings: &[Symbol],
) -> Result<SymMatrix>
where S: BasisState
{
    check_paired(couplings, detunings)?;
    let basis = Basis::from_hamiltonian(states, h_int)?;
    let n = basis.len();
    H.check_dim("static hamiltonian", n)?;

    let pairs = coupled_pairs(registry, H)?;
    debug!("found {} coupled pairs", pairs.len());
    let frame = RotatingFrame::solve(registry, n, &pairs)?;
    let mut transformed = frame.apply(H);

    // frequencies -> detunings
    for (c, (delta, coupling)) in detunings.iter().zip(couplings).enumerate() {
        let omega = registry.frequency(c);
        let idg = basis.index_of(&coupling.ground_main)?;
        let ide = basis.index_of(&coupling.excited_main)?;
        let value
            = &(&Expr::symbol(registry.energy(ide))
                - &Expr::symbol(registry.energy(idg)))
            + &Expr::symbol(*delta);
        transformed = transformed.subs(omega, &value)?;
    }

    // symbolic energies -> numeric energies
    let rules: Vec<(Symbol, Expr)>
        = (0..n)
        .map(|k| {
            let e = basis.get_energy_index(k).unwrap_or_default();
            (registry.energy(k), Expr::constant(e))
        })
        .collect();
    transformed = transformed.subs_all(&rules)?;

    // re-anchor each coupled manifold at zero energy on resonance
    for coupling in couplings.iter() {
        let idg = basis.index_of(&coupling.ground_main)?;
        let ide = basis.index_of(&coupling.excited_main)?;
        let indices_ground = basis.indices_of(&coupling.ground_states)?;
        let indices_excited = basis.indices_of(&coupling.excited_states)?;
        let g = transformed.get(idg, idg).residual();
        let e = transformed.get(ide, ide).residual();
        trace!("re-anchoring ground by {} and excited by {}", g, e);
        let shift_g = Expr::constant(-g);
        let shift_e = Expr::constant(-e);
        indices_ground.iter()
            .for_each(|k| transformed.add_to(*k, *k, &shift_g));
        indices_excited.iter()
            .for_each(|k| transformed.add_to(*k, *k, &shift_e));
    }
    Ok(transformed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hamiltonian::builder::build_static_hamiltonian;

    fn z() -> C64 { C64::from(0.0) }

    fn one() -> C64 { C64::from(1.0) }

    #[test]
    fn two_level() {
        let states = vec!["g", "e"];
        let h_int = nd::Array2::from_diag(&nd::array![z(), C64::from(5.0)]);
        let coupling
            = CouplingField::new("g", "e", 1.0)
            .with_field(nd::array![[z(), one()], [one(), z()]]);
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let delta = reg.named("δ");
        let couplings = [coupling];
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &couplings, &[om], &[]).unwrap();
        let Hr = symbolic_hamiltonian_to_rotating_frame(
            &mut reg, &H, &states, &h_int, &couplings, &[delta]).unwrap();

        assert!(Hr.is_time_independent());
        assert!(Hr.entry(0, 0).is_none());
        assert_eq!(Hr.get(0, 1), Expr::term(C64::from(0.5), &[om], Phase::zero()));
        assert_eq!(Hr.get(1, 0), Expr::term(C64::from(0.5), &[om], Phase::zero()));
        assert_eq!(Hr.get(1, 1), Expr::term(-one(), &[delta], Phase::zero()));
    }

    #[test]
    fn lambda_system_reanchors_manifolds() {
        let states = vec!["g0", "g1", "e"];
        let h_int = nd::Array2::from_diag(
            &nd::array![C64::from(1.0), C64::from(2.0), C64::from(10.0)]);
        let c0
            = CouplingField::new("g0", "e", 1.0)
            .with_field(nd::array![
                [z(), z(), one()],
                [z(), z(), z()],
                [one(), z(), z()],
            ]);
        let c1
            = CouplingField::new("g1", "e", 1.0)
            .with_field(nd::array![
                [z(), z(), z()],
                [z(), z(), one()],
                [z(), one(), z()],
            ]);
        let couplings = [c0, c1];
        let mut reg = SymbolRegistry::new();
        let om0 = reg.named("Ω0");
        let om1 = reg.named("Ω1");
        let d0 = reg.named("δ0");
        let d1 = reg.named("δ1");
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &couplings, &[om0, om1], &[]).unwrap();
        let Hr = symbolic_hamiltonian_to_rotating_frame(
            &mut reg, &H, &states, &h_int, &couplings, &[d0, d1]).unwrap();

        assert!(Hr.is_time_independent());
        assert!(Hr.entry(0, 0).is_none());
        assert_eq!(Hr.get(1, 1), &Expr::symbol(d1) - &Expr::symbol(d0));
        assert_eq!(Hr.get(2, 2), -Expr::symbol(d0));
        assert_eq!(Hr.get(0, 2), Expr::term(C64::from(0.5), &[om0], Phase::zero()));
        assert_eq!(Hr.get(1, 2), Expr::term(C64::from(0.5), &[om1], Phase::zero()));

        // every manifold sits at zero on resonance
        for k in 0..3 {
            let resonant = Hr.get(k, k).subs(d0, &Expr::zero()).unwrap()
                .subs(d1, &Expr::zero()).unwrap();
            assert!(resonant.is_zero());
        }
    }

    #[test]
    fn frame_round_trip() {
        let states = vec!["g0", "g1", "e"];
        let h_int = nd::Array2::from_diag(
            &nd::array![C64::from(0.0), C64::from(0.5), C64::from(10.0)]);
        let coupling
            = CouplingField::new("g0", "e", 1.0)
            .with_ground_states(["g0", "g1"])
            .with_field(nd::array![
                [z(), z(), C64::new(0.0, 1.0)],
                [z(), z(), C64::from(0.5)],
                [C64::new(0.0, -1.0), C64::from(0.5), z()],
            ]);
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &[coupling], &[om], &[]).unwrap();
        let pairs = coupled_pairs(&reg, &H).unwrap();
        assert_eq!(pairs.len(), 2);
        let frame = RotatingFrame::solve(&reg, 3, &pairs).unwrap();
        // both grounds couple to `e` at the same frequency; g0 is free
        let w = reg.frequency(0);
        assert_eq!(frame.rates()[0], None);
        assert_eq!(frame.rates()[1], Some(Phase::zero()));
        assert_eq!(frame.rates()[2], Some(Phase::symbol(w).neg()));

        let Hr = frame.apply(&H);
        assert!(Hr.is_time_independent());

        // undo the transform: H = T Hr T^† + i (dT/dt) T^†
        let T = frame.unitary();
        let T_dag = T.adjoint();
        let back
            = &T.matmul(&Hr).matmul(&T_dag)
            + &T.diff_t().matmul(&T_dag).scale(C64::i());
        assert_eq!(back, H);
        for (i, j, e) in H.nonzero() {
            if i != j {
                assert_eq!(Hr.get(i, j), e.at_time_zero());
            }
        }
    }

    #[test]
    fn frequency_count_errors() {
        let mut reg = SymbolRegistry::new();
        let w0 = reg.frequency(0);
        let w1 = reg.frequency(1);
        let x = reg.named("x");

        let mut H = SymMatrix::zeros(2);
        H.set(0, 1, &Expr::oscillation(Phase::symbol(w0))
            + &Expr::oscillation(Phase::symbol(w1)));
        match coupled_pairs(&reg, &H) {
            Err(Error::FrequencyCount { row: 0, col: 1, found }) => {
                assert_eq!(found, vec!["ω0".to_string(), "ω1".to_string()]);
            },
            other => panic!("unexpected result {:?}", other),
        }

        H.set(0, 1, Expr::symbol(x));
        match coupled_pairs(&reg, &H) {
            Err(Error::FrequencyCount { found, .. }) => assert!(found.is_empty()),
            other => panic!("unexpected result {:?}", other),
        }

        // lower-triangular entries are not inspected
        H.set(0, 1, Expr::zero());
        H.set(1, 0, Expr::symbol(x));
        assert!(coupled_pairs(&reg, &H).unwrap().is_empty());
    }

    #[test]
    fn inconsistent_cycle() {
        let mut reg = SymbolRegistry::new();
        let w0 = reg.frequency(0);
        let w1 = reg.frequency(1);
        let w2 = reg.frequency(2);
        let pairs = [(0, 1, w0), (1, 2, w1), (0, 2, w2)];
        assert!(matches!(
            RotatingFrame::solve(&reg, 3, &pairs),
            Err(Error::InconsistentFrame { .. }),
        ));
        // a consistent cycle reusing one frequency is fine
        let pairs = [(0, 2, w0), (1, 2, w0), (0, 3, w0), (1, 3, w0)];
        let frame = RotatingFrame::solve(&reg, 4, &pairs).unwrap();
        assert_eq!(frame.rates()[0], None);
        assert_eq!(frame.rates()[3], Some(Phase::symbol(w0).neg()));
    }

    #[test]
    fn out_of_range_pairs() {
        let mut reg = SymbolRegistry::new();
        let w0 = reg.frequency(0);
        assert!(matches!(
            RotatingFrame::solve(&reg, 2, &[(0, 2, w0)]),
            Err(Error::ShapeMismatch { .. }),
        ));
        assert!(matches!(
            RotatingFrame::solve(&reg, 2, &[(5, 1, w0)]),
            Err(Error::ShapeMismatch { .. }),
        ));
        assert!(RotatingFrame::solve(&reg, 2, &[(0, 1, w0)]).is_ok());
    }

    #[test]
    fn uncoupled_states_are_untouched() {
        let states = vec!["g", "e", "x"];
        let h_int = nd::Array2::from_diag(
            &nd::array![z(), C64::from(3.0), C64::from(7.0)]);
        let coupling
            = CouplingField::new("g", "e", 2.0)
            .with_field(nd::array![
                [z(), one(), z()],
                [one(), z(), z()],
                [z(), z(), z()],
            ]);
        let mut reg = SymbolRegistry::new();
        let om = reg.named("Ω");
        let delta = reg.named("δ");
        let couplings = [coupling];
        let H = build_static_hamiltonian(
            &mut reg, &states, &h_int, &couplings, &[om], &[]).unwrap();
        let Hr = symbolic_hamiltonian_to_rotating_frame(
            &mut reg, &H, &states, &h_int, &couplings, &[delta]).unwrap();
        assert_eq!(Hr.get(2, 2), Expr::constant(7.0));
        assert_eq!(Hr.get(0, 1), Expr::term(C64::from(0.25), &[om], Phase::zero()));

        let err = symbolic_hamiltonian_to_rotating_frame(
            &mut reg, &H, &states, &h_int, &couplings, &[]);
        assert!(matches!(err, Err(Error::LengthMismatch { .. })));
    }
}
