//! Descriptions of coherent couplings between manifolds and the symbols that
//! drive them.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::{ Error, Result },
    hilbert::BasisState,
    symbolic::Symbol,
};

/// A single polarization component of a coupling.
///
/// `matrix[[i, j]]` is the complex coupling strength between basis states `i`
/// and `j`. The matrix must satisfy `matrix[[j, i]] == matrix[[i, j]].conj()`;
/// this is checked when the Hamiltonian is built.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub matrix: nd::Array2<C64>,
}

impl Field {
    pub fn new(matrix: nd::Array2<C64>) -> Self { Self { matrix } }

    /// Return `true` if `matrix` is Hermitian to within `tol`.
    pub fn is_hermitian(&self, tol: f64) -> bool {
        self.matrix.is_square()
            && self.matrix.indexed_iter()
                .all(|((i, j), a)| (*a - self.matrix[[j, i]].conj()).norm() <= tol)
    }
}

/// One coherent coupling between a ground manifold and an excited manifold.
#[derive(Clone, Debug, PartialEq)]
pub struct CouplingField<S>
where S: BasisState
{
    /// Reference ground state.
    pub ground_main: S,
    /// Reference excited state.
    pub excited_main: S,
    /// All states of the ground manifold.
    pub ground_states: Vec<S>,
    /// All states of the excited manifold.
    pub excited_states: Vec<S>,
    /// Coupling matrix element between the reference states; Rabi amplitudes
    /// are normalized against it.
    pub main_coupling: C64,
    /// Polarization components.
    pub fields: Vec<Field>,
}

impl<S> CouplingField<S>
where S: BasisState
{
    /// Create a new coupling with single-state manifolds and no fields.
    pub fn new<C>(ground_main: S, excited_main: S, main_coupling: C) -> Self
    where C: Into<C64>
    {
        Self {
            ground_states: vec![ground_main.clone()],
            excited_states: vec![excited_main.clone()],
            ground_main,
            excited_main,
            main_coupling: main_coupling.into(),
            fields: Vec::new(),
        }
    }

    /// Set the ground manifold.
    pub fn with_ground_states<I>(mut self, states: I) -> Self
    where I: IntoIterator<Item = S>
    {
        self.ground_states = states.into_iter().collect();
        self
    }

    /// Set the excited manifold.
    pub fn with_excited_states<I>(mut self, states: I) -> Self
    where I: IntoIterator<Item = S>
    {
        self.excited_states = states.into_iter().collect();
        self
    }

    /// Append a polarization component.
    pub fn with_field(mut self, matrix: nd::Array2<C64>) -> Self {
        self.fields.push(Field::new(matrix));
        self
    }
}

/// Symbols attached to a single coupling: its Rabi amplitude, detuning, and
/// optional per-field polarization weights.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Rabi amplitude Ω.
    pub rabi: Symbol,
    /// Detuning δ.
    pub detuning: Symbol,
    /// Polarization weight for each field of the matching coupling, in order.
    /// Empty if the fields carry no extra weighting.
    pub polarizations: Vec<Symbol>,
}

impl Transition {
    pub fn new(rabi: Symbol, detuning: Symbol) -> Self {
        Self { rabi, detuning, polarizations: Vec::new() }
    }

    pub fn with_polarizations<I>(mut self, polarizations: I) -> Self
    where I: IntoIterator<Item = Symbol>
    {
        self.polarizations = polarizations.into_iter().collect();
        self
    }

    /// Polarization symbols, or `None` if there are none.
    pub fn polarization_symbols(&self) -> Option<&[Symbol]> {
        (!self.polarizations.is_empty()).then_some(self.polarizations.as_slice())
    }
}

/// Check that couplings and their per-coupling data line up one-to-one.
pub(crate) fn check_paired<S, T>(couplings: &[CouplingField<S>], other: &[T])
    -> Result<()>
where S: BasisState
{
    if couplings.len() != other.len() {
        return Err(Error::LengthMismatch {
            what: "couplings and transitions",
            expected: couplings.len(),
            found: other.len(),
        });
    }
    Ok(())
}
