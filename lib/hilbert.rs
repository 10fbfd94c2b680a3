//! Definitions to describe states, bases, and the collaborators that select and
//! compact them.

use std::{ hash::Hash, ops::Deref };
use indexmap::IndexMap;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::{ Error, Result },
    symbolic::SymMatrix,
};

/* States *********************************************************************/

/// A single basis state.
///
/// States are opaque labels: the only thing required of them is equality, so
/// that a state's position in an ordered list can serve as its matrix index.
pub trait BasisState: Clone + Eq + Hash + std::fmt::Debug { }

impl<T> BasisState for T
where T: Clone + Eq + Hash + std::fmt::Debug
{ }

/// Return the index of the first occurrence of `state` in `states`.
pub fn index_of<S>(states: &[S], state: &S) -> Result<usize>
where S: BasisState
{
    states.iter().position(|s| s == state)
        .ok_or_else(|| Error::MissingState { state: format!("{:?}", state) })
}

/// A predicate over states used to pick out a subset of matrix indices, e.g.
/// an excited-state multiplet or a group of near-degenerate levels.
pub trait QuantumSelector<S> {
    /// Return the indices of all states in `states` matched by `self`, in
    /// ascending order.
    fn get_indices(&self, states: &[S]) -> Vec<usize>;
}

impl<S, F> QuantumSelector<S> for F
where F: Fn(&S) -> bool
{
    fn get_indices(&self, states: &[S]) -> Vec<usize> {
        states.iter().enumerate()
            .filter_map(|(k, s)| self(s).then_some(k))
            .collect()
    }
}

/// Selects every occurrence of an explicit set of states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateSet<S>(pub Vec<S>);

impl<S> QuantumSelector<S> for StateSet<S>
where S: BasisState
{
    fn get_indices(&self, states: &[S]) -> Vec<usize> {
        states.iter().enumerate()
            .filter_map(|(k, s)| self.0.contains(s).then_some(k))
            .collect()
    }
}

impl<S> FromIterator<S> for StateSet<S> {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = S>
    {
        Self(iter.into_iter().collect())
    }
}

/// Merges groups of states into single composite states.
///
/// Implementations are supplied by the caller; the orchestrator calls both
/// methods once per selector, threading the progressively reduced state list
/// and Hamiltonian through each call.
pub trait BasisCompaction<S> {
    /// Return the state list with the states at `indices` merged.
    fn compact_states(&self, states: &[S], indices: &[usize]) -> Result<Vec<S>>;

    /// Return the Hamiltonian with the levels at `indices` merged.
    fn compact_hamiltonian(&self, hamiltonian: &SymMatrix, indices: &[usize])
        -> Result<SymMatrix>;
}

/* Bases **********************************************************************/

/// A collection of unique [`BasisState`]s with associated reference energies
/// in units of angular frequency.
///
/// This collection is backed by a single [`IndexMap`], which can be accessed
/// via [`AsRef`] and [`Deref`]. Insertion order gives the matrix index of each
/// state.
#[derive(Clone, Debug, PartialEq)]
pub struct Basis<S>
where S: BasisState
{
    energies: IndexMap<S, C64>,
}

impl<S> AsRef<IndexMap<S, C64>> for Basis<S>
where S: BasisState
{
    fn as_ref(&self) -> &IndexMap<S, C64> { &self.energies }
}

impl<S> Deref for Basis<S>
where S: BasisState
{
    type Target = IndexMap<S, C64>;

    fn deref(&self) -> &Self::Target { &self.energies }
}

impl<S> Basis<S>
where S: BasisState
{
    /// Pair an ordered state list with the diagonal of a reference numeric
    /// Hamiltonian.
    ///
    /// Only the diagonal of `h_int` is read. Fails if `h_int` is not square,
    /// its size differs from the number of states, or a state is repeated.
    pub fn from_hamiltonian(states: &[S], h_int: &nd::Array2<C64>)
        -> Result<Self>
    {
        let (nr, nc) = h_int.dim();
        if nr != nc || nr != states.len() {
            return Err(Error::ShapeMismatch {
                what: "reference hamiltonian",
                expected: vec![states.len(), states.len()],
                found: vec![nr, nc],
            });
        }
        let energies: IndexMap<S, C64>
            = states.iter().cloned()
            .zip(h_int.diag().iter().copied())
            .collect();
        if energies.len() != states.len() {
            return Err(Error::LengthMismatch {
                what: "unique basis states",
                expected: states.len(),
                found: energies.len(),
            });
        }
        Ok(Self { energies })
    }

    /// Get the matrix index of a state.
    pub fn index_of(&self, state: &S) -> Result<usize> {
        self.energies.get_index_of(state)
            .ok_or_else(|| Error::MissingState { state: format!("{:?}", state) })
    }

    /// Get the matrix indices of several states.
    pub fn indices_of<'b, I>(&self, states: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = &'b S>,
        S: 'b,
    {
        states.into_iter().map(|s| self.index_of(s)).collect()
    }

    /// Get the reference energy of a particular basis state by index.
    pub fn get_energy_index(&self, index: usize) -> Option<C64> {
        self.energies.get_index(index).map(|(_, e)| e).copied()
    }

    /// Return the states in index order.
    pub fn states(&self) -> Vec<S> { self.energies.keys().cloned().collect() }
}
