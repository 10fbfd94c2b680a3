//! Construction of symbolic rotating-frame Hamiltonians for driven multilevel
//! systems.
//!
//! A Hamiltonian is built in two stages: [`builder`] assembles the static-frame
//! matrix, with each coupling oscillating at its own symbolic frequency, and
//! [`rotating`] moves it into the frame where every drive is stationary. The
//! functions here tie the two together and optionally compact the result.

use log::{ debug, info };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    config::ExtensionConfig,
    couplings::{ CouplingField, Transition, check_paired },
    error::Result,
    hilbert::{ BasisCompaction, BasisState, QuantumSelector },
    symbolic::{ Expr, Symbol, SymbolRegistry, SymMatrix },
};

pub mod builder;
pub mod rotating;

pub use builder::{ HBuilderSymbolic, build_static_hamiltonian };
pub use rotating::{
    RotatingFrame,
    coupled_pairs,
    symbolic_hamiltonian_to_rotating_frame,
};

/// Replace the Rabi symbols in the strictly lower triangle of `H` by their
/// conjugate partners.
pub fn relabel_conjugates(
    registry: &mut SymbolRegistry,
    H: &SymMatrix,
    rabis: &[Symbol],
    suffix: &str,
) -> Result<SymMatrix>
{
    let rules: Vec<(Symbol, Expr)>
        = rabis.iter()
        .map(|om| (*om, Expr::symbol(registry.conjugate(*om, suffix))))
        .collect();
    H.try_map(|i, j, e| if i > j { e.subs_all(&rules) } else { Ok(e.clone()) })
}

/// Build the rotating-frame symbolic Hamiltonian of `states` driven by
/// `couplings`, using the default [`ExtensionConfig`].
///
/// See [`generate_symbolic_hamiltonian_with`].
pub fn generate_symbolic_hamiltonian<S>(
    registry: &mut SymbolRegistry,
    states: &[S],
    h_int: &nd::Array2<C64>,
    couplings: &[CouplingField<S>],
    rabis: &[Symbol],
    detunings: &[Symbol],
    polarizations: &[Option<Vec<Symbol>>],
) -> Result<SymMatrix>
where S: BasisState
{
    generate_symbolic_hamiltonian_with(
        registry,
        states,
        h_int,
        couplings,
        rabis,
        detunings,
        polarizations,
        &ExtensionConfig::default(),
    )
}

/// Build the rotating-frame symbolic Hamiltonian of `states` driven by
/// `couplings`.
///
/// The `c`-th coupling is driven with Rabi amplitude `rabis[c]` at detuning
/// `detunings[c]`. The result is Hermitian in the sense that every
/// lower-triangular Rabi symbol `Ω` is replaced by its conjugate partner,
/// printed with `config.conjugate_suffix` appended.
#[allow(clippy::too_many_arguments)]
pub fn generate_symbolic_hamiltonian_with<S>(
    registry: &mut SymbolRegistry,
    states: &[S],
    h_int: &nd::Array2<C64>,
    couplings: &[CouplingField<S>],
    rabis: &[Symbol],
    detunings: &[Symbol],
    polarizations: &[Option<Vec<Symbol>>],
    config: &ExtensionConfig,
) -> Result<SymMatrix>
where S: BasisState
{
    check_paired(couplings, detunings)?;
    let H = build_static_hamiltonian(
        registry, states, h_int, couplings, rabis, polarizations)?;
    let H = symbolic_hamiltonian_to_rotating_frame(
        registry, &H, states, h_int, couplings, detunings)?;
    relabel_conjugates(registry, &H, rabis, &config.conjugate_suffix)
}

/// A caller-supplied strategy to merge groups of states after a Hamiltonian
/// has been built.
///
/// Each selector is applied in order to the current (already partially
/// compacted) state list, and the matched indices are handed to `compactor`.
pub struct Compaction<'c, S> {
    pub compactor: &'c dyn BasisCompaction<S>,
    pub selectors: Vec<&'c dyn QuantumSelector<S>>,
}

impl<'c, S> Compaction<'c, S> {
    pub fn new(compactor: &'c dyn BasisCompaction<S>) -> Self {
        Self { compactor, selectors: Vec::new() }
    }

    pub fn with_selector(mut self, selector: &'c dyn QuantumSelector<S>)
        -> Self
    {
        self.selectors.push(selector);
        self
    }

    /// Apply every selector in order, returning the compacted state list and
    /// Hamiltonian.
    pub fn apply(&self, states: &[S], H: SymMatrix)
        -> Result<(Vec<S>, SymMatrix)>
    where S: Clone
    {
        let mut states_c: Vec<S> = states.to_vec();
        let mut H_c = H;
        for selector in self.selectors.iter() {
            let indices = selector.get_indices(&states_c);
            debug!("compacting {} levels", indices.len());
            H_c = self.compactor.compact_hamiltonian(&H_c, &indices)?;
            states_c = self.compactor.compact_states(&states_c, &indices)?;
        }
        Ok((states_c, H_c))
    }
}

impl<'c, S> std::fmt::Debug for Compaction<'c, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Compaction {{ selectors: {} }}", self.selectors.len())
    }
}

/// Output of [`generate_total_symbolic_hamiltonian`].
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolicHamiltonian<S> {
    /// Rotating-frame Hamiltonian.
    pub hamiltonian: SymMatrix,
    /// Compacted state list, if a [`Compaction`] was applied.
    pub states: Option<Vec<S>>,
}

/// Build the rotating-frame symbolic Hamiltonian for a full set of
/// [`Transition`]s, optionally compacting the result, using the default
/// [`ExtensionConfig`].
pub fn generate_total_symbolic_hamiltonian<S>(
    registry: &mut SymbolRegistry,
    states: &[S],
    h_int: &nd::Array2<C64>,
    couplings: &[CouplingField<S>],
    transitions: &[Transition],
    compaction: Option<&Compaction<S>>,
) -> Result<SymbolicHamiltonian<S>>
where S: BasisState
{
    generate_total_symbolic_hamiltonian_with(
        registry,
        states,
        h_int,
        couplings,
        transitions,
        compaction,
        &ExtensionConfig::default(),
    )
}

/// Build the rotating-frame symbolic Hamiltonian for a full set of
/// [`Transition`]s, optionally compacting the result.
///
/// `transitions[c]` supplies the symbols of `couplings[c]`. If `compaction` is
/// given, the returned [`SymbolicHamiltonian`] carries the compacted state
/// list alongside the compacted matrix.
pub fn generate_total_symbolic_hamiltonian_with<S>(
    registry: &mut SymbolRegistry,
    states: &[S],
    h_int: &nd::Array2<C64>,
    couplings: &[CouplingField<S>],
    transitions: &[Transition],
    compaction: Option<&Compaction<S>>,
    config: &ExtensionConfig,
) -> Result<SymbolicHamiltonian<S>>
where S: BasisState
{
    check_paired(couplings, transitions)?;
    let rabis: Vec<Symbol> = transitions.iter().map(|tr| tr.rabi).collect();
    let detunings: Vec<Symbol>
        = transitions.iter().map(|tr| tr.detuning).collect();
    let polarizations: Vec<Option<Vec<Symbol>>>
        = transitions.iter()
        .map(|tr| tr.polarization_symbols().map(|p| p.to_vec()))
        .collect();
    let H = generate_symbolic_hamiltonian_with(
        registry,
        states,
        h_int,
        couplings,
        &rabis,
        &detunings,
        &polarizations,
        config,
    )?;
    info!(
        "generated {}-level rotating-frame hamiltonian for {} transitions",
        H.dim(), transitions.len(),
    );

    match compaction {
        Some(comp) => {
            let (states_c, H_c) = comp.apply(states, H)?;
            Ok(SymbolicHamiltonian { hamiltonian: H_c, states: Some(states_c) })
        },
        None => Ok(SymbolicHamiltonian { hamiltonian: H, states: None }),
    }
}
