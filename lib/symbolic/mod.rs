//! Minimal symbolic algebra for driven multilevel Hamiltonians.
//!
//! Every expression handled here is a finite sum of terms of the form
//! ```text
//! c * s_1^p_1 * ... * s_m^p_m * exp(i * t * (k_1 * r_1 + ... + k_l * r_l))
//! ```
//! with complex `c`, non-negative integer powers `p`, and integer phase weights
//! `k`. Time `t` only ever enters through such phase factors, which is enough to
//! describe a Hamiltonian driven at symbolic frequencies and to move it into a
//! rotating frame. All symbols are taken to be real-valued.
//!
//! Symbols are handles into a [`SymbolRegistry`], which is passed explicitly
//! through every computation that needs to create or name symbols.

use std::fmt;
use indexmap::IndexMap;

pub mod expr;
pub use expr::{ Expr, Monomial, Phase };

pub mod matrix;
pub use matrix::SymMatrix;

/// Handle to a symbol owned by a [`SymbolRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(usize);

impl Symbol {
    /// Position of the symbol in its registry.
    pub fn id(self) -> usize { self.0 }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a symbol, independent of how it prints.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Free energy of the `k`-th basis state.
    Energy(usize),
    /// Oscillation frequency of the `c`-th coupling.
    Frequency(usize),
    /// Phase rate of the `k`-th basis state in a rotating-frame transform.
    PhaseRate(usize),
    /// A caller-supplied symbol, e.g. a Rabi amplitude, detuning, or
    /// polarization weight.
    Named(String),
    /// Stand-in for the complex conjugate of another symbol.
    Conjugate(Symbol),
}

/// Owns every symbol used in a computation and maps [`SymbolKind`]s to
/// [`Symbol`] handles.
///
/// Asking for the same kind twice returns the same handle, so e.g. the energy
/// symbol of state 3 is shared between the static Hamiltonian and the
/// rotating-frame transform without relying on string names.
#[derive(Clone, Debug, Default)]
pub struct SymbolRegistry {
    symbols: IndexMap<SymbolKind, String>,
}

impl SymbolRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self { Self::default() }

    fn intern(&mut self, kind: SymbolKind, name: impl FnOnce() -> String)
        -> Symbol
    {
        let entry = self.symbols.entry(kind);
        let id = entry.index();
        entry.or_insert_with(name);
        Symbol(id)
    }

    /// Free-energy symbol `E{k}` of the `k`-th basis state.
    pub fn energy(&mut self, k: usize) -> Symbol {
        self.intern(SymbolKind::Energy(k), || format!("E{}", k))
    }

    /// Oscillation-frequency symbol `ω{c}` of the `c`-th coupling.
    pub fn frequency(&mut self, c: usize) -> Symbol {
        self.intern(SymbolKind::Frequency(c), || format!("ω{}", c))
    }

    /// Phase-rate unknown `a{k}` of the `k`-th basis state.
    pub fn phase_rate(&mut self, k: usize) -> Symbol {
        self.intern(SymbolKind::PhaseRate(k), || format!("a{}", k))
    }

    /// Caller-named symbol.
    pub fn named(&mut self, name: &str) -> Symbol {
        self.intern(SymbolKind::Named(name.to_string()), || name.to_string())
    }

    /// Conjugate partner of `sym`, printed as the name of `sym` followed by
    /// `suffix`.
    ///
    /// The suffix only affects printing, and only the first time a given
    /// conjugate is requested.
    pub fn conjugate(&mut self, sym: Symbol, suffix: &str) -> Symbol {
        let base = self.name(sym).to_string();
        self.intern(SymbolKind::Conjugate(sym), || format!("{}{}", base, suffix))
    }

    /// Look up a symbol without creating it.
    pub fn get(&self, kind: &SymbolKind) -> Option<Symbol> {
        self.symbols.get_index_of(kind).map(Symbol)
    }

    /// Kind of a symbol.
    ///
    /// *Panics* if `sym` does not belong to this registry.
    pub fn kind(&self, sym: Symbol) -> &SymbolKind {
        self.symbols.get_index(sym.0)
            .map(|(kind, _)| kind)
            .expect("SymbolRegistry::kind: symbol from another registry")
    }

    /// Printed name of a symbol, or `"?"` if it does not belong to this
    /// registry.
    pub fn name(&self, sym: Symbol) -> &str {
        self.symbols.get_index(sym.0)
            .map(|(_, name)| name.as_str())
            .unwrap_or("?")
    }

    /// Return `true` if `sym` is a coupling oscillation frequency.
    pub fn is_frequency(&self, sym: Symbol) -> bool {
        matches!(
            self.symbols.get_index(sym.0),
            Some((SymbolKind::Frequency(_), _)),
        )
    }

    /// Number of symbols created so far.
    pub fn len(&self) -> usize { self.symbols.len() }

    pub fn is_empty(&self) -> bool { self.symbols.is_empty() }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_is_by_kind() {
        let mut reg = SymbolRegistry::new();
        let e0 = reg.energy(0);
        let w0 = reg.frequency(0);
        assert_eq!(reg.energy(0), e0);
        assert_ne!(e0, w0);
        assert_eq!(reg.name(e0), "E0");
        assert_eq!(reg.name(w0), "ω0");
        assert!(reg.is_frequency(w0));
        assert!(!reg.is_frequency(e0));

        // a caller symbol printing like an internal one is still distinct
        let fake = reg.named("E0");
        assert_ne!(fake, e0);
        assert_eq!(reg.kind(fake), &SymbolKind::Named("E0".to_string()));

        let om = reg.named("Ω");
        let omc = reg.conjugate(om, "ᶜ");
        assert_eq!(reg.name(omc), "Ωᶜ");
        assert_eq!(reg.conjugate(om, "*"), omc);
        assert_eq!(reg.get(&SymbolKind::Conjugate(om)), Some(omc));
        assert_eq!(reg.len(), 5);
    }
}
