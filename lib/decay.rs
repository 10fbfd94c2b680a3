//! Extension of a system with additional decay channels.
//!
//! Each [`DecayChannel`] adds one sink level to the basis. The level is
//! uncoupled in the Hamiltonian and only receives population through the
//! decay amplitude tensor, whose existing branching ratios are renormalized so
//! that the total decay out of every excited level still sums to 1.
//!
//! Amplitude tensors are indexed as `[source, ground, excited]`, with one
//! source slice per collapse operator.

use std::{ collections::BTreeMap, fmt, rc::Rc };
use itertools::{ Itertools, izip };
use log::{ debug, trace, warn };
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    config::ExtensionConfig,
    error::{ Error, Result },
    hilbert::{ BasisState, QuantumSelector },
    symbolic::SymMatrix,
};

/// A new dissipative pathway from a set of existing excited levels into a new
/// ground level.
#[derive(Clone)]
pub struct DecayChannel<'a, S> {
    /// State label of the new level.
    pub ground: S,
    /// Picks out the excited levels that decay into `ground`.
    pub excited: Rc<dyn QuantumSelector<S> + 'a>,
    /// Fraction of each selected level's total decay that goes to `ground`.
    pub branching: f64,
    pub description: String,
}

impl<'a, S> fmt::Debug for DecayChannel<'a, S>
where S: fmt::Debug
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecayChannel {{ ground: {:?}, excited: ..., branching: {}, description: {:?} }}",
            self.ground, self.branching, self.description,
        )
    }
}

impl<'a, S> DecayChannel<'a, S> {
    /// Create a new `DecayChannel` with an empty description.
    pub fn new<Q>(ground: S, excited: Q, branching: f64) -> Self
    where Q: QuantumSelector<S> + 'a
    {
        Self {
            ground,
            excited: Rc::new(excited),
            branching,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Compute the insertion index of each channel's new level.
///
/// New levels go contiguously between the ground block and the excited block,
/// so the `k`-th channel lands at `states.len() - excited_states.len() + k`.
pub fn get_insert_level_indices<S>(
    decay_channels: &[DecayChannel<'_, S>],
    states: &[S],
    excited_states: &[S],
) -> Result<Vec<usize>>
{
    let Some(first) = states.len().checked_sub(excited_states.len()) else {
        return Err(Error::LengthMismatch {
            what: "excited states within the state list",
            expected: states.len(),
            found: excited_states.len(),
        });
    };
    Ok((0..decay_channels.len()).map(|k| first + k).collect())
}

/// Insert a single all-zero level into `hamiltonian` at `idx`.
pub fn add_level_symbolic_hamiltonian(hamiltonian: &SymMatrix, idx: usize)
    -> Result<SymMatrix>
{
    if idx > hamiltonian.dim() {
        return Err(Error::ShapeMismatch {
            what: "level insertion index",
            expected: vec![hamiltonian.dim()],
            found: vec![idx],
        });
    }
    let mut acc = hamiltonian.clone();
    acc.insert_level(idx);
    Ok(acc)
}

/// Insert one all-zero level into `hamiltonian` per decay channel, returning
/// the insertion indices alongside the extended matrix.
pub fn add_levels_symbolic_hamiltonian<S>(
    hamiltonian: &SymMatrix,
    decay_channels: &[DecayChannel<'_, S>],
    states: &[S],
    excited_states: &[S],
) -> Result<(Vec<usize>, SymMatrix)>
{
    hamiltonian.check_dim("hamiltonian", states.len())?;
    let indices
        = get_insert_level_indices(decay_channels, states, excited_states)?;
    let extended
        = indices.iter()
        .try_fold(hamiltonian.clone(), |acc, idx| {
            add_level_symbolic_hamiltonian(&acc, *idx)
        })?;
    debug!(
        "inserted {} decay levels at {:?}; hamiltonian is now {}x{}",
        indices.len(), indices, extended.dim(), extended.dim(),
    );
    Ok((indices, extended))
}

/// Insert each channel's ground state into `states` at its insertion index, in
/// channel order.
pub fn add_states_qn<S>(
    decay_channels: &[DecayChannel<'_, S>],
    states: &[S],
    indices: &[usize],
) -> Result<Vec<S>>
where S: Clone
{
    check_indices(decay_channels, indices)?;
    let mut acc: Vec<S> = states.to_vec();
    for (idx, channel) in indices.iter().zip(decay_channels) {
        if *idx > acc.len() {
            return Err(Error::ShapeMismatch {
                what: "state insertion index",
                expected: vec![acc.len()],
                found: vec![*idx],
            });
        }
        acc.insert(*idx, channel.ground.clone());
    }
    Ok(acc)
}

fn check_indices<S>(decay_channels: &[DecayChannel<'_, S>], indices: &[usize])
    -> Result<()>
{
    if decay_channels.len() != indices.len() {
        return Err(Error::LengthMismatch {
            what: "decay channels and insertion indices",
            expected: decay_channels.len(),
            found: indices.len(),
        });
    }
    Ok(())
}

fn insert_zero_level<A>(arr: &nd::Array3<A>, idx: usize)
    -> Result<nd::Array3<A>>
where A: Clone + Zero
{
    let (s, n, m) = arr.dim();
    if idx > n || idx > m {
        return Err(Error::ShapeMismatch {
            what: "amplitude tensor insertion index",
            expected: vec![n.min(m)],
            found: vec![idx],
        });
    }
    let shift = |k: usize| if k < idx { k } else { k + 1 };
    let mut acc: nd::Array3<A> = nd::Array3::zeros((s, n + 1, m + 1));
    arr.indexed_iter()
        .for_each(|((a, i, j), x)| { acc[[a, shift(i), shift(j)]] = x.clone(); });
    Ok(acc)
}

/// Insert all-zero ground and excited levels into an amplitude (or branching
/// ratio) tensor at each of `indices` in turn.
pub fn add_levels_c_array<A>(c_array: &nd::Array3<A>, indices: &[usize])
    -> Result<nd::Array3<A>>
where A: Clone + Zero
{
    indices.iter()
        .try_fold(c_array.clone(), |acc, idx| insert_zero_level(&acc, *idx))
}

/// Convert an amplitude tensor to branching ratios, `|C|^2 / Γ`.
pub fn branching_ratios(c_array: &nd::Array3<C64>, gamma: f64)
    -> Result<nd::Array3<f64>>
{
    check_gamma(gamma)?;
    Ok(c_array.mapv(|c| c.norm_sqr() / gamma))
}

/// Total branching out of each excited level, summed over all sources and
/// ground levels.
pub fn excited_branching_totals(br: &nd::Array3<f64>) -> nd::Array1<f64> {
    br.sum_axis(nd::Axis(0)).sum_axis(nd::Axis(0))
}

fn check_gamma(gamma: f64) -> Result<()> {
    (gamma.is_finite() && gamma > 0.0).then_some(())
        .ok_or(Error::InvalidDecayRate { gamma })
}

/// Extend an amplitude tensor with new decay channels, using the default
/// [`ExtensionConfig`].
///
/// See [`add_decays_c_arrays_with`].
pub fn add_decays_c_arrays<S>(
    decay_channels: &[DecayChannel<'_, S>],
    indices: &[usize],
    states: &[S],
    c_array: &nd::Array3<C64>,
    gamma: f64,
) -> Result<nd::Array3<C64>>
where S: BasisState
{
    add_decays_c_arrays_with(
        decay_channels,
        indices,
        states,
        c_array,
        gamma,
        &ExtensionConfig::default(),
    )
}

/// Extend an amplitude tensor with new decay channels.
///
/// `indices` are the insertion indices of the new levels and `states` is the
/// *extended* state list (see [`add_states_qn`]), against which the channels'
/// excited selectors are evaluated. The existing branching ratios of every
/// targeted excited level are scaled by `1 - b` where `b` is the total
/// branching of all channels targeting it, and one new source slice is
/// appended for each (channel, excited level) pair. The result is
/// `sqrt(BR * Γ)`.
pub fn add_decays_c_arrays_with<S>(
    decay_channels: &[DecayChannel<'_, S>],
    indices: &[usize],
    states: &[S],
    c_array: &nd::Array3<C64>,
    gamma: f64,
    config: &ExtensionConfig,
) -> Result<nd::Array3<C64>>
where S: BasisState
{
    check_indices(decay_channels, indices)?;
    check_gamma(gamma)?;
    for (k, channel) in decay_channels.iter().enumerate() {
        if !(channel.branching > 0.0 && channel.branching <= 1.0) {
            return Err(Error::InvalidBranching {
                channel: k,
                branching: channel.branching,
            });
        }
    }

    let mut br = add_levels_c_array(&branching_ratios(c_array, gamma)?, indices)?;
    let (_, n, m) = br.dim();
    if n != states.len() || m != states.len() {
        return Err(Error::ShapeMismatch {
            what: "extended amplitude tensor",
            expected: vec![br.dim().0, states.len(), states.len()],
            found: vec![br.dim().0, n, m],
        });
    }

    let mut indices_excited: Vec<Vec<usize>>
        = Vec::with_capacity(decay_channels.len());
    for (k, channel) in decay_channels.iter().enumerate() {
        let ides = channel.excited.get_indices(states);
        if ides.is_empty() {
            if config.allow_unmatched_selectors {
                warn!("decay channel {} ({:?}) matches no states", k, channel.ground);
            } else {
                return Err(Error::UnmatchedSelector { channel: k });
            }
        }
        indices_excited.push(ides);
    }

    // total added branching per excited level
    let mut added: BTreeMap<usize, f64> = BTreeMap::new();
    for (ides, channel) in indices_excited.iter().zip(decay_channels) {
        ides.iter()
            .for_each(|ide| { *added.entry(*ide).or_insert(0.0) += channel.branching; });
    }
    for (ide, total) in added.iter() {
        if *total > 1.0 + config.branching_tolerance {
            return Err(Error::BranchingOverflow { excited: *ide, total: *total });
        }
        let remainder = (1.0 - total).max(0.0);
        trace!("scaling existing decays of level {} by {}", ide, remainder);
        br.slice_mut(nd::s![.., .., *ide]).mapv_inplace(|x| x * remainder);
    }

    let new_slices: Vec<nd::Array2<f64>>
        = izip!(indices, &indices_excited, decay_channels)
        .flat_map(|(idg, ides, channel)| {
            ides.iter()
                .map(move |ide| {
                    let mut slice = nd::Array2::zeros((n, m));
                    slice[[*idg, *ide]] = channel.branching;
                    slice
                })
        })
        .collect();
    debug!(
        "adding {} decay source slices for {} channels (excited levels: {})",
        new_slices.len(),
        decay_channels.len(),
        added.keys().join(", "),
    );
    for slice in new_slices.iter() {
        br.push(nd::Axis(0), slice.view())
            .map_err(|_| Error::ShapeMismatch {
                what: "decay source slice",
                expected: vec![n, m],
                found: slice.shape().to_vec(),
            })?;
    }

    Ok(br.mapv(|x| C64::from((x * gamma).sqrt())))
}
