//! Canonical sums of monomials times oscillating phase factors.

use std::{
    collections::{ BTreeMap, BTreeSet },
    fmt,
    ops::{ Add, AddAssign, Mul, Neg, Sub, SubAssign },
};
use itertools::Itertools;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use rustc_hash::FxHashMap as HashMap;
use crate::{
    error::{ Error, Result },
    symbolic::{ Symbol, SymbolRegistry },
};

/// Product of symbols raised to positive integer powers.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Monomial(BTreeMap<Symbol, u32>);

impl Monomial {
    /// The empty product.
    pub fn one() -> Self { Self::default() }

    /// A single symbol to the first power.
    pub fn symbol(sym: Symbol) -> Self { Self([(sym, 1)].into_iter().collect()) }

    pub fn is_one(&self) -> bool { self.0.is_empty() }

    /// Power of `sym` in `self`; zero if absent.
    pub fn power(&self, sym: Symbol) -> u32 {
        self.0.get(&sym).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, u32)> + '_ {
        self.0.iter().map(|(s, p)| (*s, *p))
    }

    fn mul(&self, rhs: &Self) -> Self {
        let mut acc = self.0.clone();
        rhs.0.iter()
            .for_each(|(s, p)| { *acc.entry(*s).or_insert(0) += *p; });
        Self(acc)
    }

    /// Remove `sym`, returning its former power.
    fn take(&mut self, sym: Symbol) -> u32 { self.0.remove(&sym).unwrap_or(0) }
}

/// Integer linear combination of symbols, appearing as the rate of a phase
/// factor `exp(i * t * (k_1 * r_1 + ...))`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Phase(BTreeMap<Symbol, i64>);

impl Phase {
    /// The zero rate, i.e. no time dependence.
    pub fn zero() -> Self { Self::default() }

    /// The rate `sym`.
    pub fn symbol(sym: Symbol) -> Self { Self::zero().with(sym, 1) }

    /// Add `k * sym` to `self`.
    pub fn with(mut self, sym: Symbol, k: i64) -> Self {
        self.add_term(sym, k);
        self
    }

    fn add_term(&mut self, sym: Symbol, k: i64) {
        if k == 0 { return; }
        let w = self.0.entry(sym).or_insert(0);
        *w += k;
        if *w == 0 { self.0.remove(&sym); }
    }

    pub fn is_zero(&self) -> bool { self.0.is_empty() }

    /// Weight of `sym` in `self`; zero if absent.
    pub fn weight(&self, sym: Symbol) -> i64 {
        self.0.get(&sym).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, i64)> + '_ {
        self.0.iter().map(|(s, k)| (*s, *k))
    }

    /// Return `self + k * rhs`.
    pub fn add_scaled(&self, rhs: &Self, k: i64) -> Self {
        let mut acc = self.clone();
        rhs.0.iter().for_each(|(s, w)| acc.add_term(*s, k * *w));
        acc
    }

    pub fn neg(&self) -> Self { Self::zero().add_scaled(self, -1) }

    /// Convert to a time-independent expression `k_1 * r_1 + ...`.
    pub fn to_expr(&self) -> Expr {
        let mut acc = Expr::zero();
        for (s, k) in self.0.iter() {
            acc.push(Monomial::symbol(*s), Phase::zero(), C64::from(*k as f64));
        }
        acc
    }

    /// Attempt to read an expression as an integer linear combination of
    /// symbols with no constant or time-dependent part.
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        let mut acc = Self::zero();
        for ((mono, phase), c) in expr.terms.iter() {
            if !phase.is_zero() || c.im != 0.0 || c.re.fract() != 0.0 {
                return None;
            }
            let (sym, p) = mono.iter().exactly_one().ok()?;
            if p != 1 { return None; }
            acc.add_term(sym, c.re as i64);
        }
        Some(acc)
    }
}

/// A symbolic expression in canonical form.
///
/// Terms are keyed by their monomial and phase, so like terms are merged as
/// they are added and terms whose coefficient becomes exactly zero are
/// dropped. Two expressions are equal if and only if they have identical term
/// maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expr {
    terms: BTreeMap<(Monomial, Phase), C64>,
}

impl Expr {
    /// The zero expression.
    pub fn zero() -> Self { Self::default() }

    /// A numeric constant.
    pub fn constant<T>(c: T) -> Self
    where T: Into<C64>
    {
        let mut acc = Self::zero();
        acc.push(Monomial::one(), Phase::zero(), c.into());
        acc
    }

    /// A single symbol.
    pub fn symbol(sym: Symbol) -> Self {
        Self::term(C64::one(), &[sym], Phase::zero())
    }

    /// The phase factor `exp(i * t * phase)`.
    pub fn oscillation(phase: Phase) -> Self {
        let mut acc = Self::zero();
        acc.push(Monomial::one(), phase, C64::one());
        acc
    }

    /// A single term `c * syms[0] * syms[1] * ... * exp(i * t * phase)`.
    pub fn term(c: C64, syms: &[Symbol], phase: Phase) -> Self {
        let mono
            = syms.iter()
            .fold(Monomial::one(), |acc, s| acc.mul(&Monomial::symbol(*s)));
        let mut acc = Self::zero();
        acc.push(mono, phase, c);
        acc
    }

    fn push(&mut self, mono: Monomial, phase: Phase, c: C64) {
        if c.is_zero() { return; }
        let key = (mono, phase);
        let coeff = self.terms.entry(key.clone()).or_insert_with(C64::zero);
        *coeff += c;
        if coeff.is_zero() { self.terms.remove(&key); }
    }

    pub fn is_zero(&self) -> bool { self.terms.is_empty() }

    /// Number of terms.
    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    /// Iterate over `(coefficient, monomial, phase)` triples.
    pub fn terms(&self) -> impl Iterator<Item = (C64, &Monomial, &Phase)> {
        self.terms.iter().map(|((m, p), c)| (*c, m, p))
    }

    /// Multiply every coefficient by `c`.
    pub fn scale(&self, c: C64) -> Self {
        let mut acc = Self::zero();
        for ((m, p), ck) in self.terms.iter() {
            acc.push(m.clone(), p.clone(), *ck * c);
        }
        acc
    }

    /// Complex conjugate, treating every symbol as real.
    pub fn conj(&self) -> Self {
        let mut acc = Self::zero();
        for ((m, p), c) in self.terms.iter() {
            acc.push(m.clone(), p.neg(), c.conj());
        }
        acc
    }

    /// Derivative with respect to time.
    pub fn diff_t(&self) -> Self {
        let mut acc = Self::zero();
        for ((m, p), c) in self.terms.iter() {
            if p.is_zero() { continue; }
            let rate = p.to_expr();
            let base = Self::zero().with_term(m.clone(), p.clone(), *c * C64::i());
            acc += &(&base * &rate);
        }
        acc
    }

    fn with_term(mut self, mono: Monomial, phase: Phase, c: C64) -> Self {
        self.push(mono, phase, c);
        self
    }

    /// All symbols appearing anywhere in `self`.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.terms.keys()
            .flat_map(|(m, p)| {
                m.iter().map(|(s, _)| s).chain(p.iter().map(|(s, _)| s))
            })
            .collect()
    }

    /// Return `true` if `self` contains no phase factors.
    pub fn is_time_independent(&self) -> bool {
        self.terms.keys().all(|(_, p)| p.is_zero())
    }

    /// Numeric value left after setting every symbol to zero.
    ///
    /// Phase factors reduce to 1, so this is the sum of the coefficients of
    /// all terms with an empty monomial.
    pub fn residual(&self) -> C64 {
        self.terms.iter()
            .filter(|((m, _), _)| m.is_one())
            .map(|(_, c)| *c)
            .sum()
    }

    /// Evaluate at `t = 0`, replacing every phase factor by 1.
    pub fn at_time_zero(&self) -> Self {
        let mut acc = Self::zero();
        for ((m, _), c) in self.terms.iter() {
            acc.push(m.clone(), Phase::zero(), *c);
        }
        acc
    }

    /// Replace every occurrence of `sym` with `value`.
    ///
    /// If `sym` appears in a phase factor, `value` must be an integer linear
    /// combination of symbols.
    pub fn subs(&self, sym: Symbol, value: &Expr) -> Result<Self> {
        let in_phase = self.terms.keys().any(|(_, p)| p.weight(sym) != 0);
        let phase_value: Option<Phase>
            = if in_phase {
                Some(
                    Phase::from_expr(value)
                    .ok_or_else(|| Error::NonIntegerPhase {
                        symbol: sym.to_string(),
                    })?
                )
            } else {
                None
            };
        let mut acc = Self::zero();
        for ((m, p), c) in self.terms.iter() {
            let mut mono = m.clone();
            let power = mono.take(sym);
            let weight = p.weight(sym);
            let phase
                = match &phase_value {
                    Some(repl) if weight != 0 => {
                        p.add_scaled(&Phase::symbol(sym), -weight)
                            .add_scaled(repl, weight)
                    },
                    _ => p.clone(),
                };
            let mut term = Self::zero().with_term(mono, phase, *c);
            for _ in 0..power { term = &term * value; }
            acc += &term;
        }
        Ok(acc)
    }

    /// Apply several substitutions in order.
    pub fn subs_all<'b, I>(&self, rules: I) -> Result<Self>
    where I: IntoIterator<Item = &'b (Symbol, Expr)>
    {
        rules.into_iter()
            .try_fold(self.clone(), |acc, (sym, value)| acc.subs(*sym, value))
    }

    /// Numerically evaluate at time `t`, given values for every symbol.
    ///
    /// Symbols inside phase factors should be given real values.
    pub fn evaluate(&self, values: &HashMap<Symbol, C64>, t: f64)
        -> Result<C64>
    {
        let lookup = |s: Symbol| -> Result<C64> {
            values.get(&s).copied()
                .ok_or_else(|| Error::UnboundSymbol { symbol: s.to_string() })
        };
        let mut acc = C64::zero();
        for ((m, p), c) in self.terms.iter() {
            let mut term = *c;
            for (s, power) in m.iter() {
                term *= lookup(s)?.powu(power);
            }
            let mut rate = C64::zero();
            for (s, k) in p.iter() {
                rate += lookup(s)? * k as f64;
            }
            acc += term * (C64::i() * rate * t).exp();
        }
        Ok(acc)
    }

    /// Display `self` using the symbol names held by `registry`.
    pub fn display<'a>(&'a self, registry: &'a SymbolRegistry)
        -> ExprDisplay<'a>
    {
        ExprDisplay { expr: self, registry }
    }
}

impl From<Symbol> for Expr {
    fn from(sym: Symbol) -> Self { Self::symbol(sym) }
}

impl From<f64> for Expr {
    fn from(c: f64) -> Self { Self::constant(c) }
}

impl From<C64> for Expr {
    fn from(c: C64) -> Self { Self::constant(c) }
}

impl<'b> AddAssign<&'b Expr> for Expr {
    fn add_assign(&mut self, rhs: &'b Expr) {
        for ((m, p), c) in rhs.terms.iter() {
            self.push(m.clone(), p.clone(), *c);
        }
    }
}

impl<'b> SubAssign<&'b Expr> for Expr {
    fn sub_assign(&mut self, rhs: &'b Expr) {
        for ((m, p), c) in rhs.terms.iter() {
            self.push(m.clone(), p.clone(), -*c);
        }
    }
}

impl<'a, 'b> Add<&'b Expr> for &'a Expr {
    type Output = Expr;

    fn add(self, rhs: &'b Expr) -> Expr {
        let mut acc = self.clone();
        acc += rhs;
        acc
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(mut self, rhs: Expr) -> Expr {
        self += &rhs;
        self
    }
}

impl<'a, 'b> Sub<&'b Expr> for &'a Expr {
    type Output = Expr;

    fn sub(self, rhs: &'b Expr) -> Expr {
        let mut acc = self.clone();
        acc -= rhs;
        acc
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(mut self, rhs: Expr) -> Expr {
        self -= &rhs;
        self
    }
}

impl<'a> Neg for &'a Expr {
    type Output = Expr;

    fn neg(self) -> Expr { self.scale(-C64::one()) }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr { self.scale(-C64::one()) }
}

impl<'a, 'b> Mul<&'b Expr> for &'a Expr {
    type Output = Expr;

    fn mul(self, rhs: &'b Expr) -> Expr {
        let mut acc = Expr::zero();
        let iter = self.terms.iter().cartesian_product(rhs.terms.iter());
        for (((m1, p1), c1), ((m2, p2), c2)) in iter {
            acc.push(m1.mul(m2), p1.add_scaled(p2, 1), *c1 * *c2);
        }
        acc
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr { &self * &rhs }
}

impl Mul<C64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: C64) -> Expr { self.scale(rhs) }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr { self.scale(C64::from(rhs)) }
}

/// Helper returned by [`Expr::display`].
pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    registry: &'a SymbolRegistry,
}

fn fmt_coeff(c: C64) -> String {
    if c.im == 0.0 {
        format!("{}", c.re)
    } else if c.re == 0.0 {
        format!("{}i", c.im)
    } else {
        format!("({}{:+}i)", c.re, c.im)
    }
}

impl<'a> fmt::Display for ExprDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expr.is_zero() { return write!(f, "0"); }
        let reg = self.registry;
        let terms: Vec<String>
            = self.expr.terms.iter()
            .map(|((m, p), c)| {
                let mut factors: Vec<String> = Vec::new();
                if !c.is_one() || (m.is_one() && p.is_zero()) {
                    factors.push(fmt_coeff(*c));
                }
                factors.extend(
                    m.iter().map(|(s, pow)| {
                        if pow == 1 {
                            reg.name(s).to_string()
                        } else {
                            format!("{}^{}", reg.name(s), pow)
                        }
                    })
                );
                if !p.is_zero() {
                    let rate
                        = p.iter()
                        .map(|(s, k)| match k {
                            1 => reg.name(s).to_string(),
                            -1 => format!("-{}", reg.name(s)),
                            _ => format!("{}{}", k, reg.name(s)),
                        })
                        .join(" + ");
                    factors.push(format!("exp(i·t·({}))", rate));
                }
                factors.join("·")
            })
            .collect();
        write!(f, "{}", terms.join(" + "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn setup() -> (SymbolRegistry, Symbol, Symbol, Symbol) {
        let mut reg = SymbolRegistry::new();
        let x = reg.named("x");
        let y = reg.named("y");
        let w = reg.frequency(0);
        (reg, x, y, w)
    }

    #[test]
    fn like_terms_merge() {
        let (_, x, y, _) = setup();
        let ex = Expr::symbol(x);
        let ey = Expr::symbol(y);
        let sum = &(&ex + &ey) - &ex;
        assert_eq!(sum, ey);
        assert!((&ex - &ex).is_zero());
        let twice = &ex + &ex;
        assert_eq!(twice, Expr::symbol(x).scale(C64::from(2.0)));
    }

    #[test]
    fn phases_multiply_and_cancel() {
        let (_, x, _, w) = setup();
        let up = Expr::term(C64::from(0.5), &[x], Phase::symbol(w));
        let dn = Expr::oscillation(Phase::symbol(w).neg());
        let prod = &up * &dn;
        assert!(prod.is_time_independent());
        assert_eq!(prod, Expr::term(C64::from(0.5), &[x], Phase::zero()));
        assert_eq!(up.conj(), Expr::term(C64::from(0.5), &[x], Phase::symbol(w).neg()));
    }

    #[test]
    fn time_derivative() {
        let (_, x, _, w) = setup();
        // d/dt [x exp(i w t)] = i x w exp(i w t)
        let e = Expr::term(C64::one(), &[x], Phase::symbol(w));
        let de = e.diff_t();
        assert_eq!(de, Expr::term(C64::i(), &[x, w], Phase::symbol(w)));
        assert!(Expr::symbol(x).diff_t().is_zero());
    }

    #[test]
    fn substitution() {
        let (mut reg, x, y, w) = setup();
        let a = reg.phase_rate(0);
        // x^2 with x -> y + 1
        let e = &Expr::symbol(x) * &Expr::symbol(x);
        let value = &Expr::symbol(y) + &Expr::constant(1.0);
        let s = e.subs(x, &value).unwrap();
        let expected
            = &(&(&Expr::symbol(y) * &Expr::symbol(y))
                + &Expr::symbol(y).scale(C64::from(2.0)))
            + &Expr::constant(1.0);
        assert_eq!(s, expected);

        // phase exp(i w t) with w -> a - y
        let e = Expr::oscillation(Phase::symbol(w));
        let value = &Expr::symbol(a) - &Expr::symbol(y);
        let s = e.subs(w, &value).unwrap();
        assert_eq!(s, Expr::oscillation(Phase::symbol(a).with(y, -1)));

        // non-integer replacement inside a phase is rejected
        let bad = Expr::constant(1.5);
        assert!(matches!(
            Expr::oscillation(Phase::symbol(w)).subs(w, &bad),
            Err(Error::NonIntegerPhase { .. }),
        ));
    }

    #[test]
    fn residual_and_symbols() {
        let (_, x, y, w) = setup();
        let e
            = &(&Expr::constant(3.0) + &Expr::symbol(x))
            + &Expr::term(C64::from(2.0), &[], Phase::symbol(w).with(y, 1));
        assert_eq!(e.residual(), C64::from(5.0));
        let expected: BTreeSet<Symbol> = [x, y, w].into_iter().collect();
        assert_eq!(e.free_symbols(), expected);
        assert!(!e.is_time_independent());
        assert_eq!(e.at_time_zero(), &Expr::constant(5.0) + &Expr::symbol(x));
    }

    #[test]
    fn numeric_evaluation() {
        let (_, x, _, w) = setup();
        let e = Expr::term(C64::from(2.0), &[x], Phase::symbol(w));
        let values: HashMap<Symbol, C64>
            = [(x, C64::from(3.0)), (w, C64::from(std::f64::consts::PI))]
            .into_iter().collect();
        let val = e.evaluate(&values, 0.5).unwrap();
        assert!((val - C64::new(0.0, 6.0)).norm() < 1e-12);
        let missing: HashMap<Symbol, C64> = HashMap::default();
        assert!(matches!(
            e.evaluate(&missing, 0.0),
            Err(Error::UnboundSymbol { .. }),
        ));
    }

    #[test]
    fn display_uses_registry_names() {
        let (reg, x, _, w) = setup();
        let e = Expr::term(C64::from(0.5), &[x], Phase::symbol(w));
        assert_eq!(format!("{}", e.display(&reg)), "0.5·x·exp(i·t·(ω0))");
        assert_eq!(format!("{}", Expr::zero().display(&reg)), "0");
    }
}
