//! # Tidal Constituents
//!
//! Every constituent is either a *base* constituent, whose equilibrium
//! argument is an integer combination of the seven astronomical arguments
//! `T+h-s, s, h, p, N, p', 90°`, or a *compound* constituent built from base
//! constituents (overtides and shallow-water terms such as M4 or MS4).
//!
//! For a compound constituent with members `(cᵢ, nᵢ)`:
//! - speed, equilibrium argument `V` and nodal angle `u` are `Σ nᵢ·xᵢ`
//! - node factor `f` is `Π fᵢ^|nᵢ|`
//!
//! [`NOAA`] is the 37-constituent set NOAA publishes for its stations and is
//! the default analysis set.

use crate::astro::Astro;
use crate::nodal::NodeFactor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A supported tidal constituent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Constituent {
    // Long period
    Z0,
    Sa,
    Ssa,
    Mm,
    Mf,
    Msf,
    // Diurnal
    Q1,
    O1,
    K1,
    J1,
    M1,
    P1,
    S1,
    Oo1,
    TwoQ1,
    Rho1,
    // Semidiurnal
    TwoN2,
    N2,
    Nu2,
    M2,
    Lambda2,
    L2,
    T2,
    S2,
    R2,
    K2,
    Mu2,
    TwoSm2,
    // Terdiurnal
    M3,
    TwoMk3,
    Mk3,
    // Higher harmonics
    Mn4,
    M4,
    Ms4,
    S4,
    M6,
    S6,
    M8,
}

/// How a constituent's argument is built.
#[derive(Debug, Clone, Copy)]
pub enum Definition {
    Base {
        /// Multipliers of `T+h-s, s, h, p, N, p', 90°`
        coefficients: [i32; 7],
        node: NodeFactor,
    },
    Compound(&'static [(Constituent, i32)]),
}

/// The NOAA harmonic constituent set, in NOAA's customary order.
pub const NOAA: [Constituent; 37] = [
    Constituent::M2,
    Constituent::S2,
    Constituent::N2,
    Constituent::K1,
    Constituent::M4,
    Constituent::O1,
    Constituent::M6,
    Constituent::Mk3,
    Constituent::S4,
    Constituent::Mn4,
    Constituent::Nu2,
    Constituent::S6,
    Constituent::Mu2,
    Constituent::TwoN2,
    Constituent::Oo1,
    Constituent::Lambda2,
    Constituent::S1,
    Constituent::M1,
    Constituent::J1,
    Constituent::Mm,
    Constituent::Ssa,
    Constituent::Sa,
    Constituent::Msf,
    Constituent::Mf,
    Constituent::Rho1,
    Constituent::Q1,
    Constituent::T2,
    Constituent::R2,
    Constituent::TwoQ1,
    Constituent::P1,
    Constituent::TwoSm2,
    Constituent::M3,
    Constituent::L2,
    Constituent::TwoMk3,
    Constituent::K2,
    Constituent::M8,
    Constituent::Ms4,
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown tidal constituent '{0}'")]
pub struct UnknownConstituent(pub String);

impl Constituent {
    pub fn name(self) -> &'static str {
        use Constituent::*;
        match self {
            Z0 => "Z0",
            Sa => "Sa",
            Ssa => "Ssa",
            Mm => "Mm",
            Mf => "Mf",
            Msf => "MSF",
            Q1 => "Q1",
            O1 => "O1",
            K1 => "K1",
            J1 => "J1",
            M1 => "M1",
            P1 => "P1",
            S1 => "S1",
            Oo1 => "OO1",
            TwoQ1 => "2Q1",
            Rho1 => "rho1",
            TwoN2 => "2N2",
            N2 => "N2",
            Nu2 => "nu2",
            M2 => "M2",
            Lambda2 => "lambda2",
            L2 => "L2",
            T2 => "T2",
            S2 => "S2",
            R2 => "R2",
            K2 => "K2",
            Mu2 => "mu2",
            TwoSm2 => "2SM2",
            M3 => "M3",
            TwoMk3 => "2MK3",
            Mk3 => "MK3",
            Mn4 => "MN4",
            M4 => "M4",
            Ms4 => "MS4",
            S4 => "S4",
            M6 => "M6",
            S6 => "S6",
            M8 => "M8",
        }
    }

    pub fn definition(self) -> Definition {
        use Constituent::*;
        use NodeFactor as F;

        let base = |coefficients: [i32; 7], node: NodeFactor| Definition::Base {
            coefficients,
            node,
        };
        match self {
            Z0 => base([0, 0, 0, 0, 0, 0, 0], F::Unity),
            Sa => base([0, 0, 1, 0, 0, 0, 0], F::Unity),
            Ssa => base([0, 0, 2, 0, 0, 0, 0], F::Unity),
            Mm => base([0, 1, 0, -1, 0, 0, 0], F::Mm),
            Mf => base([0, 2, 0, 0, 0, 0, 0], F::Mf),

            Q1 => base([1, -2, 0, 1, 0, 0, 1], F::O1),
            O1 => base([1, -1, 0, 0, 0, 0, 1], F::O1),
            K1 => base([1, 1, 0, 0, 0, 0, -1], F::K1),
            J1 => base([1, 2, 0, -1, 0, 0, -1], F::J1),
            // M1 conventions differ between agencies; this is Schureman's
            M1 => base([1, 0, 0, 0, 0, 0, 1], F::M1),
            P1 => base([1, 1, -2, 0, 0, 0, 1], F::Unity),
            S1 => base([1, 1, -1, 0, 0, 0, 0], F::Unity),
            Oo1 => base([1, 3, 0, 0, 0, 0, -1], F::OO1),

            TwoN2 => base([2, -2, 0, 2, 0, 0, 0], F::M2),
            N2 => base([2, -1, 0, 1, 0, 0, 0], F::M2),
            Nu2 => base([2, -1, 2, -1, 0, 0, 0], F::M2),
            M2 => base([2, 0, 0, 0, 0, 0, 0], F::M2),
            Lambda2 => base([2, 1, -2, 1, 0, 0, 2], F::M2),
            L2 => base([2, 1, 0, -1, 0, 0, 2], F::L2),
            T2 => base([2, 2, -3, 0, 0, 1, 0], F::Unity),
            S2 => base([2, 2, -2, 0, 0, 0, 0], F::Unity),
            R2 => base([2, 2, -1, 0, 0, -1, 2], F::Unity),
            K2 => base([2, 2, 0, 0, 0, 0, 0], F::K2),

            M3 => base([3, 0, 0, 0, 0, 0, 0], F::M3),

            Msf => Definition::Compound(&[(S2, 1), (M2, -1)]),
            TwoQ1 => Definition::Compound(&[(N2, 1), (J1, -1)]),
            Rho1 => Definition::Compound(&[(Nu2, 1), (K1, -1)]),
            Mu2 => Definition::Compound(&[(M2, 2), (S2, -1)]),
            TwoSm2 => Definition::Compound(&[(S2, 2), (M2, -1)]),
            TwoMk3 => Definition::Compound(&[(M2, 1), (O1, 1)]),
            Mk3 => Definition::Compound(&[(M2, 1), (K1, 1)]),
            Mn4 => Definition::Compound(&[(M2, 1), (N2, 1)]),
            M4 => Definition::Compound(&[(M2, 2)]),
            Ms4 => Definition::Compound(&[(M2, 1), (S2, 1)]),
            S4 => Definition::Compound(&[(S2, 2)]),
            M6 => Definition::Compound(&[(M2, 3)]),
            S6 => Definition::Compound(&[(S2, 3)]),
            M8 => Definition::Compound(&[(M2, 4)]),
        }
    }

    /// Angular speed in degrees per hour.
    pub fn speed(self, a: &Astro) -> f64 {
        match self.definition() {
            Definition::Base { coefficients, .. } => dot(&coefficients, &a.speeds()),
            Definition::Compound(members) => members
                .iter()
                .map(|&(c, n)| n as f64 * c.speed(a))
                .sum(),
        }
    }

    /// Equilibrium argument `V` in degrees.
    pub fn value(self, a: &Astro) -> f64 {
        match self.definition() {
            Definition::Base { coefficients, .. } => dot(&coefficients, &a.values()),
            Definition::Compound(members) => members
                .iter()
                .map(|&(c, n)| n as f64 * c.value(a))
                .sum(),
        }
    }

    /// Nodal angle `u` in degrees.
    pub fn u(self, a: &Astro) -> f64 {
        match self.definition() {
            Definition::Base { node, .. } => node.u(a),
            Definition::Compound(members) => {
                members.iter().map(|&(c, n)| n as f64 * c.u(a)).sum()
            }
        }
    }

    /// Node factor `f`.
    pub fn f(self, a: &Astro) -> f64 {
        match self.definition() {
            Definition::Base { node, .. } => node.f(a),
            Definition::Compound(members) => members
                .iter()
                .map(|&(c, n)| c.f(a).powi(n.abs()))
                .product(),
        }
    }

    /// Every supported constituent: Z0 followed by [`NOAA`].
    pub fn all() -> impl Iterator<Item = Constituent> {
        std::iter::once(Constituent::Z0).chain(NOAA)
    }
}

fn dot(coefficients: &[i32; 7], arguments: &[f64; 7]) -> f64 {
    coefficients
        .iter()
        .zip(arguments)
        .map(|(&c, &x)| c as f64 * x)
        .sum()
}

impl fmt::Display for Constituent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Constituent {
    type Err = UnknownConstituent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Constituent::all()
            .find(|c| c.name() == wanted)
            .or_else(|| Constituent::all().find(|c| c.name().eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| UnknownConstituent(wanted.to_string()))
    }
}

impl From<Constituent> for String {
    fn from(c: Constituent) -> Self {
        c.name().to_string()
    }
}

impl TryFrom<String> for Constituent {
    type Error = UnknownConstituent;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
