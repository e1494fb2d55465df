//! Node factors and nodal angle corrections.
//!
//! Over the 18.6-year cycle of the lunar node, the amplitude of each lunar
//! constituent is scaled by a node factor `f` and its phase shifted by a
//! nodal angle `u`. The formulas are Schureman's (Table 2 and equations
//! 65-78, 195-235); the divisors are the mean values of the numerators over
//! a full nodal cycle.

use crate::astro::Astro;
use std::f64::consts::PI;

const D2R: f64 = PI / 180.0;
const R2D: f64 = 180.0 / PI;

/// Which node factor formula a base constituent follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFactor {
    /// Solar constituents: `f = 1`, `u = 0`
    Unity,
    Mm,
    Mf,
    O1,
    J1,
    OO1,
    M2,
    K1,
    L2,
    K2,
    M1,
    /// `f = f(M2)^(3/2)`, `u = 3/2 u(M2)`
    M3,
}

impl NodeFactor {
    /// Node factor `f` (dimensionless).
    pub fn f(self, a: &Astro) -> f64 {
        match self {
            NodeFactor::Unity => 1.0,
            NodeFactor::Mm => f_mm(a),
            NodeFactor::Mf => f_mf(a),
            NodeFactor::O1 => f_o1(a),
            NodeFactor::J1 => f_j1(a),
            NodeFactor::OO1 => f_oo1(a),
            NodeFactor::M2 => f_m2(a),
            NodeFactor::K1 => f_k1(a),
            NodeFactor::L2 => f_l2(a),
            NodeFactor::K2 => f_k2(a),
            NodeFactor::M1 => f_m1(a),
            NodeFactor::M3 => f_m2(a).powf(1.5),
        }
    }

    /// Nodal angle `u` in degrees.
    pub fn u(self, a: &Astro) -> f64 {
        match self {
            NodeFactor::Unity | NodeFactor::Mm => 0.0,
            NodeFactor::Mf => -2.0 * a.xi,
            NodeFactor::O1 => 2.0 * a.xi - a.nu,
            NodeFactor::J1 => -a.nu,
            NodeFactor::OO1 => -2.0 * a.xi - a.nu,
            NodeFactor::M2 => u_m2(a),
            NodeFactor::K1 => -a.nup,
            NodeFactor::L2 => u_l2(a),
            NodeFactor::K2 => -2.0 * a.nupp,
            NodeFactor::M1 => u_m1(a),
            NodeFactor::M3 => 1.5 * u_m2(a),
        }
    }
}

/// `(ω, i, I)` in radians.
fn angles(a: &Astro) -> (f64, f64, f64) {
    (a.omega.value * D2R, a.i.value * D2R, a.moon_obliquity * D2R)
}

// Schureman 73, 65
fn f_mm(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let mean = (2.0 / 3.0 - omega.sin().powi(2)) * (1.0 - 1.5 * i.sin().powi(2));
    (2.0 / 3.0 - big_i.sin().powi(2)) / mean
}

// Schureman 74, 66
fn f_mf(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let mean = omega.sin().powi(2) * (0.5 * i).cos().powi(4);
    big_i.sin().powi(2) / mean
}

// Schureman 75, 67
fn f_o1(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let mean = omega.sin() * (0.5 * omega).cos().powi(2) * (0.5 * i).cos().powi(4);
    big_i.sin() * (0.5 * big_i).cos().powi(2) / mean
}

// Schureman 76, 68
fn f_j1(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let mean = (2.0 * omega).sin() * (1.0 - 1.5 * i.sin().powi(2));
    (2.0 * big_i).sin() / mean
}

// Schureman 77, 69
fn f_oo1(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let mean = omega.sin() * (0.5 * omega).sin().powi(2) * (0.5 * i).cos().powi(4);
    big_i.sin() * (0.5 * big_i).sin().powi(2) / mean
}

// Schureman 78, 70
fn f_m2(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let mean = (0.5 * omega).cos().powi(4) * (0.5 * i).cos().powi(4);
    (0.5 * big_i).cos().powi(4) / mean
}

// Schureman 227, 226, 68
fn f_k1(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let nu = a.nu * D2R;
    let sin2i_cosnu_mean = (2.0 * omega).sin() * (1.0 - 1.5 * i.sin().powi(2));
    let mean = 0.5023 * sin2i_cosnu_mean + 0.1681;
    (0.2523 * (2.0 * big_i).sin().powi(2) + 0.1689 * (2.0 * big_i).sin() * nu.cos() + 0.0283)
        .sqrt()
        / mean
}

// Schureman 215, 213, 204
fn f_l2(a: &Astro) -> f64 {
    let big_p = a.perigee_from_intersection * D2R;
    let big_i = a.moon_obliquity * D2R;
    let tan_half_i = (0.5 * big_i).tan();
    let r_a_inv = (1.0 - 12.0 * tan_half_i.powi(2) * (2.0 * big_p).cos()
        + 36.0 * tan_half_i.powi(4))
    .sqrt();
    f_m2(a) * r_a_inv
}

// Schureman 235, 234, 71
fn f_k2(a: &Astro) -> f64 {
    let (omega, i, big_i) = angles(a);
    let nu = a.nu * D2R;
    let sinsq_i_cos2nu_mean = omega.sin().powi(2) * (1.0 - 1.5 * i.sin().powi(2));
    let mean = 0.5023 * sinsq_i_cos2nu_mean + 0.0365;
    (0.2523 * big_i.sin().powi(4) + 0.0367 * big_i.sin().powi(2) * (2.0 * nu).cos() + 0.0013)
        .sqrt()
        / mean
}

// Schureman 206, 207, 195
fn f_m1(a: &Astro) -> f64 {
    let big_p = a.perigee_from_intersection * D2R;
    let big_i = a.moon_obliquity * D2R;
    let half_cos = (0.5 * big_i).cos();
    let q_a_inv = (0.25
        + 1.5 * big_i.cos() * (2.0 * big_p).cos() * half_cos.powf(-0.5)
        + 2.25 * big_i.cos().powi(2) * half_cos.powi(-4))
    .sqrt();
    f_o1(a) * q_a_inv
}

fn u_m2(a: &Astro) -> f64 {
    2.0 * a.xi - 2.0 * a.nu
}

// Schureman 214
fn u_l2(a: &Astro) -> f64 {
    let big_p = a.perigee_from_intersection * D2R;
    let big_i = a.moon_obliquity * D2R;
    let r = ((2.0 * big_p).sin() / (1.0 / 6.0 * (0.5 * big_i).tan().powi(-2) - (2.0 * big_p).cos()))
        .atan()
        * R2D;
    u_m2(a) - r
}

// Schureman 202
fn u_m1(a: &Astro) -> f64 {
    let big_p = a.perigee_from_intersection * D2R;
    let big_i = a.moon_obliquity * D2R;
    let q = ((5.0 * big_i.cos() - 1.0) / (7.0 * big_i.cos() + 1.0) * big_p.tan()).atan() * R2D;
    a.xi - a.nu + q
}
