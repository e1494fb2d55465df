//! Astronomical arguments for tidal harmonic analysis.
//!
//! Mean longitudes come from the polynomial fits in Meeus, *Astronomical
//! Algorithms* (2nd ed., formulas 22.2, 25.2, 47.1). The lunar orbit angles
//! `I, ξ, ν, ν', ν''` follow Schureman, *Manual of Harmonic Analysis and
//! Prediction of Tides* (1958), equations 191, 224 and 232.
//!
//! All angles are in degrees and all speeds in degrees per mean solar hour.

use chrono::NaiveDateTime;
use std::f64::consts::PI;

const D2R: f64 = PI / 180.0;
const R2D: f64 = 180.0 / PI;

/// Julian Day of the J2000.0 epoch (2000-01-01 12:00 TT).
const J2000: f64 = 2_451_545.0;

/// Julian Day of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Polynomials are in Julian centuries; speeds are wanted per hour.
const CENTURIES_PER_HOUR: f64 = 1.0 / (24.0 * 365.25 * 100.0);

// Meeus 22.2
const TERRESTRIAL_OBLIQUITY: [f64; 4] = [
    23.0 + 26.0 / 60.0 + 21.448 / 3600.0,
    -46.8150 / 3600.0,
    -0.00059 / 3600.0,
    0.001813 / 3600.0,
];

// Meeus 47.1
const LUNAR_LONGITUDE: [f64; 5] = [
    218.316_459_1,
    481_267.881_342_36,
    -0.001_326_8,
    1.0 / 538_841.0,
    -1.0 / 65_194_000.0,
];

const LUNAR_PERIGEE: [f64; 5] = [
    83.353_243_0,
    4_069.013_711_1,
    -0.010_323_8,
    -1.0 / 80_053.0,
    1.0 / 18_999_000.0,
];

const LUNAR_NODE: [f64; 5] = [
    125.044_555_0,
    -1_934.136_184_9,
    0.002_076_2,
    1.0 / 467_410.0,
    -1.0 / 60_616_000.0,
];

// Meeus 25.2, perigee = mean longitude - mean anomaly
const SOLAR_PERIGEE: [f64; 4] = [
    280.46645 - 357.52910,
    36_000.769_32 - 35_999.050_30,
    0.000_303_2 + 0.000_155_9,
    0.000_000_48,
];

const SOLAR_LONGITUDE: [f64; 3] = [280.46645, 36_000.769_83, 0.000_303_2];

/// Inclination of the Moon's orbit to the ecliptic.
const LUNAR_INCLINATION: f64 = 5.145;

/// An astronomical angle and its rate of change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AstronomicalParameter {
    /// Degrees
    pub value: f64,
    /// Degrees per hour
    pub speed: f64,
}

impl AstronomicalParameter {
    fn from_polynomial(coefficients: &[f64], centuries: f64) -> Self {
        Self {
            value: polynomial(coefficients, centuries).rem_euclid(360.0),
            speed: d_polynomial(coefficients, centuries) * CENTURIES_PER_HOUR,
        }
    }

    fn constant(value: f64) -> Self {
        Self { value, speed: 0.0 }
    }
}

/// Astronomical arguments at one instant.
///
/// The seven arguments `T+h-s, s, h, p, N, p', 90°` span every equilibrium
/// argument in [`crate::constituent`]; the remaining angles feed the node
/// factors in [`crate::nodal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Astro {
    /// Lunar hour angle `T + h - s`
    pub lunar_hour: AstronomicalParameter,
    /// Mean longitude of the Moon
    pub s: AstronomicalParameter,
    /// Mean longitude of the Sun
    pub h: AstronomicalParameter,
    /// Longitude of the lunar perigee
    pub p: AstronomicalParameter,
    /// Longitude of the Moon's ascending node
    pub n: AstronomicalParameter,
    /// Longitude of the solar perigee
    pub pp: AstronomicalParameter,
    /// Constant 90° used by diurnal arguments
    pub ninety: AstronomicalParameter,
    /// Obliquity of the ecliptic
    pub omega: AstronomicalParameter,
    /// Inclination of the Moon's orbit to the ecliptic
    pub i: AstronomicalParameter,
    /// Obliquity of the Moon's orbit to the equator (Schureman `I`)
    pub moon_obliquity: f64,
    /// Schureman `ξ`
    pub xi: f64,
    /// Schureman `ν`
    pub nu: f64,
    /// Schureman `ν'`
    pub nup: f64,
    /// Schureman `ν''`
    pub nupp: f64,
    /// Lunar perigee measured from the lunar intersection (Schureman `P`)
    pub perigee_from_intersection: f64,
}

impl Astro {
    /// Argument values in the order `T+h-s, s, h, p, N, p', 90°`.
    pub fn values(&self) -> [f64; 7] {
        [
            self.lunar_hour.value,
            self.s.value,
            self.h.value,
            self.p.value,
            self.n.value,
            self.pp.value,
            self.ninety.value,
        ]
    }

    /// Argument speeds in the same order as [`Astro::values`].
    pub fn speeds(&self) -> [f64; 7] {
        [
            self.lunar_hour.speed,
            self.s.speed,
            self.h.speed,
            self.p.speed,
            self.n.speed,
            self.pp.speed,
            self.ninety.speed,
        ]
    }
}

/// Julian Day of a naive UTC date-time.
pub fn julian_day(time: NaiveDateTime) -> f64 {
    let seconds = time.and_utc().timestamp_millis() as f64 / 1000.0;
    seconds / 86_400.0 + UNIX_EPOCH_JD
}

/// Compute the astronomical arguments at `time` (UTC).
pub fn astro(time: NaiveDateTime) -> Astro {
    let jd = julian_day(time);
    let centuries = (jd - J2000) / 36_525.0;

    let s = AstronomicalParameter::from_polynomial(&LUNAR_LONGITUDE, centuries);
    let h = AstronomicalParameter::from_polynomial(&SOLAR_LONGITUDE, centuries);
    let p = AstronomicalParameter::from_polynomial(&LUNAR_PERIGEE, centuries);
    let n = AstronomicalParameter::from_polynomial(&LUNAR_NODE, centuries);
    let pp = AstronomicalParameter::from_polynomial(&SOLAR_PERIGEE, centuries);
    let omega = AstronomicalParameter::from_polynomial(&TERRESTRIAL_OBLIQUITY, centuries);
    let i = AstronomicalParameter::constant(LUNAR_INCLINATION);

    // Hour angle of the mean Sun; the Julian Day starts at noon
    let hour_angle = (jd - jd.floor()) * 360.0;
    let lunar_hour = AstronomicalParameter {
        value: hour_angle + h.value - s.value,
        speed: 15.0 + h.speed - s.speed,
    };

    let orbit = LunarOrbit::new(n.value, i.value, omega.value);
    let xi = orbit.xi();

    Astro {
        lunar_hour,
        s,
        h,
        p,
        n,
        pp,
        ninety: AstronomicalParameter::constant(90.0),
        omega,
        i,
        moon_obliquity: orbit.obliquity().rem_euclid(360.0),
        xi: xi.rem_euclid(360.0),
        nu: orbit.nu().rem_euclid(360.0),
        nup: orbit.nup().rem_euclid(360.0),
        nupp: orbit.nupp().rem_euclid(360.0),
        perigee_from_intersection: (p.value - xi).rem_euclid(360.0),
    }
}

fn polynomial(coefficients: &[f64], argument: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * argument + c)
}

fn d_polynomial(coefficients: &[f64], argument: f64) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0, |acc, (power, c)| acc * argument + power as f64 * c)
}

/// Orientation of the lunar orbit relative to the equator, from the node
/// longitude `N`, the orbit inclination `i` and the obliquity `ω`.
struct LunarOrbit {
    n: f64,
    i: f64,
    omega: f64,
}

impl LunarOrbit {
    fn new(n_deg: f64, i_deg: f64, omega_deg: f64) -> Self {
        Self {
            n: n_deg * D2R,
            i: i_deg * D2R,
            omega: omega_deg * D2R,
        }
    }

    /// Schureman 191
    fn obliquity(&self) -> f64 {
        let cos_i = self.i.cos() * self.omega.cos()
            - self.i.sin() * self.omega.sin() * self.n.cos();
        cos_i.acos() * R2D
    }

    /// Half-angle terms `½(N - ξ ± ν) - ½N`.
    fn half_angles(&self) -> (f64, f64) {
        let half_n = 0.5 * self.n;
        let e1 = (0.5 * (self.omega - self.i)).cos() / (0.5 * (self.omega + self.i)).cos()
            * half_n.tan();
        let e2 = (0.5 * (self.omega - self.i)).sin() / (0.5 * (self.omega + self.i)).sin()
            * half_n.tan();
        (e1.atan() - half_n, e2.atan() - half_n)
    }

    fn xi(&self) -> f64 {
        let (e1, e2) = self.half_angles();
        -(e1 + e2) * R2D
    }

    fn nu(&self) -> f64 {
        let (e1, e2) = self.half_angles();
        (e1 - e2) * R2D
    }

    /// Schureman 224
    fn nup(&self) -> f64 {
        let big_i = self.obliquity() * D2R;
        let nu = self.nu() * D2R;
        ((2.0 * big_i).sin() * nu.sin() / ((2.0 * big_i).sin() * nu.cos() + 0.3347)).atan() * R2D
    }

    /// Schureman 232
    fn nupp(&self) -> f64 {
        let big_i = self.obliquity() * D2R;
        let nu = self.nu() * D2R;
        let sin2_i = big_i.sin().powi(2);
        let tan_2nupp = sin2_i * (2.0 * nu).sin() / (sin2_i * (2.0 * nu).cos() + 0.0727);
        0.5 * tan_2nupp.atan() * R2D
    }
}
