//! `.prj` projection handling
//!
//! Geographic coordinate systems pass through untouched. Web Mercator and
//! Transverse Mercator (UTM, Gauss-Kruger) are inverse-projected to WGS84
//! degrees. Other projected systems are rejected rather than rendered in the
//! wrong place.
//!
//! The Transverse Mercator inverse is Karney's 6th order Krüger series, which
//! stays sub-millimetre across a zone.

use crate::error::ParseError;
use crate::geojson::{Geometry, Position};
use std::f64::consts::{FRAC_PI_2, PI};

/// WGS84 / spherical Mercator radius in metres
const EARTH_RADIUS: f64 = 6_378_137.0;

const WGS84_INVERSE_FLATTENING: f64 = 298.257_223_563;

/// Markers identifying a spherical (Web) Mercator PROJCS
const WEB_MERCATOR_MARKERS: [&str; 6] = [
    "MERCATOR_AUXILIARY_SPHERE",
    "PSEUDO-MERCATOR",
    "PSEUDO_MERCATOR",
    "WEB_MERCATOR",
    "\"3857\"",
    "\"900913\"",
];

const TRANSVERSE_MERCATOR_MARKERS: [&str; 3] = [
    "\"TRANSVERSE_MERCATOR\"",
    "\"GAUSS_KRUGER\"",
    "\"TRANSVERSE MERCATOR\"",
];

/// Krüger series orders kept
const ORDER: usize = 6;

/// Forward series numerators over n, the last entry being the denominator
const ALPHA_COEFFS: [&[f64]; ORDER] = [
    &[31564.0, -66675.0, 34440.0, 47250.0, -100800.0, 75600.0, 151200.0],
    &[-1983433.0, 863232.0, 748608.0, -1161216.0, 524160.0, 1935360.0],
    &[670412.0, 406647.0, -533952.0, 184464.0, 725760.0],
    &[6601661.0, -7732800.0, 2230245.0, 7257600.0],
    &[-13675556.0, 3438171.0, 7983360.0],
    &[212378941.0, 319334400.0],
];

/// Inverse series, same layout as [`ALPHA_COEFFS`]
const BETA_COEFFS: [&[f64]; ORDER] = [
    &[384796.0, -382725.0, -6720.0, 932400.0, -1612800.0, 1209600.0, 2419200.0],
    &[-1118711.0, 1695744.0, -1174656.0, 258048.0, 80640.0, 3870720.0],
    &[22276.0, -16929.0, -15984.0, 12852.0, 362880.0],
    &[-830251.0, -158400.0, 197865.0, 7257600.0],
    &[-435388.0, 453717.0, 15966720.0],
    &[20648693.0, 638668800.0],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Longitude/latitude degrees; no conversion needed
    Geographic,
    WebMercator,
    TransverseMercator(TransverseMercator),
}

/// Parameters of a Transverse Mercator PROJCS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub semi_major_axis: f64,
    pub inverse_flattening: f64,
    /// Degrees
    pub central_meridian: f64,
    /// Degrees
    pub latitude_of_origin: f64,
    pub scale_factor: f64,
    /// Projected units, not metres
    pub false_easting: f64,
    pub false_northing: f64,
    /// Metres per projected unit
    pub linear_unit: f64,
}

impl TransverseMercator {
    /// UTM zone (1-60) on WGS84
    pub fn utm(zone: u8, north: bool) -> Self {
        TransverseMercator {
            semi_major_axis: EARTH_RADIUS,
            inverse_flattening: WGS84_INVERSE_FLATTENING,
            central_meridian: f64::from(zone) * 6.0 - 183.0,
            latitude_of_origin: 0.0,
            scale_factor: 0.9996,
            false_easting: 500_000.0,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
            linear_unit: 1.0,
        }
    }

    fn from_wkt(upper: &str) -> Self {
        let (semi_major_axis, inverse_flattening) =
            spheroid(upper).unwrap_or((EARTH_RADIUS, WGS84_INVERSE_FLATTENING));
        let linear_unit = linear_unit(upper).unwrap_or(1.0);
        TransverseMercator {
            semi_major_axis,
            inverse_flattening,
            central_meridian: parameter(upper, &["CENTRAL_MERIDIAN", "LONGITUDE OF NATURAL ORIGIN"])
                .unwrap_or(0.0),
            latitude_of_origin: parameter(upper, &["LATITUDE_OF_ORIGIN", "LATITUDE OF NATURAL ORIGIN"])
                .unwrap_or(0.0),
            scale_factor: parameter(upper, &["SCALE_FACTOR", "SCALE FACTOR AT NATURAL ORIGIN"])
                .unwrap_or(1.0),
            false_easting: parameter(upper, &["FALSE_EASTING", "FALSE EASTING"]).unwrap_or(0.0),
            false_northing: parameter(upper, &["FALSE_NORTHING", "FALSE NORTHING"]).unwrap_or(0.0),
            linear_unit,
        }
    }
}

impl Projection {
    /// Identifies the projection from `.prj` WKT
    pub fn from_wkt(wkt: &str) -> Result<Self, ParseError> {
        let wkt = wkt.trim();
        let upper = wkt.to_ascii_uppercase();

        if upper.is_empty() || upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS") {
            return Ok(Projection::Geographic);
        }

        if upper.starts_with("PROJCS") || upper.starts_with("PROJCRS") {
            if WEB_MERCATOR_MARKERS.iter().any(|m| upper.contains(m)) {
                return Ok(Projection::WebMercator);
            }
            if TRANSVERSE_MERCATOR_MARKERS.iter().any(|m| upper.contains(m)) {
                return Ok(Projection::TransverseMercator(TransverseMercator::from_wkt(&upper)));
            }
        }

        Err(ParseError::UnsupportedProjection(projection_name(wkt)))
    }

    /// Converts a geometry to WGS84 longitude/latitude
    pub fn to_wgs84(&self, mut geometry: Geometry) -> Geometry {
        match self {
            Projection::Geographic => {}
            Projection::WebMercator => geometry.map_positions(&mut unproject_web_mercator),
            Projection::TransverseMercator(params) => {
                let inverse = TmInverse::new(params);
                geometry.map_positions(&mut |position: &mut Position| inverse.apply(position));
            }
        }
        geometry
    }
}

fn unproject_web_mercator(position: &mut Position) {
    if let [x, y, ..] = position.as_mut_slice() {
        *x = (*x / EARTH_RADIUS).to_degrees();
        *y = (2.0 * (*y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
    }
}

/// Series terms derived from one set of parameters
struct TmInverse {
    /// Signed eccentricity
    es: f64,
    /// Rectifying radius times the scale factor
    radius: f64,
    beta: [f64; ORDER],
    /// xi of the latitude of origin on the central meridian
    xi_origin: f64,
    params: TransverseMercator,
}

impl TmInverse {
    fn new(params: &TransverseMercator) -> Self {
        let f = 1.0 / params.inverse_flattening;
        let e2 = f * (2.0 - f);
        let es = e2.abs().sqrt().copysign(f);
        let n = f / (2.0 - f);
        // (1 + n^2/4 + n^4/64 + n^6/256) / (1 + n)
        let b1 = polyval(&[1.0, 4.0, 64.0, 256.0], n * n) / (256.0 * (1.0 + n));

        let mut alpha = [0.0; ORDER];
        let mut beta = [0.0; ORDER];
        let mut d = n;
        for l in 0..ORDER {
            let m = ALPHA_COEFFS[l].len() - 1;
            alpha[l] = d * polyval(&ALPHA_COEFFS[l][..m], n) / ALPHA_COEFFS[l][m];
            beta[l] = d * polyval(&BETA_COEFFS[l][..m], n) / BETA_COEFFS[l][m];
            d *= n;
        }

        // On the central meridian eta is zero and the series is real
        let phi0 = params.latitude_of_origin.to_radians();
        let xip0 = taupf(phi0.tan(), es).atan();
        let xi_origin = xip0
            + alpha
                .iter()
                .enumerate()
                .map(|(j, a)| a * (2.0 * (j + 1) as f64 * xip0).sin())
                .sum::<f64>();

        TmInverse {
            es,
            radius: params.semi_major_axis * b1 * params.scale_factor,
            beta,
            xi_origin,
            params: *params,
        }
    }

    fn apply(&self, position: &mut Position) {
        if let [x, y, ..] = position.as_mut_slice() {
            let (lng, lat) = self.unproject(*x, *y);
            *x = lng;
            *y = lat;
        }
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let p = &self.params;
        let easting = (x - p.false_easting) * p.linear_unit;
        let northing = (y - p.false_northing) * p.linear_unit;

        let xi = northing / self.radius + self.xi_origin;
        let eta = easting / self.radius;

        let xi_sign = if xi.is_sign_negative() { -1.0 } else { 1.0 };
        let eta_sign = if eta.is_sign_negative() { -1.0 } else { 1.0 };
        let (xi, eta) = (xi.abs(), eta.abs());
        let backside = xi > FRAC_PI_2;
        let xi = if backside { PI - xi } else { xi };

        // Clenshaw sum of beta_j sin(2j zeta) in complex arithmetic
        let (s0, c0) = (2.0 * xi).sin_cos();
        let (sh0, ch0) = ((2.0 * eta).sinh(), (2.0 * eta).cosh());
        let a = (2.0 * c0 * ch0, -2.0 * s0 * sh0);
        let mut y0 = (0.0, 0.0);
        let mut y1 = (0.0, 0.0);
        for b in self.beta.iter().rev() {
            let next = complex_mul(a, y0);
            let next = (next.0 - y1.0 - b, next.1 - y1.1);
            y1 = y0;
            y0 = next;
        }
        let correction = complex_mul((s0 * ch0, c0 * sh0), y0);
        let xip = xi + correction.0;
        let etap = eta + correction.1;

        let s = etap.sinh();
        let c = xip.cos().max(0.0);
        let r = s.hypot(c);
        let (mut lng, lat) = if r == 0.0 {
            (0.0, 90.0)
        } else {
            let tau = tauf(xip.sin() / r, self.es);
            (s.atan2(c).to_degrees(), tau.atan().to_degrees())
        };

        lng *= eta_sign;
        if backside {
            lng = 180.0 - lng;
        }
        (normalize_degrees(lng + p.central_meridian), lat * xi_sign)
    }
}

fn complex_mul(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
}

fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, c| acc * x + c)
}

/// tan(phi) to tan of the conformal latitude
fn taupf(tau: f64, es: f64) -> f64 {
    let tau1 = 1.0_f64.hypot(tau);
    let sig = (es * (es * tau / tau1).atanh()).sinh();
    1.0_f64.hypot(sig) * tau - sig * tau1
}

/// Newton inverse of [`taupf`]
fn tauf(taup: f64, es: f64) -> f64 {
    let e2m = 1.0 - es * es;
    let tol = f64::EPSILON.sqrt() * taup.abs().max(1.0);
    let mut tau = taup / e2m.sqrt();
    for _ in 0..8 {
        let taupa = taupf(tau, es);
        let dtau = (taup - taupa) * (1.0 + e2m * tau * tau)
            / (e2m * 1.0_f64.hypot(tau) * 1.0_f64.hypot(taupa));
        tau += dtau;
        if dtau.abs() < tol {
            break;
        }
    }
    tau
}

fn normalize_degrees(lng: f64) -> f64 {
    let lng = lng % 360.0;
    if lng < -180.0 {
        lng + 360.0
    } else if lng >= 180.0 {
        lng - 360.0
    } else {
        lng
    }
}

/// `PARAMETER["name",value]` under any of the ESRI or WKT2 spellings
fn parameter(upper: &str, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| {
        let marker = format!("PARAMETER[\"{}\"", name);
        let start = upper.find(&marker)? + marker.len();
        numbers_after(&upper[start..]).first().copied()
    })
}

/// Semi-major axis and inverse flattening from SPHEROID or ELLIPSOID
fn spheroid(upper: &str) -> Option<(f64, f64)> {
    let start = upper.find("SPHEROID[").or_else(|| upper.find("ELLIPSOID["))?;
    let numbers = numbers_after(&upper[start..]);
    match numbers.as_slice() {
        [a, inverse_flattening, ..] if *a > 0.0 && *inverse_flattening > 0.0 => {
            Some((*a, *inverse_flattening))
        }
        _ => None,
    }
}

/// The last UNIT of a PROJCS is its linear unit; earlier ones belong to the GEOGCS
fn linear_unit(upper: &str) -> Option<f64> {
    let start = upper.rfind("UNIT[")?;
    numbers_after(&upper[start..])
        .first()
        .copied()
        .filter(|factor| *factor > 0.0)
}

/// Numbers in the bracketed node starting at `text`, skipping the quoted name
fn numbers_after(text: &str) -> Vec<f64> {
    let body = text.split(']').next().unwrap_or_default();
    let mut fields = body.split(',');
    // First field holds the name
    fields.next();
    fields
        .map_while(|field| field.trim().parse::<f64>().ok())
        .collect()
}

/// The quoted name of the outermost WKT node, or the raw text if there is none
fn projection_name(wkt: &str) -> String {
    wkt.split('"')
        .nth(1)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| wkt.chars().take(60).collect())
}
