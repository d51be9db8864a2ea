//! Point-wise transverse Mercator projection (UTM).
//!
//! # Responsibility
//! - Convert WGS84 latitude/longitude to UTM easting/northing/zone and back.
//!
//! # Invariants
//! - Zone is `floor((lon + 180) / 6) + 1`, with lon = 180 folded into zone 60.
//! - Hemisphere is `N` for latitude >= 0.
//! - Forward/inverse round-trip stays within 1 cm outside +/-89.9 deg latitude.
//!
//! Uses the 6th-order Krüger series in the third flattening `n`.

use crate::model::geo::{Datum, GeoPoint, Hemisphere, UtmCoordinate};

const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const MAX_NEWTON_STEPS: usize = 16;

/// Returns the UTM zone for a longitude in degrees.
pub fn utm_zone(longitude: f64) -> u8 {
    let zone = ((longitude + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u8
}

/// Central meridian of a zone in degrees.
pub fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Transverse Mercator projector bound to a single datum ellipsoid.
#[derive(Debug, Clone, Copy)]
pub struct GeodeticProjector {
    datum: Datum,
    eccentricity: f64,
    rectifying_radius: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

impl GeodeticProjector {
    pub fn new(datum: Datum) -> Self {
        let (a, f) = datum.ellipsoid();
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let rectifying_radius = a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1983433.0 * n6 / 1935360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167603.0 * n6 / 181440.0,
            49561.0 * n4 / 161280.0 - 179.0 * n5 / 168.0 + 6601661.0 * n6 / 7257600.0,
            34729.0 * n5 / 80640.0 - 3418889.0 * n6 / 1995840.0,
            212378941.0 * n6 / 319334400.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1118711.0 * n6 / 3870720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161280.0 - 11.0 * n5 / 504.0 - 830251.0 * n6 / 7257600.0,
            4583.0 * n5 / 161280.0 - 108847.0 * n6 / 3991680.0,
            20648693.0 * n6 / 638668800.0,
        ];

        Self {
            datum,
            eccentricity: (f * (2.0 - f)).sqrt(),
            rectifying_radius,
            alpha,
            beta,
        }
    }

    pub fn datum(&self) -> Datum {
        self.datum
    }

    /// Projects a validated point into its own UTM zone.
    pub fn to_utm(&self, geo: GeoPoint) -> UtmCoordinate {
        let zone = utm_zone(geo.longitude);
        let hemisphere = if geo.latitude >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        };

        let phi = geo.latitude.to_radians();
        let lambda = (geo.longitude - central_meridian(zone)).to_radians();
        let e = self.eccentricity;

        let tau = phi.tan();
        let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
        let tau_prime = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();

        let cos_lambda = lambda.cos();
        let xi_prime = tau_prime.atan2(cos_lambda);
        let eta_prime = (lambda.sin() / (tau_prime * tau_prime + cos_lambda * cos_lambda).sqrt())
            .asinh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (index, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (index as f64 + 1.0);
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let scale = SCALE_FACTOR * self.rectifying_radius;
        let easting = scale * eta + FALSE_EASTING;
        let mut northing = scale * xi;
        if hemisphere == Hemisphere::South {
            northing += FALSE_NORTHING_SOUTH;
        }

        UtmCoordinate {
            easting,
            northing,
            zone,
            hemisphere,
            datum: self.datum,
        }
    }

    /// Inverse projection from a UTM coordinate to latitude/longitude.
    pub fn to_geo(&self, utm: &UtmCoordinate) -> GeoPoint {
        let scale = SCALE_FACTOR * self.rectifying_radius;
        let x = utm.easting - FALSE_EASTING;
        let y = match utm.hemisphere {
            Hemisphere::North => utm.northing,
            Hemisphere::South => utm.northing - FALSE_NORTHING_SOUTH,
        };

        let eta = x / scale;
        let xi = y / scale;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (index, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (index as f64 + 1.0);
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let sinh_eta = eta_prime.sinh();
        let sin_xi = xi_prime.sin();
        let cos_xi = xi_prime.cos();
        let tau_prime = sin_xi / (sinh_eta * sinh_eta + cos_xi * cos_xi).sqrt();

        let e = self.eccentricity;
        let e2 = e * e;
        let mut tau = tau_prime;
        for _ in 0..MAX_NEWTON_STEPS {
            let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
            let tau_i = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();
            let delta = (tau_prime - tau_i) / (1.0 + tau_i * tau_i).sqrt()
                * (1.0 + (1.0 - e2) * tau * tau)
                / ((1.0 - e2) * (1.0 + tau * tau).sqrt());
            tau += delta;
            if delta.abs() < 1e-12 {
                break;
            }
        }

        let latitude = tau.atan().to_degrees();
        let longitude = central_meridian(utm.zone) + sinh_eta.atan2(cos_xi).to_degrees();

        GeoPoint {
            latitude,
            longitude,
        }
    }
}

impl Default for GeodeticProjector {
    fn default() -> Self {
        Self::new(Datum::default())
    }
}
