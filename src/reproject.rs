//! Geographic to projected coordinate conversion.

/// Longitude/latitude (degrees) to projected x/y (metres).
pub trait Reproject: Send + Sync {
    fn to_projected(&self, longitude: f64, latitude: f64) -> (f64, f64);
}

/// Transverse Mercator on the GRS80 ellipsoid (NAD83 / UTM).
#[derive(Debug, Clone, Copy)]
pub struct Utm {
    zone: u8,
}

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;

impl Utm {
    pub fn new(zone: u8) -> Self {
        Self { zone }
    }

    fn central_meridian(&self) -> f64 {
        (-183.0 + 6.0 * self.zone as f64).to_radians()
    }
}

impl Default for Utm {
    /// Zone 12 north, matching the destination `Shape` column.
    fn default() -> Self {
        Self::new(12)
    }
}

impl Reproject for Utm {
    fn to_projected(&self, longitude: f64, latitude: f64) -> (f64, f64) {
        let a = SEMI_MAJOR_AXIS;
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = latitude.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let big_a = (longitude.to_radians() - self.central_meridian()) * cos_phi;

        let m = a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let x = SCALE_FACTOR
            * n
            * (big_a
                + (1.0 - t + c) * big_a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0)
            + FALSE_EASTING;

        let y = SCALE_FACTOR
            * (m + n
                * tan_phi
                * (big_a * big_a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * big_a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                        / 720.0));

        (x, y)
    }
}
