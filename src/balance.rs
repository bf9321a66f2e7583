//! Charge balance derivation for one sample's results.

use crate::row::{CastRow, Value};

pub const CHARGE_BALANCE: &str = "Charge Balance";
pub const CATION_TOTAL: &str = "Cation Total";
pub const ANION_TOTAL: &str = "Anion Total";
pub const CHARGE_BALANCE_GROUP: &str = "Charge Balance";

/// Milliequivalents per milligram: charge / molar mass.
const CALCIUM: f64 = 2.0 / 40.078;
const MAGNESIUM: f64 = 2.0 / 24.305;
const SODIUM: f64 = 1.0 / 22.990;
const POTASSIUM: f64 = 1.0 / 39.098;
const CHLORIDE: f64 = 1.0 / 35.453;
const SULFATE: f64 = 2.0 / 96.06;
const BICARBONATE: f64 = 1.0 / 61.017;
const CARBONATE: f64 = 2.0 / 60.009;
const NITRATE: f64 = 1.0 / 62.004;

/// mg/l as CaCO3 to mg/l bicarbonate.
const ALKALINITY_TO_BICARBONATE: f64 = 1.22;

/// Fields copied from the sample group onto derived rows.
const SAMPLE_FIELDS: [&str; 12] = [
    "SampleId",
    "SampleDate",
    "SampleTime",
    "StationId",
    "OrgId",
    "OrgName",
    "DataSource",
    "SampMedia",
    "SampType",
    "ProjectId",
    "Lat_Y",
    "Lon_X",
];

pub trait BalanceCharges: Send + Sync {
    /// New rows derived from the full result set of one sample id.
    fn get_charge_balance(&self, samples: &[CastRow]) -> Vec<CastRow>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChargeBalancer;

#[derive(Debug, Default)]
struct Ions {
    calcium: Option<f64>,
    magnesium: Option<f64>,
    sodium: Option<f64>,
    potassium: Option<f64>,
    chloride: Option<f64>,
    sulfate: Option<f64>,
    bicarbonate: Option<f64>,
    alkalinity: Option<f64>,
    carbonate: Option<f64>,
    nitrate: Option<f64>,
}

impl Ions {
    fn collect(samples: &[CastRow]) -> Self {
        let mut ions = Ions::default();
        for sample in samples {
            let (Some(param), Some(value)) = (sample.text("Param"), sample.float("ResultValue"))
            else {
                continue;
            };
            let unit = sample.text("Unit").unwrap_or_default();
            let slot = match (param, unit) {
                ("Calcium", "mg/l") => &mut ions.calcium,
                ("Magnesium", "mg/l") => &mut ions.magnesium,
                ("Sodium", "mg/l") => &mut ions.sodium,
                ("Potassium", "mg/l") => &mut ions.potassium,
                ("Chloride", "mg/l") => &mut ions.chloride,
                ("Sulfate", "mg/l") => &mut ions.sulfate,
                ("Bicarbonate", "mg/l") => &mut ions.bicarbonate,
                ("Carbonate", "mg/l") => &mut ions.carbonate,
                ("Nitrate", "mg/l") => &mut ions.nitrate,
                ("Alkalinity", "mg/l as caco3") => &mut ions.alkalinity,
                _ => continue,
            };
            // first reported value wins
            slot.get_or_insert(value);
        }
        ions
    }

    /// (cations, anions) in meq/l, or `None` when a required ion is missing.
    fn totals(&self) -> Option<(f64, f64)> {
        let bicarbonate = self
            .bicarbonate
            .or(self.alkalinity.map(|a| a * ALKALINITY_TO_BICARBONATE))?;

        let cations = self.calcium? * CALCIUM
            + self.magnesium? * MAGNESIUM
            + self.sodium? * SODIUM
            + self.potassium.unwrap_or(0.0) * POTASSIUM;

        let anions = self.chloride? * CHLORIDE
            + self.sulfate? * SULFATE
            + bicarbonate * BICARBONATE
            + self.carbonate.unwrap_or(0.0) * CARBONATE
            + self.nitrate.unwrap_or(0.0) * NITRATE;

        Some((cations, anions))
    }
}

impl BalanceCharges for ChargeBalancer {
    fn get_charge_balance(&self, samples: &[CastRow]) -> Vec<CastRow> {
        let Some(first) = samples.first() else {
            return Vec::new();
        };
        let Some((cations, anions)) = Ions::collect(samples).totals() else {
            return Vec::new();
        };
        if cations + anions == 0.0 {
            return Vec::new();
        }

        let balance = (cations - anions) / (cations + anions) * 100.0;

        [
            (CHARGE_BALANCE, balance, "%"),
            (CATION_TOTAL, cations, "meq/l"),
            (ANION_TOTAL, anions, "meq/l"),
        ]
        .into_iter()
        .map(|(param, value, unit)| derived_row(first, param, round4(value), unit))
        .collect()
    }
}

fn derived_row(template: &CastRow, param: &str, value: f64, unit: &str) -> CastRow {
    let mut row: CastRow = SAMPLE_FIELDS
        .iter()
        .map(|field| (*field, template.get(field).clone()))
        .collect();
    row.set("Param", Value::Text(param.to_string()));
    row.set("ParamGroup", Value::Text(CHARGE_BALANCE_GROUP.to_string()));
    row.set("ResultValue", Value::Float(value));
    row.set("Unit", Value::Text(unit.to_string()));
    row
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
