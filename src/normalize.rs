//! Domain normalization of station and result rows.

use crate::identifier;
use crate::row::{CastRow, OrderedRow, Value};
use crate::schema::Schema;

pub const MAJOR_IONS_GROUP: &str = "Major Ions";

/// Canonical names for the ions the charge balance relies on, keyed by the
/// lowercase names seen in source data.
const PARAM_ALIASES: [(&str, &str); 13] = [
    ("calcium", "Calcium"),
    ("magnesium", "Magnesium"),
    ("sodium", "Sodium"),
    ("potassium", "Potassium"),
    ("chloride", "Chloride"),
    ("sulfate", "Sulfate"),
    ("sulphate", "Sulfate"),
    ("bicarbonate", "Bicarbonate"),
    ("carbonate", "Carbonate"),
    ("nitrate", "Nitrate"),
    ("alkalinity", "Alkalinity"),
    ("alkalinity, total", "Alkalinity"),
    ("total alkalinity", "Alkalinity"),
];

const UNIT_ALIASES: [(&str, &str); 6] = [
    ("mg/l", "mg/l"),
    ("milligrams per liter", "mg/l"),
    ("ug/l", "ug/l"),
    ("micrograms per liter", "ug/l"),
    ("mg/l caco3", "mg/l as caco3"),
    ("mg/l as caco3", "mg/l as caco3"),
];

/// Pure row transforms applied after casting.
pub trait Normalize: Send + Sync {
    fn normalize_station(&self, row: CastRow) -> CastRow;

    fn normalize_sample(&self, row: CastRow) -> CastRow;

    /// Values in schema column order; fields the row lacks become `Null`
    /// and fields outside the schema are dropped.
    fn reorder_filter(&self, row: &CastRow, schema: &Schema) -> OrderedRow {
        OrderedRow(
            schema
                .fields()
                .iter()
                .map(|(field, _)| row.get(field).clone())
                .collect(),
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WaterNormalizer;

impl Normalize for WaterNormalizer {
    fn normalize_station(&self, mut row: CastRow) -> CastRow {
        strip_station_id(&mut row);
        row
    }

    fn normalize_sample(&self, mut row: CastRow) -> CastRow {
        strip_station_id(&mut row);

        for field in ["Unit", "MDLUnit"] {
            if let Some(unit) = row.text(field).map(normalize_unit) {
                row.set(field, Value::Text(unit));
            }
        }

        if let Some(param) = row.text("Param").map(normalize_param) {
            let is_major_ion = PARAM_ALIASES.iter().any(|(_, name)| *name == param);
            row.set("Param", Value::Text(param));

            if is_major_ion {
                if row.get("ParamGroup").is_null() {
                    row.set("ParamGroup", Value::Text(MAJOR_IONS_GROUP.to_string()));
                }
                convert_micrograms(&mut row);
            }
        }

        row
    }
}

fn strip_station_id(row: &mut CastRow) {
    if let Some(id) = row.text("StationId").filter(|id| identifier::is_tagged(id)) {
        let stripped = identifier::strip(id);
        row.set("StationId", Value::Text(stripped));
    }
}

pub fn normalize_param(param: &str) -> String {
    let key = param.trim().to_lowercase();
    PARAM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| param.trim().to_string())
}

pub fn normalize_unit(unit: &str) -> String {
    let key = unit.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    UNIT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or(key)
}

/// Major ion concentrations reported in ug/l are stored as mg/l.
fn convert_micrograms(row: &mut CastRow) {
    if row.text("Unit") != Some("ug/l") {
        return;
    }
    if let Some(value) = row.float("ResultValue") {
        row.set("ResultValue", Value::Float(value / 1000.0));
        row.set("Unit", Value::Text("mg/l".to_string()));
    }
}
