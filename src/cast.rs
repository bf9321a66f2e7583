use crate::row::{CastRow, MappedRow, OrderedRow, SqlRow, Value};
use crate::schema::{FieldType, Schema, SRID};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

pub struct Caster;

impl Caster {
    /// Coerce every schema field of `row` to its declared type.
    ///
    /// Values that fail to parse, and fields the row does not carry, become
    /// `Value::Null`. Fields outside the schema are dropped.
    pub fn cast(row: &MappedRow, schema: &Schema) -> CastRow {
        schema
            .fields()
            .iter()
            .map(|(field, ty)| {
                let value = row
                    .get(field)
                    .map(|raw| cast_value(raw, *ty))
                    .unwrap_or(Value::Null);
                (*field, value)
            })
            .collect()
    }

    /// Render an ordered row into SQL literals.
    pub fn cast_for_sql(row: &OrderedRow) -> SqlRow {
        SqlRow(row.0.iter().map(to_sql_literal).collect())
    }
}

pub fn cast_value(raw: &str, ty: FieldType) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }

    let value = match ty {
        FieldType::Text => Some(Value::Text(raw.to_string())),
        FieldType::Float => parse_optional_float(raw).map(Value::Float),
        FieldType::Int => parse_optional_int(raw).map(Value::Int),
        FieldType::Date => parse_date(raw).map(Value::Date),
        FieldType::Time => parse_time(raw).map(Value::Time),
        // only the reprojection step produces geometry
        FieldType::Geometry => None,
    };

    value.unwrap_or(Value::Null)
}

fn parse_optional_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_optional_int(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    // "3.0" style integers
    parse_optional_float(s)
        .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
        .map(|v| v as i64)
}

/// Parse a date with or without a time part. Date-only values land at
/// midnight.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

pub fn to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "Null".to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        // Debug keeps the decimal point: -114.0, 0.0
        Value::Float(v) => format!("{:?}", v),
        Value::Int(v) => v.to_string(),
        Value::Date(dt) => {
            if dt.time() == NaiveTime::MIN {
                format!("Cast('{}' as timestamp)", dt.format("%Y-%m-%d"))
            } else {
                format!("Cast('{}' as timestamp)", dt.format("%Y-%m-%d %H:%M:%S"))
            }
        }
        Value::Time(t) => format!("'{}'", t.format("%H:%M:%S")),
        Value::Point { x, y } => format!(
            "ST_GeomFromText('POINT ({} {})', {})",
            round6(*x),
            round6(*y),
            SRID
        ),
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}
