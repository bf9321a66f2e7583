//! The cast → tag/reproject → normalize → derive → render path shared by
//! the full load and the update.

use crate::balance::{BalanceCharges, ChargeBalancer};
use crate::cast::Caster;
use crate::normalize::{Normalize, WaterNormalizer};
use crate::reproject::{Reproject, Utm};
use crate::row::{CastRow, MappedRow, SqlRow, Value};
use crate::schema::{self, Schema};

pub struct Transformer {
    station_schema: Schema,
    result_schema: Schema,
    data_source: String,
    reprojector: Box<dyn Reproject>,
    normalizer: Box<dyn Normalize>,
    balancer: Box<dyn BalanceCharges>,
}

impl Transformer {
    pub fn new(data_source: &str) -> Self {
        Self {
            station_schema: schema::station(),
            result_schema: schema::result(),
            data_source: data_source.to_string(),
            reprojector: Box::new(Utm::default()),
            normalizer: Box::new(WaterNormalizer),
            balancer: Box::new(ChargeBalancer),
        }
    }

    pub fn with_reprojector(mut self, reprojector: impl Reproject + 'static) -> Self {
        self.reprojector = Box::new(reprojector);
        self
    }

    pub fn station_schema(&self) -> &Schema {
        &self.station_schema
    }

    pub fn result_schema(&self) -> &Schema {
        &self.result_schema
    }

    /// Tag the data source and, when the schema has a geometry field and
    /// both coordinates are set, fill it with the projected point.
    pub fn update_row(&self, mut row: CastRow, schema: &Schema) -> CastRow {
        row.set("DataSource", Value::Text(self.data_source.clone()));

        let Some(geometry_field) = schema.geometry_field() else {
            return row;
        };
        let (Some(lon), Some(lat)) = (row.float("Lon_X"), row.float("Lat_Y")) else {
            return row;
        };

        let (x, y) = self.reprojector.to_projected(lon, lat);
        row.set(geometry_field, Value::Point { x, y });
        row
    }

    pub fn station_row(&self, row: &MappedRow) -> SqlRow {
        let schema = &self.station_schema;
        let row = Caster::cast(row, schema);
        let row = self.update_row(row, schema);
        let row = self.normalizer.normalize_station(row);
        let row = self.normalizer.reorder_filter(&row, schema);
        Caster::cast_for_sql(&row)
    }

    /// Rows for one sample id, followed by its derived charge balance rows.
    pub fn result_rows(&self, samples: &[MappedRow]) -> Vec<SqlRow> {
        let schema = &self.result_schema;
        let mut rows: Vec<CastRow> = samples
            .iter()
            .map(|sample| Caster::cast(sample, schema))
            .map(|row| self.update_row(row, schema))
            .map(|row| self.normalizer.normalize_sample(row))
            .collect();

        let balances = self.balancer.get_charge_balance(&rows);
        rows.extend(balances);

        rows.iter()
            .map(|row| self.normalizer.reorder_filter(row, schema))
            .map(|row| Caster::cast_for_sql(&row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Reproject for Fixed {
        fn to_projected(&self, _longitude: f64, _latitude: f64) -> (f64, f64) {
            (1.0, 2.0)
        }
    }

    fn station(lon: &str, lat: &str) -> MappedRow {
        vec![
            ("StationId", "ORG_WQX-1"),
            ("Lon_X", lon),
            ("Lat_Y", lat),
            ("Shape", ""),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_update_row_sets_point_and_data_source() {
        let transformer = Transformer::new("WQP").with_reprojector(Fixed);
        let row = Caster::cast(&station("-114", "40"), transformer.station_schema());

        let row = transformer.update_row(row, &schema::station());

        assert_eq!(row.get("Shape"), &Value::Point { x: 1.0, y: 2.0 });
        assert_eq!(row.text("DataSource"), Some("WQP"));
    }

    #[test]
    fn test_update_row_without_longitude_leaves_shape_null() {
        let transformer = Transformer::new("WQP").with_reprojector(Fixed);
        let row = Caster::cast(&station("", "40"), transformer.station_schema());

        let row = transformer.update_row(row, &schema::station());

        assert!(row.get("Shape").is_null());
        assert_eq!(row.text("DataSource"), Some("WQP"));
    }

    #[test]
    fn test_update_row_without_geometry_field() {
        let transformer = Transformer::new("WQP").with_reprojector(Fixed);
        let row: CastRow = vec![("Lon_X", Value::Float(-114.0)), ("Lat_Y", Value::Float(40.0))]
            .into_iter()
            .collect();

        let row = transformer.update_row(row, &schema::result());

        assert!(!row.contains("Shape"));
    }

    #[test]
    fn test_station_row_is_schema_ordered_and_stripped() {
        let transformer = Transformer::new("WQP").with_reprojector(Fixed);

        let sql = transformer.station_row(&station("-114", "40"));

        assert_eq!(sql.values().len(), schema::station().fields().len());
        assert_eq!(sql.values()[2], "'ORG-1'");
        assert_eq!(sql.values()[7], "-114.0");
        assert_eq!(
            sql.values().last().map(String::as_str),
            Some("ST_GeomFromText('POINT (1 2)', 26912)")
        );
    }
}
