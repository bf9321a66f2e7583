//! Destination table definitions.

/// Spatial reference of the `Shape` column (NAD83 / UTM zone 12N).
pub const SRID: i32 = 26912;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Float,
    Int,
    Date,
    Time,
    Geometry,
}

#[derive(Debug, Clone)]
pub struct Schema {
    table: &'static str,
    fields: Vec<(&'static str, FieldType)>,
}

impl Schema {
    pub fn new(table: &'static str, fields: Vec<(&'static str, FieldType)>) -> Self {
        Self { table, fields }
    }

    pub fn fields(&self) -> &[(&'static str, FieldType)] {
        &self.fields
    }

    pub fn geometry_field(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|(_, ty)| *ty == FieldType::Geometry)
            .map(|(field, _)| *field)
    }

    /// `INSERT` statement with a single `{}` placeholder for the values.
    pub fn insert_template(&self) -> InsertTemplate {
        let columns = self
            .fields
            .iter()
            .map(|(field, _)| format!("\"{}\"", field))
            .collect::<Vec<_>>()
            .join(", ");
        InsertTemplate(format!(
            "INSERT INTO \"{}\" ({}) VALUES ({{}})",
            self.table, columns
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTemplate(String);

impl InsertTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, values: &str) -> String {
        self.0.replacen("{}", values, 1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn station() -> Schema {
    use FieldType::*;
    Schema::new(
        "Stations",
        vec![
            ("OrgId", Text),
            ("OrgName", Text),
            ("StationId", Text),
            ("StationName", Text),
            ("StationType", Text),
            ("StationComment", Text),
            ("HUC8", Text),
            ("Lon_X", Float),
            ("Lat_Y", Float),
            ("HorAcc", Float),
            ("HorAccUnit", Text),
            ("HorCollMeth", Text),
            ("HorRef", Text),
            ("Elev", Float),
            ("ElevUnit", Text),
            ("ElevAcc", Float),
            ("ElevAccUnit", Text),
            ("ElevMeth", Text),
            ("ElevRef", Text),
            ("StateCode", Int),
            ("CountyCode", Int),
            ("Aquifer", Text),
            ("FmType", Text),
            ("AquiferType", Text),
            ("ConstDate", Date),
            ("Depth", Float),
            ("DepthUnit", Text),
            ("HoleDepth", Float),
            ("HoleDUnit", Text),
            ("demELEVm", Float),
            ("DataSource", Text),
            ("WIN", Int),
            ("Shape", Geometry),
        ],
    )
}

pub fn result() -> Schema {
    use FieldType::*;
    Schema::new(
        "Results",
        vec![
            ("AnalysisDate", Date),
            ("AnalytMeth", Text),
            ("AnalytMethId", Text),
            ("AutoQual", Text),
            ("CAS_Reg", Text),
            ("Chrg", Float),
            ("DataSource", Text),
            ("DetectCond", Text),
            ("IdNum", Int),
            ("LabComments", Text),
            ("LabName", Text),
            ("Lat_Y", Float),
            ("LimitType", Text),
            ("Lon_X", Float),
            ("MDL", Float),
            ("MDLUnit", Text),
            ("MethodDescript", Text),
            ("OrgId", Text),
            ("OrgName", Text),
            ("Param", Text),
            ("ParamGroup", Text),
            ("ProjectId", Text),
            ("QualCode", Text),
            ("ResultComment", Text),
            ("ResultStatus", Text),
            ("ResultValue", Float),
            ("SampComment", Text),
            ("SampDepth", Float),
            ("SampDepthRef", Text),
            ("SampDepthU", Text),
            ("SampEquip", Text),
            ("SampFrac", Text),
            ("SampleDate", Date),
            ("SampleTime", Time),
            ("SampleId", Text),
            ("SampMedia", Text),
            ("SampMeth", Text),
            ("SampMethName", Text),
            ("SampType", Text),
            ("StationId", Text),
            ("Unit", Text),
            ("USGSPCode", Text),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_geometry_field() {
        assert_eq!(station().geometry_field(), Some("Shape"));
        assert_eq!(result().geometry_field(), None);
    }

    #[test]
    fn test_insert_template_column_order() {
        let schema = Schema::new(
            "Stations",
            vec![("OrgId", FieldType::Text), ("Lon_X", FieldType::Float)],
        );
        let template = schema.insert_template();

        assert_eq!(
            template.as_str(),
            "INSERT INTO \"Stations\" (\"OrgId\", \"Lon_X\") VALUES ({})"
        );
        assert_eq!(
            template.render("'a',1.0"),
            "INSERT INTO \"Stations\" (\"OrgId\", \"Lon_X\") VALUES ('a',1.0)"
        );
    }

    #[test]
    fn test_schema_field_counts() {
        assert_eq!(station().fields().len(), 33);
        assert_eq!(result().fields().len(), 42);
    }
}
