//! Source column to destination field mapping.

use crate::row::MappedRow;

/// Source column holding the sample (activity) identifier.
pub const SAMPLE_ID_COLUMN: &str = "ActivityIdentifier";
/// Source column holding the monitoring location identifier.
pub const STATION_ID_COLUMN: &str = "MonitoringLocationIdentifier";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingEntry {
    /// Copy the value of `source` into `destination`.
    Source { source: String, destination: String },
    /// The pipeline always supplies `destination`; any source column of the
    /// same name is ignored.
    Constant { destination: String },
}

impl MappingEntry {
    pub fn source(source: &str, destination: &str) -> Self {
        MappingEntry::Source {
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    pub fn constant(destination: &str) -> Self {
        MappingEntry::Constant {
            destination: destination.to_string(),
        }
    }

    pub fn destination(&self) -> &str {
        match self {
            MappingEntry::Source { destination, .. } => destination,
            MappingEntry::Constant { destination } => destination,
        }
    }
}

/// Input accepted by [`FieldMapping::map`].
#[derive(Debug, Clone)]
pub enum RowInput {
    /// Already keyed by destination field; returned unchanged.
    Keyed(MappedRow),
    /// One row of values. Requires an external header.
    Single(Vec<String>),
    /// Many rows. Without an external header the first row is the header.
    Many(Vec<Vec<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    One(MappedRow),
    Many(Vec<MappedRow>),
}

impl Mapped {
    pub fn into_rows(self) -> Vec<MappedRow> {
        match self {
            Mapped::One(row) => vec![row],
            Mapped::Many(rows) => rows,
        }
    }
}

/// Ordered source-to-destination table for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
}

impl FieldMapping {
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    /// Destination name for a header cell. `None` drops the column.
    /// Cells absent from the table pass through unchanged.
    pub fn destination_for(&self, header: &str) -> Option<String> {
        for entry in &self.entries {
            match entry {
                MappingEntry::Source {
                    source,
                    destination,
                } if source == header => return Some(destination.clone()),
                MappingEntry::Constant { destination } if destination == header => return None,
                _ => {}
            }
        }
        Some(header.to_string())
    }

    pub fn map_header(&self, header: &[String]) -> Vec<Option<String>> {
        header.iter().map(|h| self.destination_for(h)).collect()
    }

    /// Zip values against an already mapped header. Every destination field
    /// of the table is present in the output, empty when unsourced.
    pub fn map_values(&self, header: &[Option<String>], values: Vec<String>) -> MappedRow {
        let mut row = MappedRow::new();
        for (name, value) in header.iter().zip(values) {
            if let Some(name) = name {
                row.insert(name.clone(), value);
            }
        }
        for entry in &self.entries {
            if !row.contains(entry.destination()) {
                row.insert(entry.destination(), "");
            }
        }
        row
    }

    /// Map rows to destination field names.
    ///
    /// Returns `None` when there is nothing to map: an empty `Many`, or a
    /// `Single` row without a header.
    pub fn map(&self, input: RowInput, header: Option<&[String]>) -> Option<Mapped> {
        match input {
            RowInput::Keyed(row) => Some(Mapped::One(row)),
            RowInput::Single(values) => {
                let header = self.map_header(header?);
                Some(Mapped::One(self.map_values(&header, values)))
            }
            RowInput::Many(mut rows) => {
                if rows.is_empty() {
                    return None;
                }
                let header = match header {
                    Some(h) => self.map_header(h),
                    None => {
                        let first = rows.remove(0);
                        self.map_header(&first)
                    }
                };
                Some(Mapped::Many(
                    rows.into_iter()
                        .map(|values| self.map_values(&header, values))
                        .collect(),
                ))
            }
        }
    }
}

pub fn station_mapping() -> FieldMapping {
    use MappingEntry as E;
    FieldMapping::new(vec![
        E::source("OrganizationIdentifier", "OrgId"),
        E::source("OrganizationFormalName", "OrgName"),
        E::source(STATION_ID_COLUMN, "StationId"),
        E::source("MonitoringLocationName", "StationName"),
        E::source("MonitoringLocationTypeName", "StationType"),
        E::source("MonitoringLocationDescriptionText", "StationComment"),
        E::source("HUCEightDigitCode", "HUC8"),
        E::source("LongitudeMeasure", "Lon_X"),
        E::source("LatitudeMeasure", "Lat_Y"),
        E::source("HorizontalAccuracyMeasure/MeasureValue", "HorAcc"),
        E::source("HorizontalAccuracyMeasure/MeasureUnitCode", "HorAccUnit"),
        E::source("HorizontalCollectionMethodName", "HorCollMeth"),
        E::source("HorizontalCoordinateReferenceSystemDatumName", "HorRef"),
        E::source("VerticalMeasure/MeasureValue", "Elev"),
        E::source("VerticalMeasure/MeasureUnitCode", "ElevUnit"),
        E::source("VerticalAccuracyMeasure/MeasureValue", "ElevAcc"),
        E::source("VerticalAccuracyMeasure/MeasureUnitCode", "ElevAccUnit"),
        E::source("VerticalCollectionMethodName", "ElevMeth"),
        E::source("VerticalCoordinateReferenceSystemDatumName", "ElevRef"),
        E::source("StateCode", "StateCode"),
        E::source("CountyCode", "CountyCode"),
        E::source("AquiferName", "Aquifer"),
        E::source("FormationTypeText", "FmType"),
        E::source("AquiferTypeName", "AquiferType"),
        E::source("ConstructionDateText", "ConstDate"),
        E::source("WellDepthMeasure/MeasureValue", "Depth"),
        E::source("WellDepthMeasure/MeasureUnitCode", "DepthUnit"),
        E::source("WellHoleDepthMeasure/MeasureValue", "HoleDepth"),
        E::source("WellHoleDepthMeasure/MeasureUnitCode", "HoleDUnit"),
        E::constant("demELEVm"),
        E::constant("DataSource"),
        E::constant("WIN"),
        E::constant("Shape"),
    ])
}

pub fn result_mapping() -> FieldMapping {
    use MappingEntry as E;
    FieldMapping::new(vec![
        E::source("AnalysisStartDate", "AnalysisDate"),
        E::source("ResultAnalyticalMethod/MethodName", "AnalytMeth"),
        E::source("ResultAnalyticalMethod/MethodIdentifier", "AnalytMethId"),
        E::constant("AutoQual"),
        E::constant("CAS_Reg"),
        E::constant("Chrg"),
        E::constant("DataSource"),
        E::source("ResultDetectionConditionText", "DetectCond"),
        E::constant("IdNum"),
        E::source("ResultLaboratoryCommentText", "LabComments"),
        E::source("LaboratoryName", "LabName"),
        E::constant("Lat_Y"),
        E::source("DetectionQuantitationLimitTypeName", "LimitType"),
        E::constant("Lon_X"),
        E::source("DetectionQuantitationLimitMeasure/MeasureValue", "MDL"),
        E::source("DetectionQuantitationLimitMeasure/MeasureUnitCode", "MDLUnit"),
        E::source("MethodDescriptionText", "MethodDescript"),
        E::source("OrganizationIdentifier", "OrgId"),
        E::source("OrganizationFormalName", "OrgName"),
        E::source("CharacteristicName", "Param"),
        E::constant("ParamGroup"),
        E::source("ProjectIdentifier", "ProjectId"),
        E::source("MeasureQualifierCode", "QualCode"),
        E::source("ResultCommentText", "ResultComment"),
        E::source("ResultStatusIdentifier", "ResultStatus"),
        E::source("ResultMeasureValue", "ResultValue"),
        E::source("ActivityCommentText", "SampComment"),
        E::source("ActivityDepthHeightMeasure/MeasureValue", "SampDepth"),
        E::source("ActivityDepthAltitudeReferencePointText", "SampDepthRef"),
        E::source("ActivityDepthHeightMeasure/MeasureUnitCode", "SampDepthU"),
        E::source("SampleCollectionEquipmentName", "SampEquip"),
        E::source("ResultSampleFractionText", "SampFrac"),
        E::source("ActivityStartDate", "SampleDate"),
        E::source("ActivityStartTime/Time", "SampleTime"),
        E::source(SAMPLE_ID_COLUMN, "SampleId"),
        E::source("ActivityMediaSubdivisionName", "SampMedia"),
        E::source("SampleCollectionMethod/MethodIdentifier", "SampMeth"),
        E::source("SampleCollectionMethod/MethodName", "SampMethName"),
        E::source("ActivityTypeCode", "SampType"),
        E::source(STATION_ID_COLUMN, "StationId"),
        E::source("ResultMeasure/MeasureUnitCode", "Unit"),
        E::source("USGSPCode", "USGSPCode"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn abc_mapping() -> FieldMapping {
        FieldMapping::new(vec![
            MappingEntry::source("a", "eh"),
            MappingEntry::source("b", "bee"),
            MappingEntry::source("c", "sea"),
        ])
    }

    #[test]
    fn test_keyed_row_is_returned_unchanged() {
        let row: MappedRow = vec![("StationId", "1")].into_iter().collect();
        let mapped = station_mapping().map(RowInput::Keyed(row.clone()), None);
        assert_eq!(mapped, Some(Mapped::One(row)));
    }

    #[test]
    fn test_empty_rows_map_to_none() {
        assert_eq!(abc_mapping().map(RowInput::Many(vec![]), None), None);
    }

    #[test]
    fn test_single_row_without_header_maps_to_none() {
        assert_eq!(abc_mapping().map(RowInput::Single(strings(&["1"])), None), None);
    }

    #[test]
    fn test_first_row_is_header_and_unknown_columns_pass_through() {
        let rows = vec![
            strings(&["a", "b", "c", SAMPLE_ID_COLUMN]),
            strings(&["a1", "b1", "c1", "1"]),
            strings(&["a2", "b2", "c2", "1"]),
        ];

        let mapped = abc_mapping().map(RowInput::Many(rows), None).unwrap().into_rows();

        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].get("eh"), Some("a1"));
        assert_eq!(mapped[0].get("bee"), Some("b1"));
        assert_eq!(mapped[0].get("sea"), Some("c1"));
        assert_eq!(mapped[0].get(SAMPLE_ID_COLUMN), Some("1"));
        assert_eq!(mapped[1].get("sea"), Some("c2"));
        assert_eq!(mapped[1].len(), 4);
    }

    #[test]
    fn test_single_row_with_external_header() {
        let header = strings(&["a", "b"]);
        let mapped = abc_mapping()
            .map(RowInput::Single(strings(&["1", "2"])), Some(&header))
            .unwrap();

        match mapped {
            Mapped::One(row) => {
                assert_eq!(row.get("eh"), Some("1"));
                assert_eq!(row.get("bee"), Some("2"));
                // every destination is present even without a source column
                assert_eq!(row.get("sea"), Some(""));
            }
            other => panic!("Expected a single row, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_fields_ignore_source_values() {
        let mapping = station_mapping();
        let header = strings(&[STATION_ID_COLUMN, "DataSource"]);
        let row = mapping.map_values(&mapping.map_header(&header), strings(&["X-1", "STORET"]));

        assert_eq!(row.get("StationId"), Some("X-1"));
        assert_eq!(row.get("DataSource"), Some(""));
        assert_eq!(row.get("Shape"), Some(""));
    }
}
