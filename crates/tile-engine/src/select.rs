//! Field selection and unit conversion.

use forecast_common::VariableConfig;
use grib_reader::NativeDataset;

use crate::error::{Result, TileError};

/// Values of a variable extracted from a native dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedField {
    /// Native field (or `u+v` pair) the values came from.
    pub source: String,
    /// Native units before conversion.
    pub source_units: Option<String>,
    pub values: Vec<f32>,
}

/// Locate the variable's field without converting it.
///
/// Tries the configured field name, then each alternate name, then the
/// magnitude of the two vector components.
pub fn find_field(dataset: &NativeDataset, variable: &VariableConfig) -> Result<SelectedField> {
    let names = std::iter::once(&variable.field).chain(variable.alternate_fields.iter());
    for name in names {
        if let Some(field) = dataset.field(name) {
            return Ok(SelectedField {
                source: field.name.clone(),
                source_units: field.units.clone(),
                values: field.values.clone(),
            });
        }
    }

    if let Some([u_name, v_name]) = &variable.components {
        if let (Some(u), Some(v)) = (dataset.field(u_name), dataset.field(v_name)) {
            let values = u
                .values
                .iter()
                .zip(v.values.iter())
                .map(|(&u, &v)| (u * u + v * v).sqrt())
                .collect();
            return Ok(SelectedField {
                source: format!("{u_name}+{v_name}"),
                source_units: u.units.clone(),
                values,
            });
        }
    }

    Err(TileError::FieldNotFound {
        variable: variable.id.clone(),
        available: dataset.field_names().into_iter().map(str::to_string).collect(),
    })
}

/// Select the variable's values and apply its unit conversion.
///
/// A conversion keyed by the native unit string wins over the variable's
/// default conversion.
pub fn select_field(dataset: &NativeDataset, variable: &VariableConfig) -> Result<SelectedField> {
    let mut selected = find_field(dataset, variable)?;
    if let Some(conversion) = variable.conversion_for(selected.source_units.as_deref()) {
        conversion.apply_slice(&mut selected.values);
    }
    Ok(selected)
}
