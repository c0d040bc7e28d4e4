//! GRIB2 parameter lookup tables.
//!
//! Translates (discipline, category, number) codes into the short names and
//! native units that field selection matches against. Names are the NCEP
//! abbreviations in lowercase (`tmp`, `ugrd`, `refc`).

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Name and native units of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub units: String,
}

/// GRIB2 parameter lookup table.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    parameters: HashMap<ParamKey, ParameterInfo>,
}

impl ParameterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering the NCEP surface products fetched from the filter service.
    pub fn ncep() -> Self {
        let mut table = Self::new();
        for &(key, name, units) in NCEP_PARAMETERS {
            table.add_parameter(key.0, key.1, key.2, name, units);
        }
        table
    }

    /// Add or replace a parameter mapping.
    pub fn add_parameter(
        &mut self,
        discipline: u8,
        category: u8,
        number: u8,
        name: impl Into<String>,
        units: impl Into<String>,
    ) {
        self.parameters.insert(
            (discipline, category, number),
            ParameterInfo {
                name: name.into(),
                units: units.into(),
            },
        );
    }

    /// Look up a parameter by its codes.
    ///
    /// Unknown codes map to `p{discipline}_{category}_{number}` with no units.
    pub fn lookup(&self, discipline: u8, category: u8, number: u8) -> ParameterInfo {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| ParameterInfo {
                name: format!("p{}_{}_{}", discipline, category, number),
                units: String::new(),
            })
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

const NCEP_PARAMETERS: &[(ParamKey, &str, &str)] = &[
    // Temperature
    ((0, 0, 0), "tmp", "K"),
    ((0, 0, 6), "dpt", "K"),
    // Moisture
    ((0, 1, 1), "rh", "%"),
    ((0, 1, 3), "pwat", "kg m-2"),
    ((0, 1, 7), "prate", "kg m-2 s-1"),
    ((0, 1, 8), "apcp", "kg m-2"),
    ((0, 1, 13), "weasd", "kg m-2"),
    ((0, 1, 29), "asnow", "m"),
    ((0, 1, 192), "crain", "-"),
    ((0, 1, 193), "cfrzr", "-"),
    ((0, 1, 194), "cicep", "-"),
    ((0, 1, 195), "csnow", "-"),
    // Momentum
    ((0, 2, 1), "wind", "m s-1"),
    ((0, 2, 2), "ugrd", "m s-1"),
    ((0, 2, 3), "vgrd", "m s-1"),
    ((0, 2, 22), "gust", "m s-1"),
    // Mass
    ((0, 3, 0), "pres", "Pa"),
    ((0, 3, 1), "prmsl", "Pa"),
    ((0, 3, 5), "hgt", "gpm"),
    ((0, 3, 192), "mslma", "Pa"),
    // Cloud
    ((0, 6, 1), "tcdc", "%"),
    // Stability
    ((0, 7, 6), "cape", "J kg-1"),
    ((0, 7, 7), "cin", "J kg-1"),
    // Radar
    ((0, 16, 195), "refd", "dBZ"),
    ((0, 16, 196), "refc", "dBZ"),
    // Physical atmospheric properties
    ((0, 19, 0), "vis", "m"),
];
