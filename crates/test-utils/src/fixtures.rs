//! Common catalog fixtures.
//!
//! Built from YAML snippets in the same shape as the files under `config/`.

use forecast_common::{Catalog, ModelConfig, RegionConfig, VariableConfig};

/// Small test region: one degree square off the mid-Atlantic coast.
pub const TEST_BBOX: (f64, f64, f64, f64) = (-75.0, 38.0, -74.0, 39.0);

/// Resolution used by most tile tests.
pub const TEST_RESOLUTION: f64 = 0.1;

fn parse<T: serde::de::DeserializeOwned>(yaml: &str) -> T {
    serde_yaml::from_str(yaml).expect("fixture YAML should parse")
}

/// Hourly model with a 24 hour horizon.
pub fn hourly_model(id: &str) -> ModelConfig {
    parse(&format!(
        r#"
model:
  id: {id}
  name: "Test {id}"
source:
  base_url: "http://upstream.test/cgi-bin/filter_{id}.pl"
  dir_pattern: "/{id}.{{date}}/conus"
  file_pattern: "{id}.t{{init_hour}}z.f{{forecast_hour}}.grib2"
  availability_check_var: "var_REFC"
  forecast_hour_digits: 2
schedule:
  max_forecast_hours: 24
  forecast_hours:
    - start: 1
      step: 1
  lookback_hours: 6
retention:
  keep_runs: 2
"#
    ))
}

/// Six-hourly cycling model, 3-hourly to 240 then 6-hourly.
pub fn gfs_like_model() -> ModelConfig {
    parse(
        r#"
model:
  id: gfs
  name: "GFS"
source:
  base_url: "http://upstream.test/cgi-bin/filter_gfs_0p25.pl"
  dir_pattern: "/gfs.{date}/{init_hour}/atmos"
  file_pattern: "gfs.t{init_hour}z.pgrb2.0p25.f{forecast_hour}"
  availability_check_var: "var_TMP"
  forecast_hour_digits: 3
schedule:
  update_frequency_hours: 6
  max_forecast_hours: 384
  forecast_hours:
    - end: 240
      step: 3
    - step: 6
  hourly_override_first_hours: 120
  lookback_hours: 27
"#,
    )
}

/// 2 m temperature in Kelvin converted to Fahrenheit.
pub fn t2m_variable() -> VariableConfig {
    parse(
        r#"
id: t2m
display_name: "2m Temperature"
units: "°F"
nomads_params: [TMP]
level_params: ["lev_2_m_above_ground=on"]
field: tmp
alternate_fields: [t2m]
conversion: k_to_f
"#,
    )
}

/// A variable with no conversion, handy for exact value checks.
pub fn raw_variable(id: &str, field: &str) -> VariableConfig {
    parse(&format!(
        r#"
id: {id}
display_name: "{id}"
units: "raw"
nomads_params: [{upper}]
level_params: ["lev_surface=on"]
field: {field}
"#,
        upper = id.to_uppercase()
    ))
}

/// 10 m wind speed built from components when no speed field exists.
pub fn wind_variable() -> VariableConfig {
    parse(
        r#"
id: wind_speed_10m
display_name: "10m Wind Speed"
units: "mph"
nomads_params: [UGRD, VGRD]
level_params: ["lev_10_m_above_ground=on"]
field: wind
components: [ugrd, vgrd]
conversion: ms_to_mph
"#,
    )
}

pub fn test_region() -> RegionConfig {
    let (min_lon, min_lat, max_lon, max_lat) = TEST_BBOX;
    parse(&format!(
        r#"
id: test
name: "Test region"
bbox: {{lon_min: {min_lon}, lat_min: {min_lat}, lon_max: {max_lon}, lat_max: {max_lat}}}
default_resolution_deg: {TEST_RESOLUTION}
"#
    ))
}

/// Catalog with one hourly model, the test region and a few variables.
pub fn test_catalog(model_id: &str) -> Catalog {
    Catalog::from_parts(
        [hourly_model(model_id), gfs_like_model()],
        [t2m_variable(), wind_variable(), raw_variable("refc", "refc")],
        [test_region()],
    )
}
