//! qibla_direction tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_core::qibla::{KAABA_LAT, KAABA_LON, distance_km, qibla_direction};

use super::json_result;
use crate::error::ToolError;

/// Parameters for the qibla_direction tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QiblaParams {
    /// Latitude in degrees, -90 to 90.
    pub latitude: f64,
    /// Longitude in degrees, -180 to 180.
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QiblaOutput {
    /// Bearing in whole degrees clockwise from true north.
    pub direction: u16,
    /// Great-circle distance to the Kaaba.
    pub distance_km: f64,
}

/// Implementation of the qibla_direction tool.
pub fn qibla_impl(params: QiblaParams) -> Result<CallToolResult, McpError> {
    if !(-90.0..=90.0).contains(&params.latitude) {
        return Err(ToolError::InvalidInput(format!("latitude out of range: {}", params.latitude)).into());
    }
    if !(-180.0..=180.0).contains(&params.longitude) {
        return Err(ToolError::InvalidInput(format!("longitude out of range: {}", params.longitude)).into());
    }

    let output = QiblaOutput {
        direction: qibla_direction(params.latitude, params.longitude),
        distance_km: (distance_km(params.latitude, params.longitude, KAABA_LAT, KAABA_LON) * 10.0).round() / 10.0,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::json;

    #[test]
    fn test_london() {
        let output = json(&qibla_impl(QiblaParams { latitude: 51.5074, longitude: -0.1278 }).unwrap());
        assert_eq!(output["direction"], 119);
        let distance = output["distance_km"].as_f64().unwrap();
        assert!((4700.0..4900.0).contains(&distance));
    }

    #[test]
    fn test_out_of_range() {
        assert!(qibla_impl(QiblaParams { latitude: 91.0, longitude: 0.0 }).is_err());
        assert!(qibla_impl(QiblaParams { latitude: 0.0, longitude: -181.0 }).is_err());
        assert!(qibla_impl(QiblaParams { latitude: f64::NAN, longitude: 0.0 }).is_err());
    }
}
