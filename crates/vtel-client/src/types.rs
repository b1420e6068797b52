//! Request and response types for vtel client

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VtelError;

// =============================================================================
// Envelope Types
// =============================================================================

/// Embedded error fields carried by any API payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ApiErrorBody {
    /// Human-readable message, if the payload carried one
    pub fn message(&self) -> Option<String> {
        match (self.error.as_deref(), self.error_description.as_deref()) {
            (Some(e), Some(d)) if !e.is_empty() && !d.is_empty() => Some(format!("{}: {}", e, d)),
            (Some(e), _) if !e.is_empty() => Some(e.to_string()),
            (_, Some(d)) if !d.is_empty() => Some(d.to_string()),
            _ => None,
        }
    }

    /// Convert a populated `error` field into an application error
    pub fn into_error(self, context: &str) -> Option<VtelError> {
        match self.error {
            Some(error) if !error.is_empty() => Some(VtelError::Application {
                context: context.to_string(),
                error,
                description: self.error_description.filter(|d| !d.is_empty()),
            }),
            _ => None,
        }
    }
}

/// `{ "response": ..., "error": ..., "error_description": ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: Option<T>,
    #[serde(flatten)]
    pub error: ApiErrorBody,
}

// =============================================================================
// Opaque Values
// =============================================================================

/// A field whose wire type varies between vehicles and firmware versions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpaqueValue {
    #[default]
    Absent,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl OpaqueValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "-"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

// =============================================================================
// State Resources
// =============================================================================

/// Named state resources under `/vehicles/{id}/data_request/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Charge,
    Climate,
    Drive,
    GuiSettings,
    Vehicle,
    Service,
}

impl Resource {
    /// Resources fetched by a composite snapshot, in request order
    pub const SNAPSHOT_ORDER: [Resource; 5] = [
        Resource::Climate,
        Resource::Drive,
        Resource::GuiSettings,
        Resource::Vehicle,
        Resource::Charge,
    ];

    /// Path segment of the resource
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "charge_state",
            Self::Climate => "climate_state",
            Self::Drive => "drive_state",
            Self::GuiSettings => "gui_settings",
            Self::Vehicle => "vehicle_state",
            Self::Service => "service_data",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "charge" | "charge_state" => Ok(Self::Charge),
            "climate" | "climate_state" => Ok(Self::Climate),
            "drive" | "drive_state" => Ok(Self::Drive),
            "gui" | "gui_settings" => Ok(Self::GuiSettings),
            "vehicle" | "vehicle_state" => Ok(Self::Vehicle),
            "service" | "service_data" => Ok(Self::Service),
            other => Err(format!("unknown state resource: {}", other)),
        }
    }
}

/// One decoded state resource
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "resource", content = "state", rename_all = "snake_case")]
pub enum SubState {
    Charge(ChargeState),
    Climate(ClimateState),
    Drive(DriveState),
    GuiSettings(GuiSettings),
    Vehicle(VehicleState),
    Service(ServiceData),
}

impl SubState {
    pub fn resource(&self) -> Resource {
        match self {
            Self::Charge(_) => Resource::Charge,
            Self::Climate(_) => Resource::Climate,
            Self::Drive(_) => Resource::Drive,
            Self::GuiSettings(_) => Resource::GuiSettings,
            Self::Vehicle(_) => Resource::Vehicle,
            Self::Service(_) => Resource::Service,
        }
    }
}

/// Composite of independently fetched sub-states
///
/// A `None` field was not fetched, never "the vehicle has no such state".
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateSnapshot {
    pub charge: Option<ChargeState>,
    pub climate: Option<ClimateState>,
    pub drive: Option<DriveState>,
    pub gui_settings: Option<GuiSettings>,
    pub vehicle: Option<VehicleState>,
    pub service: Option<ServiceData>,
}

impl StateSnapshot {
    /// Store a fetched sub-state in its slot
    pub fn insert(&mut self, state: SubState) {
        match state {
            SubState::Charge(s) => self.charge = Some(s),
            SubState::Climate(s) => self.climate = Some(s),
            SubState::Drive(s) => self.drive = Some(s),
            SubState::GuiSettings(s) => self.gui_settings = Some(s),
            SubState::Vehicle(s) => self.vehicle = Some(s),
            SubState::Service(s) => self.service = Some(s),
        }
    }

    /// Whether the slot for `resource` is filled
    pub fn contains(&self, resource: Resource) -> bool {
        match resource {
            Resource::Charge => self.charge.is_some(),
            Resource::Climate => self.climate.is_some(),
            Resource::Drive => self.drive.is_some(),
            Resource::GuiSettings => self.gui_settings.is_some(),
            Resource::Vehicle => self.vehicle.is_some(),
            Resource::Service => self.service.is_some(),
        }
    }
}

// =============================================================================
// Sub-state Records
// =============================================================================

/// Charging subsystem state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeState {
    pub charging_state: Option<String>,
    pub charge_limit_soc: Option<i64>,
    pub charge_limit_soc_std: Option<i64>,
    pub charge_limit_soc_min: Option<i64>,
    pub charge_limit_soc_max: Option<i64>,
    pub charge_to_max_range: Option<bool>,
    pub battery_heater_on: Option<bool>,
    pub not_enough_power_to_heat: Option<bool>,
    pub max_range_charge_counter: Option<i64>,
    pub fast_charger_present: Option<bool>,
    pub fast_charger_type: Option<String>,
    pub fast_charger_brand: Option<String>,
    pub battery_range: Option<f64>,
    pub est_battery_range: Option<f64>,
    pub ideal_battery_range: Option<f64>,
    pub battery_level: Option<i64>,
    pub usable_battery_level: Option<i64>,
    pub battery_current: OpaqueValue,
    pub charge_energy_added: Option<f64>,
    pub charge_miles_added_rated: Option<f64>,
    pub charge_miles_added_ideal: Option<f64>,
    pub charger_voltage: OpaqueValue,
    pub charger_pilot_current: OpaqueValue,
    pub charger_actual_current: OpaqueValue,
    pub charger_power: OpaqueValue,
    pub charger_phases: OpaqueValue,
    pub time_to_full_charge: Option<f64>,
    pub minutes_to_full_charge: Option<i64>,
    pub trip_charging: OpaqueValue,
    pub charge_rate: Option<f64>,
    pub charge_port_door_open: Option<bool>,
    pub charge_port_latch: Option<String>,
    pub charge_port_cold_weather_mode: Option<bool>,
    pub motorized_charge_port: Option<bool>,
    pub scheduled_charging_start_time: OpaqueValue,
    pub scheduled_charging_pending: Option<bool>,
    pub user_charge_enable_request: OpaqueValue,
    pub charge_enable_request: Option<bool>,
    pub charge_current_request: Option<i64>,
    pub charge_current_request_max: Option<i64>,
    pub managed_charging_active: Option<bool>,
    pub managed_charging_user_canceled: Option<bool>,
    pub managed_charging_start_time: OpaqueValue,
    pub conn_charge_cable: Option<String>,
    pub eu_vehicle: Option<bool>,
}

/// Climate subsystem state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateState {
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
    pub driver_temp_setting: Option<f64>,
    pub passenger_temp_setting: Option<f64>,
    pub left_temp_direction: Option<f64>,
    pub right_temp_direction: Option<f64>,
    pub min_avail_temp: Option<f64>,
    pub max_avail_temp: Option<f64>,
    pub is_auto_conditioning_on: Option<bool>,
    pub is_front_defroster_on: Option<bool>,
    pub is_rear_defroster_on: Option<bool>,
    pub is_climate_on: Option<bool>,
    pub is_preconditioning: Option<bool>,
    pub fan_status: OpaqueValue,
    pub seat_heater_left: Option<i64>,
    pub seat_heater_right: Option<i64>,
    pub seat_heater_rear_left: Option<i64>,
    pub seat_heater_rear_right: Option<i64>,
    pub seat_heater_rear_center: Option<i64>,
    pub seat_heater_rear_right_back: Option<i64>,
    pub seat_heater_rear_left_back: Option<i64>,
    pub smart_preconditioning: Option<bool>,
    pub battery_heater: Option<bool>,
    pub battery_heater_no_power: OpaqueValue,
    pub climate_keeper_mode: Option<String>,
    pub defrost_mode: Option<i64>,
    pub remote_heater_control_enabled: Option<bool>,
    pub side_mirror_heaters: Option<bool>,
    pub wiper_blade_heater: Option<bool>,
}

/// Drive subsystem state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveState {
    pub shift_state: OpaqueValue,
    pub speed: OpaqueValue,
    pub power: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<i64>,
    pub gps_as_of: Option<i64>,
    pub native_latitude: Option<f64>,
    pub native_longitude: Option<f64>,
    pub native_location_supported: Option<i64>,
    pub native_type: Option<String>,
}

/// Display preferences configured in the vehicle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiSettings {
    pub gui_distance_units: Option<String>,
    pub gui_temperature_units: Option<String>,
    pub gui_charge_rate_units: Option<String>,
    pub gui_24_hour_time: Option<bool>,
    pub gui_range_display: Option<String>,
    pub show_range_units: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaState {
    pub remote_control_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftwareUpdate {
    pub download_perc: Option<i64>,
    pub expected_duration_sec: Option<i64>,
    pub install_perc: Option<i64>,
    pub status: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedLimitMode {
    pub active: Option<bool>,
    pub current_limit_mph: Option<f64>,
    pub max_limit_mph: Option<f64>,
    pub min_limit_mph: Option<f64>,
    pub pin_code_set: Option<bool>,
}

/// Body, lock and software state of the vehicle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    pub api_version: Option<i64>,
    pub autopark_state: Option<String>,
    pub autopark_state_v2: Option<String>,
    pub calendar_supported: Option<bool>,
    pub parsed_calendar_supported: Option<bool>,
    pub car_type: Option<String>,
    pub car_version: Option<String>,
    pub center_display_state: Option<i64>,
    pub dark_rims: Option<bool>,
    pub exterior_color: Option<String>,
    pub roof_color: Option<String>,
    pub wheel_type: Option<String>,
    pub has_spoiler: Option<bool>,
    pub spoiler_type: Option<String>,
    pub perf_config: Option<String>,
    pub rhd: Option<bool>,
    pub seat_type: Option<i64>,
    pub third_row_seats: Option<String>,
    pub rear_seat_heaters: Option<i64>,
    /// Driver front door
    pub df: Option<i64>,
    /// Driver rear door
    pub dr: Option<i64>,
    /// Passenger front door
    pub pf: Option<i64>,
    /// Passenger rear door
    pub pr: Option<i64>,
    /// Front trunk
    pub ft: Option<i64>,
    /// Rear trunk
    pub rt: Option<i64>,
    pub fd_window: Option<i64>,
    pub fp_window: Option<i64>,
    pub rd_window: Option<i64>,
    pub rp_window: Option<i64>,
    pub locked: Option<bool>,
    pub is_user_present: Option<bool>,
    pub notifications_supported: Option<bool>,
    pub odometer: Option<f64>,
    pub remote_start: Option<bool>,
    pub remote_start_enabled: Option<bool>,
    pub remote_start_supported: Option<bool>,
    pub sentry_mode: Option<bool>,
    pub sentry_mode_available: Option<bool>,
    pub sun_roof_installed: OpaqueValue,
    pub sun_roof_percent_open: OpaqueValue,
    pub sun_roof_state: Option<String>,
    pub valet_mode: Option<bool>,
    pub valet_pin_needed: Option<bool>,
    pub vehicle_name: Option<String>,
    pub media_state: Option<MediaState>,
    pub software_update: Option<SoftwareUpdate>,
    pub speed_limit_mode: Option<SpeedLimitMode>,
}

/// Service visit status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceData {
    pub service_etc: Option<DateTime<Utc>>,
    pub service_status: Option<String>,
}

// =============================================================================
// Vehicle Types
// =============================================================================

/// One entry of `GET /vehicles`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    /// Identifier used by the REST endpoints
    pub id: u64,
    /// Identifier used by the streaming endpoint
    pub vehicle_id: u64,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub option_codes: Option<String>,
    #[serde(default)]
    pub in_service: OpaqueValue,
    /// Single-use streaming tokens, consumed front to back
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Remaining fields, carried as-is
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Vehicle {
    /// Move this vehicle's streaming tokens into a handle
    ///
    /// The tokens leave `self`, so a second handle for the same vehicle gets
    /// none of them.
    pub fn stream_handle(&mut self) -> VehicleHandle {
        VehicleHandle::new(self.vehicle_id, std::mem::take(&mut self.tokens))
    }
}

/// `GET /vehicles` response
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleList {
    #[serde(default)]
    pub response: Vec<Vehicle>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// Streaming identity of a vehicle plus its remaining single-use tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleHandle {
    vehicle_id: u64,
    tokens: VecDeque<String>,
}

impl VehicleHandle {
    pub fn new(vehicle_id: u64, tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            vehicle_id,
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn vehicle_id(&self) -> u64 {
        self.vehicle_id
    }

    /// Remove and return the next unused token
    pub fn next_token(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }

    pub fn remaining_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.tokens.is_empty()
    }
}

// =============================================================================
// Charging Sites
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationCharger {
    #[serde(default)]
    pub location: GeoLocation,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub charger_type: String,
    #[serde(default)]
    pub distance_miles: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supercharger {
    #[serde(default)]
    pub location: GeoLocation,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub charger_type: String,
    #[serde(default)]
    pub distance_miles: f64,
    #[serde(default)]
    pub available_stalls: u32,
    #[serde(default)]
    pub total_stalls: u32,
    #[serde(default)]
    pub site_closed: bool,
}

/// `GET /vehicles/{id}/nearby_charging_sites` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearbyChargingSites {
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub congestion_sync_time_utc_secs: Option<DateTime<Utc>>,
    #[serde(default)]
    pub destination_charging: Vec<DestinationCharger>,
    #[serde(default)]
    pub superchargers: Vec<Supercharger>,
    /// Unix milliseconds on the wire
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_opaque_value_variants() {
        let values: Vec<OpaqueValue> =
            serde_json::from_str(r#"[null, true, 12, 1.5, "auto"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                OpaqueValue::Absent,
                OpaqueValue::Bool(true),
                OpaqueValue::Number(12.into()),
                OpaqueValue::Number(serde_json::Number::from_f64(1.5).unwrap()),
                OpaqueValue::Text("auto".to_string()),
            ]
        );
        assert_eq!(values[2].as_i64(), Some(12));
        assert_eq!(values[4].as_str(), Some("auto"));
        assert!(values[0].is_absent());
    }

    #[test]
    fn test_missing_and_null_fields_decode_as_absent() {
        let state: DriveState =
            serde_json::from_str(r#"{"shift_state": null, "speed": 65, "power": null}"#).unwrap();
        assert!(state.shift_state.is_absent());
        assert_eq!(state.speed.as_i64(), Some(65));
        assert_eq!(state.power, None);
        assert_eq!(state.latitude, None);
    }

    #[test]
    fn test_envelope_with_embedded_error() {
        let envelope: Envelope<ChargeState> = serde_json::from_str(
            r#"{"response": null, "error": "vehicle unavailable", "error_description": "asleep"}"#,
        )
        .unwrap();
        assert!(envelope.response.is_none());
        let err = envelope.error.into_error("charge_state").unwrap();
        assert_eq!(err.to_string(), "charge_state: vehicle unavailable: asleep");
    }

    #[test]
    fn test_envelope_empty_error_is_not_an_error() {
        let envelope: Envelope<GuiSettings> = serde_json::from_str(
            r#"{"response": {"gui_distance_units": "mi/hr"}, "error": ""}"#,
        )
        .unwrap();
        assert!(envelope.error.into_error("gui_settings").is_none());
        assert_eq!(
            envelope.response.unwrap().gui_distance_units.as_deref(),
            Some("mi/hr")
        );
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(Resource::GuiSettings.as_str(), "gui_settings");
        assert_eq!("gui".parse::<Resource>().unwrap(), Resource::GuiSettings);
        assert_eq!("charge_state".parse::<Resource>().unwrap(), Resource::Charge);
        assert!("tires".parse::<Resource>().is_err());
    }

    #[test]
    fn test_snapshot_insert() {
        let mut snapshot = StateSnapshot::default();
        snapshot.insert(SubState::Climate(ClimateState::default()));
        assert!(snapshot.contains(Resource::Climate));
        assert!(!snapshot.contains(Resource::Charge));
    }

    #[test]
    fn test_vehicle_handle_consumes_front_to_back() {
        let mut handle = VehicleHandle::new(123, vec!["456".to_string(), "789".to_string()]);
        assert_eq!(handle.remaining_tokens(), 2);
        assert_eq!(handle.next_token().as_deref(), Some("456"));
        assert_eq!(handle.next_token().as_deref(), Some("789"));
        assert_eq!(handle.next_token(), None);
        assert!(handle.is_exhausted());
    }

    #[test]
    fn test_vehicle_list_decoding() {
        let list: VehicleList = serde_json::from_str(
            r#"{"response": [{"id": 1, "vehicle_id": 123, "vin": "5YJSA1CN5DFP00101",
                "display_name": "Nikola", "state": "online", "tokens": ["456", "789"],
                "color": null, "calendar_enabled": true}], "count": 1}"#,
        )
        .unwrap();
        let mut vehicle = list.response[0].clone();
        assert_eq!(vehicle.vehicle_id, 123);
        assert_eq!(
            vehicle.extra.get("calendar_enabled"),
            Some(&serde_json::Value::Bool(true))
        );
        assert_eq!(vehicle.stream_handle().remaining_tokens(), 2);
    }

    #[test]
    fn test_stream_handle_takes_tokens() {
        let mut vehicle: Vehicle = serde_json::from_str(
            r#"{"id": 1, "vehicle_id": 123, "tokens": ["456", "789"]}"#,
        )
        .unwrap();

        let mut first = vehicle.stream_handle();
        assert_eq!(first.next_token().as_deref(), Some("456"));
        assert!(vehicle.tokens.is_empty());

        let second = vehicle.stream_handle();
        assert_eq!(second.vehicle_id(), 123);
        assert!(second.is_exhausted());
    }

    #[test]
    fn test_nearby_charging_sites_timestamps() {
        let sites: NearbyChargingSites = serde_json::from_str(
            r#"{"congestion_sync_time_utc_secs": 1460905367,
                "destination_charging": [{"location": {"lat": 30.1, "long": -100.2},
                    "name": "Hotel", "type": "destination", "distance_miles": 1.5}],
                "superchargers": [{"location": {"lat": 30.3, "long": -100.4},
                    "name": "Junction", "type": "supercharger", "distance_miles": 8.2,
                    "available_stalls": 3, "total_stalls": 8, "site_closed": false}],
                "timestamp": 1460905367123}"#,
        )
        .unwrap();
        assert_eq!(sites.congestion_sync_time_utc_secs.unwrap().timestamp(), 1_460_905_367);
        assert_eq!(sites.timestamp.unwrap().timestamp_millis(), 1_460_905_367_123);
        assert_eq!(sites.superchargers[0].available_stalls, 3);
        assert_eq!(sites.destination_charging[0].charger_type, "destination");
    }
}
