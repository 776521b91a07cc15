//! Serde models for the LIFX cloud API, mapped into domain values at the module boundary.

use crate::domain::{Capabilities, Color, Group, Light, Location, OperationResult, ProductInformation, Scene, SceneState, Status};
use serde::Deserialize;
use tracing::warn;

/// The API expresses power as the strings `"on"` and `"off"`, never as a boolean.
#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PowerResponse {
    On,
    Off,
}

impl PowerResponse {
    fn is_on(self) -> bool {
        matches!(self, PowerResponse::On)
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ColorResponse {
    hue: f64,
    saturation: f64,
    kelvin: i32,
}

impl ColorResponse {
    fn into_color(self) -> Color {
        Color::new(self.hue, self.saturation, self.kelvin)
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct GroupResponse {
    id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct LocationResponse {
    id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct CapabilitiesResponse {
    #[serde(default)]
    has_color: bool,
    #[serde(default)]
    has_ir: bool,
    #[serde(default)]
    has_multizone: bool,
    #[serde(default)]
    has_variable_color_temp: bool,
    #[serde(default)]
    has_hev: bool,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ProductResponse {
    name: String,
    company: String,
    capabilities: Option<CapabilitiesResponse>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct LightResponse {
    id: String,
    power: PowerResponse,
    brightness: f64,
    color: ColorResponse,
    label: String,
    connected: bool,
    group: Option<GroupResponse>,
    location: Option<LocationResponse>,
    product: Option<ProductResponse>,
}

impl LightResponse {
    pub(crate) fn into_light(self) -> Light {
        Light::new(
            self.id,
            self.power.is_on(),
            self.brightness,
            self.color.into_color(),
            self.label,
            self.connected,
            self.group.map(|group| Group { id: group.id, name: group.name }),
            self.location.map(|location| Location { id: location.id, name: location.name }),
            self.product.map(|product| ProductInformation {
                product_name: product.name,
                manufacturer: product.company,
                capabilities: product.capabilities.map(|capabilities| Capabilities {
                    has_color: capabilities.has_color,
                    has_ir: capabilities.has_ir,
                    has_multizone: capabilities.has_multizone,
                    has_variable_color_temp: capabilities.has_variable_color_temp,
                    has_hev: capabilities.has_hev,
                }),
            }),
        )
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct SceneStateResponse {
    selector: String,
    power: Option<PowerResponse>,
    brightness: Option<f64>,
    color: Option<ColorResponse>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SceneResponse {
    uuid: String,
    name: String,
    states: Vec<SceneStateResponse>,
}

impl SceneResponse {
    /// States whose selector does not parse are dropped rather than failing the whole
    /// scene, so one malformed entry cannot hide the rest of the account.
    pub(crate) fn into_scene(self) -> Scene {
        let states = self
            .states
            .into_iter()
            .filter_map(|state| match state.selector.parse() {
                Ok(selector) => Some(SceneState {
                    selector,
                    power: state.power.map(PowerResponse::is_on),
                    brightness: state.brightness,
                    color: state.color.map(ColorResponse::into_color),
                }),
                Err(error) => {
                    warn!("⚠️ Dropping scene state with unparseable selector '{}': {error}", state.selector);
                    None
                }
            })
            .collect();

        Scene { uuid: self.uuid, name: self.name, states }
    }
}

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StatusResponse {
    Ok,
    Async,
    TimedOut,
    Offline,
}

impl StatusResponse {
    fn into_status(self) -> Status {
        match self {
            StatusResponse::Ok => Status::Ok,
            StatusResponse::Async => Status::Async,
            StatusResponse::TimedOut => Status::TimedOut,
            StatusResponse::Offline => Status::Offline,
        }
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ResultResponse {
    id: String,
    status: StatusResponse,
    /// Present only on toggle results, carrying the resolved post-toggle power.
    power: Option<PowerResponse>,
}

/// Every state-changing endpoint answers with this envelope.
#[derive(Deserialize, Debug)]
pub(crate) struct ResultsResponse {
    results: Vec<ResultResponse>,
}

impl ResultsResponse {
    pub(crate) fn into_results(self) -> Vec<OperationResult> {
        self.results
            .into_iter()
            .map(|result| OperationResult {
                id: result.id,
                status: result.status.into_status(),
                power: result.power.map(PowerResponse::is_on),
            })
            .collect()
    }
}
