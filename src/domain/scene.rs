use crate::domain::color::Color;
use crate::domain::selector::Selector;

/// One entry of a scene: the lights it addresses and the partial state it applies to them.
/// Scenes published by the remote API conventionally address lights by id, but any selector
/// is accepted.
#[derive(Clone, PartialEq, Debug)]
pub struct SceneState {
    pub selector: Selector,
    pub power: Option<bool>,
    pub brightness: Option<f64>,
    pub color: Option<Color>,
}

/// A named, ordered collection of partial light states. Identity is the `uuid`.
#[derive(Clone, PartialEq, Debug)]
pub struct Scene {
    pub uuid: String,
    pub name: String,
    pub states: Vec<SceneState>,
}

impl Scene {
    pub fn to_selector(&self) -> Selector {
        Selector::Scene(self.uuid.clone())
    }
}
