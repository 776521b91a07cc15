pub mod color;
mod light;
mod result;
mod scene;
mod selector;

pub use color::Color;
pub use light::{Capabilities, DirtyProperty, Group, Light, Location, MutableProperty, ProductInformation};
pub use result::{OperationResult, Status};
pub use scene::{Scene, SceneState};
pub use selector::{Selector, SelectorError};

pub(crate) use light::LightUpdate;
