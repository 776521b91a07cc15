use crate::domain::{Color, Light, OperationResult, Scene, Selector};
use crate::error::ClientError;
use async_trait::async_trait;

/// The remote device-control service the cache sits in front of.
///
/// The core only depends on this seam; how requests are built, serialized, retried or
/// authenticated is the implementation's concern. [`crate::http::HttpRemoteService`] talks
/// to the cloud aggregator; tests substitute a scripted fake.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetches the current snapshot of every light the selector matches.
    async fn fetch_lights(&self, selector: &Selector) -> Result<Vec<Light>, ClientError>;

    /// Fetches every scene known to the account.
    async fn fetch_scenes(&self) -> Result<Vec<Scene>, ClientError>;

    /// Applies the given partial state to every light the selector matches, transitioning
    /// over `duration` seconds.
    async fn apply_state(
        &self,
        selector: &Selector,
        power: Option<bool>,
        color: Option<Color>,
        brightness: Option<f64>,
        duration: f32,
    ) -> Result<Vec<OperationResult>, ClientError>;

    /// Activates a scene. The selector must be a scene selector.
    async fn activate_scene(&self, selector: &Selector, duration: Option<f32>) -> Result<Vec<OperationResult>, ClientError>;

    /// Inverts the power state of every light the selector matches. Results carry each
    /// light's resolved post-toggle power.
    async fn toggle_power(&self, selector: &Selector, duration: f32) -> Result<Vec<OperationResult>, ClientError>;
}
