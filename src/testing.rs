//! Scripted stand-in for the remote service, used to drive the cache from tests without a
//! network. Clones share state, so tests keep a handle to steer responses after the remote
//! has been moved into a client.

use crate::domain::{Color, Light, OperationResult, Scene, Selector, Status};
use crate::error::ClientError;
use crate::remote::RemoteService;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Clone, Default)]
pub(crate) struct FakeRemote {
    inner: Arc<FakeRemoteInner>,
}

#[derive(Default)]
struct FakeRemoteInner {
    lights: Mutex<Vec<Light>>,
    scenes: Mutex<Vec<Scene>>,
    lights_error: Mutex<Option<ClientError>>,
    scenes_error: Mutex<Option<ClientError>>,
    mutation_results: Mutex<VecDeque<Result<Vec<OperationResult>, ClientError>>>,
    fetched_selectors: Mutex<Vec<Selector>>,
    apply_calls: Mutex<Vec<ApplyCall>>,
    toggle_calls: Mutex<Vec<(Selector, f32)>>,
    activate_calls: Mutex<Vec<(Selector, Option<f32>)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

#[derive(Clone, Debug)]
pub(crate) struct ApplyCall {
    pub selector: Selector,
    pub power: Option<bool>,
    pub color: Option<Color>,
    pub brightness: Option<f64>,
    pub duration: f32,
}

impl FakeRemote {
    pub fn handle(&self) -> FakeRemote {
        self.clone()
    }

    pub fn set_lights(&self, lights: Vec<Light>) {
        *self.inner.lights.lock().unwrap() = lights;
    }

    pub fn set_scenes(&self, scenes: Vec<Scene>) {
        *self.inner.scenes.lock().unwrap() = scenes;
    }

    /// Makes the next `fetch_lights` fail with the given error.
    pub fn fail_lights(&self, error: ClientError) {
        *self.inner.lights_error.lock().unwrap() = Some(error);
    }

    /// Makes the next `fetch_scenes` fail with the given error.
    pub fn fail_scenes(&self, error: ClientError) {
        *self.inner.scenes_error.lock().unwrap() = Some(error);
    }

    /// Queues the outcome for the next mutation call. Without queued outcomes, mutations
    /// succeed with an `Ok` result per configured light.
    pub fn push_mutation_result(&self, results: Vec<OperationResult>) {
        self.inner.mutation_results.lock().unwrap().push_back(Ok(results));
    }

    pub fn fail_next_mutation(&self, error: ClientError) {
        self.inner.mutation_results.lock().unwrap().push_back(Err(error));
    }

    /// Holds every subsequent mutation call open until the returned semaphore receives a
    /// permit, so tests can observe speculative state before completion.
    pub fn gate_mutations(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.inner.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fetched_selectors(&self) -> Vec<Selector> {
        self.inner.fetched_selectors.lock().unwrap().clone()
    }

    pub fn apply_calls(&self) -> Vec<ApplyCall> {
        self.inner.apply_calls.lock().unwrap().clone()
    }

    pub fn toggle_calls(&self) -> Vec<(Selector, f32)> {
        self.inner.toggle_calls.lock().unwrap().clone()
    }

    pub fn activate_calls(&self) -> Vec<(Selector, Option<f32>)> {
        self.inner.activate_calls.lock().unwrap().clone()
    }

    async fn wait_for_gate(&self) {
        let gate = self.inner.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.expect("gate semaphore closed");
            permit.forget();
        }
    }

    fn next_mutation_result(&self, default: Vec<OperationResult>) -> Result<Vec<OperationResult>, ClientError> {
        self.inner.mutation_results.lock().unwrap().pop_front().unwrap_or(Ok(default))
    }

    fn default_results(&self) -> Vec<OperationResult> {
        self.inner.lights.lock().unwrap().iter().map(|light| OperationResult::new(&light.id, Status::Ok)).collect()
    }

    fn default_toggle_results(&self) -> Vec<OperationResult> {
        self.inner
            .lights
            .lock()
            .unwrap()
            .iter()
            .map(|light| OperationResult {
                id: light.id.clone(),
                status: Status::Ok,
                power: Some(!light.power),
            })
            .collect()
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn fetch_lights(&self, selector: &Selector) -> Result<Vec<Light>, ClientError> {
        self.inner.fetched_selectors.lock().unwrap().push(selector.clone());
        if let Some(error) = self.inner.lights_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.inner.lights.lock().unwrap().clone())
    }

    async fn fetch_scenes(&self) -> Result<Vec<Scene>, ClientError> {
        if let Some(error) = self.inner.scenes_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.inner.scenes.lock().unwrap().clone())
    }

    async fn apply_state(
        &self,
        selector: &Selector,
        power: Option<bool>,
        color: Option<Color>,
        brightness: Option<f64>,
        duration: f32,
    ) -> Result<Vec<OperationResult>, ClientError> {
        self.inner.apply_calls.lock().unwrap().push(ApplyCall {
            selector: selector.clone(),
            power,
            color,
            brightness,
            duration,
        });
        self.wait_for_gate().await;
        self.next_mutation_result(self.default_results())
    }

    async fn activate_scene(&self, selector: &Selector, duration: Option<f32>) -> Result<Vec<OperationResult>, ClientError> {
        self.inner.activate_calls.lock().unwrap().push((selector.clone(), duration));
        self.wait_for_gate().await;
        self.next_mutation_result(self.default_results())
    }

    async fn toggle_power(&self, selector: &Selector, duration: f32) -> Result<Vec<OperationResult>, ClientError> {
        self.inner.toggle_calls.lock().unwrap().push((selector.clone(), duration));
        self.wait_for_gate().await;
        self.next_mutation_result(self.default_toggle_results())
    }
}
