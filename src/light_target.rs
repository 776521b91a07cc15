use crate::client::{ClientInner, ObserverToken};
use crate::domain::{Color, DirtyProperty, Light, LightUpdate, MutableProperty, OperationResult, Scene, SceneState, Selector};
use crate::error::ClientError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, instrument, warn};

/// A live, selector-filtered projection of the client's light cache.
///
/// The target subscribes to the client on construction and refilters and re-derives its
/// aggregate state on every cache change, notifying its own observers only when the
/// aggregate actually changed. Mutation operations apply an optimistic update to the cache
/// (visible to every target immediately), call the remote service, and then write back
/// either the confirmed state or a rollback, always through the client's merge and never by
/// assigning into a light directly.
///
/// Dropping the target unsubscribes it. The target does not keep its client alive;
/// operations on a target whose client is gone report [`ClientError::ClientGone`].
pub struct LightTarget {
    shared: Arc<TargetShared>,
    client: Weak<ClientInner>,
    subscription: u64,
}

struct TargetShared {
    selector: Selector,
    state: Mutex<TargetState>,
}

struct TargetState {
    members: Vec<Light>,
    aggregate: Aggregate,
    observers: HashMap<u64, Arc<dyn Fn() + Send + Sync>>,
    next_token: u64,
}

/// The derived scalar state of a target. Computed as a whole and compared structurally to
/// the previous value, so observers get at most one notification per cache change.
#[derive(Clone, PartialEq, Debug)]
struct Aggregate {
    power: bool,
    brightness: f64,
    color: Color,
    label: String,
    connected: bool,
    count: usize,
    touched_at: DateTime<Utc>,
}

impl Aggregate {
    fn empty() -> Self {
        Aggregate {
            power: false,
            brightness: 0.0,
            color: Color::white(crate::domain::color::DEFAULT_KELVIN),
            label: String::new(),
            connected: false,
            count: 0,
            touched_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn derive(selector: &Selector, members: &[Light], scenes: &[Scene]) -> Self {
        let connected_members: Vec<&Light> = members.iter().filter(|light| light.connected).collect();

        let power = connected_members.iter().any(|light| light.power);

        let brightness = if connected_members.is_empty() {
            0.0
        } else {
            connected_members.iter().map(|light| light.brightness).sum::<f64>() / connected_members.len() as f64
        };

        let colors: Vec<Color> = connected_members.iter().map(|light| light.color).collect();
        let color = Color::average(&colors);

        let label = match selector {
            Selector::All => "All".to_string(),
            Selector::Id(_) | Selector::Label(_) => members.first().map(|light| light.label.clone()).unwrap_or_default(),
            Selector::Group(id) => members
                .iter()
                .find_map(|light| light.group.as_ref().filter(|group| group.id == *id).map(|group| group.name.clone()))
                .unwrap_or_default(),
            Selector::Location(id) => members
                .iter()
                .find_map(|light| light.location.as_ref().filter(|location| location.id == *id).map(|location| location.name.clone()))
                .unwrap_or_default(),
            Selector::Scene(uuid) => scenes.iter().find(|scene| scene.uuid == *uuid).map(|scene| scene.name.clone()).unwrap_or_default(),
        };

        let connected = members.iter().any(|light| light.connected);

        // A member with a touch time ahead of the wall clock is a symptom of clock skew;
        // never report a timestamp from the future.
        let now = Utc::now();
        let touched_at = members
            .iter()
            .map(|light| light.touched_at)
            .filter(|touched_at| *touched_at <= now)
            .max()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Aggregate {
            power,
            brightness,
            color,
            label,
            connected,
            count: members.len(),
            touched_at,
        }
    }
}

/// What one mutation speculated for one light, kept around to resolve the operation.
struct Speculation {
    original: Light,
    properties: Vec<MutableProperty>,
}

impl LightTarget {
    pub(crate) fn new(client: &Arc<ClientInner>, selector: Selector) -> LightTarget {
        // Targets for an unknown id start out non-empty-but-disconnected, so observers can
        // attach before the first fetch and the fetch populates them via the normal merge.
        if let Selector::Id(id) = &selector {
            client.ensure_light(id);
        }

        let shared = Arc::new(TargetShared {
            selector,
            state: Mutex::new(TargetState {
                members: Vec::new(),
                aggregate: Aggregate::empty(),
                observers: HashMap::new(),
                next_token: 0,
            }),
        });

        let subscriber = Arc::downgrade(&shared);
        let subscription = client.subscribe(Arc::new(move |lights, scenes| {
            if let Some(shared) = subscriber.upgrade() {
                shared.refresh(lights, scenes);
            }
        }));

        let (lights, scenes) = client.snapshot();
        shared.refresh(&lights, &scenes);

        LightTarget {
            shared,
            client: Arc::downgrade(client),
            subscription,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.shared.selector
    }

    pub fn power(&self) -> bool {
        self.shared.state.lock().unwrap().aggregate.power
    }

    pub fn brightness(&self) -> f64 {
        self.shared.state.lock().unwrap().aggregate.brightness
    }

    pub fn color(&self) -> Color {
        self.shared.state.lock().unwrap().aggregate.color
    }

    pub fn label(&self) -> String {
        self.shared.state.lock().unwrap().aggregate.label.clone()
    }

    pub fn connected(&self) -> bool {
        self.shared.state.lock().unwrap().aggregate.connected
    }

    pub fn count(&self) -> usize {
        self.shared.state.lock().unwrap().aggregate.count
    }

    pub fn touched_at(&self) -> DateTime<Utc> {
        self.shared.state.lock().unwrap().aggregate.touched_at
    }

    /// The current member lights, a snapshot of the last refresh.
    pub fn lights(&self) -> Vec<Light> {
        self.shared.state.lock().unwrap().members.clone()
    }

    /// One target per member light, addressed by id.
    pub fn to_light_targets(&self) -> Result<Vec<LightTarget>, ClientError> {
        let client = self.client()?;
        Ok(self.lights().iter().map(|light| LightTarget::new(&client, light.to_selector())).collect())
    }

    /// One target per distinct group among the members.
    pub fn to_group_targets(&self) -> Result<Vec<LightTarget>, ClientError> {
        let client = self.client()?;
        let mut selectors: Vec<Selector> = Vec::new();
        for light in self.lights() {
            if let Some(group) = &light.group {
                let selector = group.to_selector();
                if !selectors.contains(&selector) {
                    selectors.push(selector);
                }
            }
        }
        Ok(selectors.into_iter().map(|selector| LightTarget::new(&client, selector)).collect())
    }

    /// One target per distinct location among the members.
    pub fn to_location_targets(&self) -> Result<Vec<LightTarget>, ClientError> {
        let client = self.client()?;
        let mut selectors: Vec<Selector> = Vec::new();
        for light in self.lights() {
            if let Some(location) = &light.location {
                let selector = location.to_selector();
                if !selectors.contains(&selector) {
                    selectors.push(selector);
                }
            }
        }
        Ok(selectors.into_iter().map(|selector| LightTarget::new(&client, selector)).collect())
    }

    /// Registers a callback invoked after every change of the target's aggregate state.
    pub fn add_observer(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverToken {
        let mut state = self.shared.state.lock().unwrap();
        let token = state.next_token;
        state.next_token += 1;
        state.observers.insert(token, Arc::new(observer));
        ObserverToken(token)
    }

    pub fn remove_observer(&self, token: ObserverToken) {
        self.shared.state.lock().unwrap().observers.remove(&token.0);
    }

    pub fn remove_all_observers(&self) {
        self.shared.state.lock().unwrap().observers.clear();
    }

    /// Powers every member on or off, transitioning over `duration` seconds (0.5 is the
    /// conventional value).
    #[instrument(skip(self))]
    pub async fn set_power(&self, power: bool, duration: f32) -> Result<Vec<OperationResult>, ClientError> {
        let client = self.client()?;
        debug!("🔵 Setting power to {power} for selector '{}'", self.shared.selector);
        let speculations = self.speculate(&client, |_| (LightUpdate { power: Some(power), ..LightUpdate::default() }, vec![MutableProperty::Power]));
        let outcome = client.remote().apply_state(&self.shared.selector, Some(power), None, None, duration).await;
        self.resolve(&client, speculations, outcome)
    }

    #[instrument(skip(self))]
    pub async fn set_brightness(&self, brightness: f64, duration: f32) -> Result<Vec<OperationResult>, ClientError> {
        let client = self.client()?;
        debug!("🔵 Setting brightness to {brightness} for selector '{}'", self.shared.selector);
        let speculations = self.speculate(&client, |_| {
            (LightUpdate { brightness: Some(brightness), ..LightUpdate::default() }, vec![MutableProperty::Brightness])
        });
        let outcome = client.remote().apply_state(&self.shared.selector, None, None, Some(brightness), duration).await;
        self.resolve(&client, speculations, outcome)
    }

    #[instrument(skip(self))]
    pub async fn set_color(&self, color: Color, duration: f32) -> Result<Vec<OperationResult>, ClientError> {
        let client = self.client()?;
        debug!("🔵 Setting color to '{color}' for selector '{}'", self.shared.selector);
        let speculations = self.speculate(&client, |_| (LightUpdate { color: Some(color), ..LightUpdate::default() }, vec![MutableProperty::Color]));
        let outcome = client.remote().apply_state(&self.shared.selector, None, Some(color), None, duration).await;
        self.resolve(&client, speculations, outcome)
    }

    /// Applies any combination of power, color and brightness in one request. Fields left
    /// as `None` are not touched.
    #[instrument(skip(self))]
    pub async fn set_state(
        &self,
        power: Option<bool>,
        color: Option<Color>,
        brightness: Option<f64>,
        duration: f32,
    ) -> Result<Vec<OperationResult>, ClientError> {
        let client = self.client()?;
        let speculations = self.speculate(&client, |_| {
            let mut properties = Vec::new();
            if power.is_some() {
                properties.push(MutableProperty::Power);
            }
            if brightness.is_some() {
                properties.push(MutableProperty::Brightness);
            }
            if color.is_some() {
                properties.push(MutableProperty::Color);
            }
            (LightUpdate { power, brightness, color, ..LightUpdate::default() }, properties)
        });
        let outcome = client.remote().apply_state(&self.shared.selector, power, color, brightness, duration).await;
        self.resolve(&client, speculations, outcome)
    }

    /// Inverts the target's power. The speculated value is the inverse of the aggregate,
    /// which is a guess since members of a group may disagree; the resolve step adopts the
    /// authoritative per-light power the server reports.
    #[instrument(skip(self))]
    pub async fn toggle_power(&self, duration: f32) -> Result<Vec<OperationResult>, ClientError> {
        let client = self.client()?;
        let next_power = !self.power();
        debug!("🔵 Toggling power for selector '{}', speculating {next_power}", self.shared.selector);
        let speculations = self.speculate(&client, |_| (LightUpdate { power: Some(next_power), ..LightUpdate::default() }, vec![MutableProperty::Toggle]));
        let outcome = client.remote().toggle_power(&self.shared.selector, duration).await;
        self.resolve(&client, speculations, outcome)
    }

    /// Restores the members to the partial states stored in the target's scene. Only valid
    /// on a scene target; any other selector is rejected without a network call.
    ///
    /// A scene state applies to every member its selector matches, using the same predicate
    /// that determines scene membership, with later states winning for fields they both
    /// specify. Fields a state leaves unspecified keep the member's current value.
    #[instrument(skip(self))]
    pub async fn restore_state(&self, duration: Option<f32>) -> Result<Vec<OperationResult>, ClientError> {
        let Selector::Scene(uuid) = &self.shared.selector else {
            return Err(ClientError::UnacceptableSelector(self.shared.selector.clone()));
        };

        let client = self.client()?;
        let scenes = client.scenes();
        let states: Vec<SceneState> = scenes
            .iter()
            .find(|scene| scene.uuid == *uuid)
            .map(|scene| scene.states.clone())
            .unwrap_or_default();

        let speculations = self.speculate(&client, |light| {
            let mut update = LightUpdate::default();
            let mut properties = Vec::new();
            for state in states.iter().filter(|state| state.selector.matches(light, &scenes)) {
                if let Some(power) = state.power {
                    update.power = Some(power);
                    if !properties.contains(&MutableProperty::Power) {
                        properties.push(MutableProperty::Power);
                    }
                }
                if let Some(brightness) = state.brightness {
                    update.brightness = Some(brightness);
                    if !properties.contains(&MutableProperty::Brightness) {
                        properties.push(MutableProperty::Brightness);
                    }
                }
                if let Some(color) = state.color {
                    update.color = Some(color);
                    if !properties.contains(&MutableProperty::Color) {
                        properties.push(MutableProperty::Color);
                    }
                }
            }
            (update, properties)
        });
        let outcome = client.remote().activate_scene(&self.shared.selector, duration).await;
        self.resolve(&client, speculations, outcome)
    }

    fn client(&self) -> Result<Arc<ClientInner>, ClientError> {
        self.client.upgrade().ok_or(ClientError::ClientGone)
    }

    /// Applies the optimistic update to every current member and merges it into the cache,
    /// marking the touched properties in flight. The next value is always built from the
    /// cache's current light, never from a stale member copy.
    fn speculate<F>(&self, client: &ClientInner, plan: F) -> Vec<Speculation>
    where
        F: Fn(&Light) -> (LightUpdate, Vec<MutableProperty>),
    {
        let members = self.lights();
        let mut speculations = Vec::with_capacity(members.len());
        let mut speculative = Vec::with_capacity(members.len());

        for member in members {
            let current = client.light(&member.id).unwrap_or(member);
            let (mut update, properties) = plan(&current);

            let mut in_flight = current.in_flight.clone();
            for property in &properties {
                if !in_flight.contains(property) {
                    in_flight.push(*property);
                }
            }
            update.in_flight = Some(in_flight);

            speculative.push(current.with(update));
            speculations.push(Speculation { original: current, properties });
        }

        client.merge_optimistic(speculative);
        speculations
    }

    /// Writes the operation's outcome back into the cache. On success the just-finished
    /// properties stop being in flight and dirty, and each light's connectivity follows its
    /// result status. On failure the speculated fields revert to their pre-operation values
    /// with a fresh dirty entry, so a fetch that started before this rollback cannot
    /// re-clobber it.
    fn resolve(
        &self,
        client: &ClientInner,
        speculations: Vec<Speculation>,
        outcome: Result<Vec<OperationResult>, ClientError>,
    ) -> Result<Vec<OperationResult>, ClientError> {
        match outcome {
            Ok(results) => {
                let resolved: Vec<Light> = speculations
                    .iter()
                    .filter_map(|speculation| {
                        let current = client.light(&speculation.original.id)?;
                        let result = results.iter().find(|result| result.id == current.id);

                        let power = if speculation.properties.contains(&MutableProperty::Toggle) {
                            result.and_then(|result| result.power)
                        } else {
                            None
                        };

                        let in_flight: Vec<MutableProperty> =
                            current.in_flight.iter().filter(|p| !speculation.properties.contains(p)).copied().collect();
                        let dirty: Vec<DirtyProperty> =
                            current.dirty.iter().filter(|d| !speculation.properties.contains(&d.property)).cloned().collect();

                        Some(current.with(LightUpdate {
                            power,
                            connected: result.map(|result| result.status.is_connected()),
                            in_flight: Some(in_flight),
                            dirty: Some(dirty),
                            ..LightUpdate::default()
                        }))
                    })
                    .collect();
                client.merge_optimistic(resolved);
                Ok(results)
            }
            Err(error) => {
                warn!("⚠️ Operation on selector '{}' failed, rolling back: {error}", self.shared.selector);
                let now = Utc::now();
                let reverted: Vec<Light> = speculations
                    .iter()
                    .filter_map(|speculation| {
                        let current = client.light(&speculation.original.id)?;

                        let mut update = LightUpdate::default();
                        let mut reverted_fields: Vec<MutableProperty> = Vec::new();
                        for property in &speculation.properties {
                            match property {
                                MutableProperty::Power | MutableProperty::Toggle => {
                                    update.power = Some(speculation.original.power);
                                    if !reverted_fields.contains(&MutableProperty::Power) {
                                        reverted_fields.push(MutableProperty::Power);
                                    }
                                }
                                MutableProperty::Brightness => {
                                    update.brightness = Some(speculation.original.brightness);
                                    reverted_fields.push(MutableProperty::Brightness);
                                }
                                MutableProperty::Color => {
                                    update.color = Some(speculation.original.color);
                                    reverted_fields.push(MutableProperty::Color);
                                }
                            }
                        }

                        update.in_flight =
                            Some(current.in_flight.iter().filter(|p| !speculation.properties.contains(p)).copied().collect());

                        let mut dirty: Vec<DirtyProperty> =
                            current.dirty.iter().filter(|d| !reverted_fields.contains(&d.property)).cloned().collect();
                        for property in reverted_fields {
                            dirty.push(DirtyProperty { property, updated_at: now });
                        }
                        update.dirty = Some(dirty);

                        Some(current.with(update))
                    })
                    .collect();
                client.merge_optimistic(reverted);
                Err(error)
            }
        }
    }
}

impl Drop for LightTarget {
    fn drop(&mut self) {
        if let Some(client) = self.client.upgrade() {
            client.unsubscribe(self.subscription);
        }
    }
}

impl TargetShared {
    fn refresh(&self, lights: &[Light], scenes: &[Scene]) {
        let observers = {
            let mut state = self.state.lock().unwrap();
            state.members = lights.iter().filter(|light| self.selector.matches(light, scenes)).cloned().collect();

            let aggregate = Aggregate::derive(&self.selector, &state.members, scenes);
            if state.aggregate == aggregate {
                None
            } else {
                state.aggregate = aggregate;
                Some(state.observers.values().cloned().collect::<Vec<_>>())
            }
        };

        if let Some(observers) = observers {
            for observer in observers {
                observer();
            }
        }
    }
}
