use crate::domain::{Light, Scene, Selector};
use crate::error::ClientError;
use crate::light_target::LightTarget;
use crate::remote::RemoteService;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Handle returned by `add_observer`, redeemed by `remove_observer`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObserverToken(pub(crate) u64);

pub(crate) type SubscriberFn = dyn Fn(&[Light], &[Scene]) + Send + Sync;

/// The canonical in-memory store of all known lights and scenes.
///
/// Exactly one copy of each light exists here; every [`LightTarget`] reads through it and
/// writes back only via the two merge paths, so interleaved operations from different
/// targets never tear a light's fields. Observers are notified synchronously after each
/// merge that actually changed the set, before the merging call returns.
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    remote: Arc<dyn RemoteService>,
    state: Mutex<ClientState>,
}

#[derive(Default)]
struct ClientState {
    lights: Vec<Light>,
    scenes: Vec<Scene>,
    subscribers: HashMap<u64, Arc<SubscriberFn>>,
    next_token: u64,
}

impl Client {
    pub fn new<R: RemoteService + 'static>(remote: R) -> Self {
        Client {
            inner: Arc::new(ClientInner {
                remote: Arc::new(remote),
                state: Mutex::new(ClientState::default()),
            }),
        }
    }

    /// Fetches both the lights and the scenes and merges them into the cache. Partial
    /// failure is reported as the list of individual errors; one succeeding fetch is still
    /// merged even when the other fails.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<(), Vec<ClientError>> {
        debug!("🔵 Fetching all lights and scenes...");
        let requested_at = Utc::now();
        let (lights, scenes) = tokio::join!(self.inner.remote.fetch_lights(&Selector::All), self.inner.remote.fetch_scenes());

        let mut errors = Vec::new();
        match lights {
            Ok(lights) => {
                info!("🟢 Fetched {} light(s)", lights.len());
                self.inner.merge_fetched(lights, requested_at);
            }
            Err(e) => {
                warn!("⚠️ Fetching lights failed: {e}");
                errors.push(e);
            }
        }
        match scenes {
            Ok(scenes) => {
                info!("🟢 Fetched {} scene(s)", scenes.len());
                self.inner.merge_scenes(scenes);
            }
            Err(e) => {
                warn!("⚠️ Fetching scenes failed: {e}");
                errors.push(e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Fetches the lights the selector matches and merges the snapshots into the cache.
    #[instrument(skip(self))]
    pub async fn fetch_lights(&self, selector: &Selector) -> Result<(), ClientError> {
        let requested_at = Utc::now();
        let lights = self.inner.remote.fetch_lights(selector).await?;
        debug!("🔵 Fetched {} light(s) for selector '{selector}'", lights.len());
        self.inner.merge_fetched(lights, requested_at);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch_scenes(&self) -> Result<(), ClientError> {
        let scenes = self.inner.remote.fetch_scenes().await?;
        debug!("🔵 Fetched {} scene(s)", scenes.len());
        self.inner.merge_scenes(scenes);
        Ok(())
    }

    /// A target over every known light.
    pub fn all_lights(&self) -> LightTarget {
        self.light_target(Selector::All)
    }

    /// A live, continuously refiltered target over the lights the selector matches.
    pub fn light_target(&self, selector: Selector) -> LightTarget {
        LightTarget::new(&self.inner, selector)
    }

    pub fn lights(&self) -> Vec<Light> {
        self.inner.lights()
    }

    pub fn scenes(&self) -> Vec<Scene> {
        self.inner.scenes()
    }

    /// Registers a callback invoked with the full light list after every merge that changed
    /// it.
    pub fn add_observer(&self, observer: impl Fn(&[Light]) + Send + Sync + 'static) -> ObserverToken {
        ObserverToken(self.inner.subscribe(Arc::new(move |lights, _scenes| observer(lights))))
    }

    pub fn remove_observer(&self, token: ObserverToken) {
        self.inner.unsubscribe(token.0);
    }
}

impl ClientInner {
    pub(crate) fn remote(&self) -> Arc<dyn RemoteService> {
        Arc::clone(&self.remote)
    }

    pub(crate) fn lights(&self) -> Vec<Light> {
        self.state.lock().unwrap().lights.clone()
    }

    pub(crate) fn scenes(&self) -> Vec<Scene> {
        self.state.lock().unwrap().scenes.clone()
    }

    pub(crate) fn snapshot(&self) -> (Vec<Light>, Vec<Scene>) {
        let state = self.state.lock().unwrap();
        (state.lights.clone(), state.scenes.clone())
    }

    pub(crate) fn light(&self, id: &str) -> Option<Light> {
        self.state.lock().unwrap().lights.iter().find(|light| light.id == id).cloned()
    }

    pub(crate) fn subscribe(&self, subscriber: Arc<SubscriberFn>) -> u64 {
        let mut state = self.state.lock().unwrap();
        let token = state.next_token;
        state.next_token += 1;
        state.subscribers.insert(token, subscriber);
        token
    }

    pub(crate) fn unsubscribe(&self, token: u64) {
        self.state.lock().unwrap().subscribers.remove(&token);
    }

    /// Inserts a placeholder for an id not yet in the cache, so a target constructed for it
    /// is immediately non-empty-but-disconnected and later fetches populate it through the
    /// ordinary merge path.
    pub(crate) fn ensure_light(&self, id: &str) {
        if self.light(id).is_none() {
            debug!("🔵 Inserting placeholder for unknown light '{id}'");
            self.merge_optimistic(vec![Light::placeholder(id)]);
        }
    }

    /// Merges freshly fetched snapshots. A cached light with unconfirmed local writes is
    /// reconciled against the snapshot using `requested_at`; a clean one is replaced
    /// outright. Lights absent from the snapshot are preserved, because the fetch selector
    /// may be narrower than the full set.
    pub(crate) fn merge_fetched(&self, snapshots: Vec<Light>, requested_at: DateTime<Utc>) {
        self.commit(|state| {
            let mut merged = state.lights.clone();
            for snapshot in snapshots {
                match merged.iter_mut().find(|light| light.id == snapshot.id) {
                    Some(current) if current.is_dirty() => *current = current.reconcile(&snapshot, requested_at),
                    Some(current) => *current = snapshot,
                    None => merged.push(snapshot),
                }
            }
            merged.sort_by(|a, b| a.id.cmp(&b.id));

            if state.lights == merged {
                false
            } else {
                state.lights = merged;
                true
            }
        });
    }

    /// Merges locally derived light values, replacing or appending by id. This is the only
    /// path by which light values change outside of a fetch; mutation operations build
    /// their next values from the current cache contents and funnel them through here.
    pub(crate) fn merge_optimistic(&self, lights: Vec<Light>) {
        self.commit(|state| {
            let mut merged = state.lights.clone();
            for light in lights {
                match merged.iter_mut().find(|current| current.id == light.id) {
                    Some(current) => *current = light,
                    None => merged.push(light),
                }
            }
            merged.sort_by(|a, b| a.id.cmp(&b.id));

            if state.lights == merged {
                false
            } else {
                state.lights = merged;
                true
            }
        });
    }

    pub(crate) fn merge_scenes(&self, scenes: Vec<Scene>) {
        self.commit(|state| {
            if state.scenes == scenes {
                false
            } else {
                state.scenes = scenes;
                true
            }
        });
    }

    /// Runs a mutation under the state lock and, when it reports a change, invokes every
    /// subscriber with the merged lists after the lock is released. The fan-out happens
    /// before `commit` returns, so a caller's write is visible to every target by the time
    /// its merging call comes back.
    fn commit<F>(&self, mutate: F)
    where
        F: FnOnce(&mut ClientState) -> bool,
    {
        let notification = {
            let mut state = self.state.lock().unwrap();
            if mutate(&mut state) {
                let subscribers: Vec<Arc<SubscriberFn>> = state.subscribers.values().cloned().collect();
                Some((state.lights.clone(), state.scenes.clone(), subscribers))
            } else {
                None
            }
        };

        if let Some((lights, scenes, subscribers)) = notification {
            debug!("🔵 Notifying {} subscriber(s) of {} light(s)", subscribers.len(), lights.len());
            for subscriber in subscribers {
                subscriber(&lights, &scenes);
            }
        }
    }
}
