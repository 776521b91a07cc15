use crate::domain::color::Color;
use crate::domain::selector::Selector;
use chrono::{DateTime, Utc};

#[derive(Clone, PartialEq, Debug)]
pub struct Group {
    pub id: String,
    pub name: String,
}

impl Group {
    pub fn to_selector(&self) -> Selector {
        Selector::Group(self.id.clone())
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Location {
    pub id: String,
    pub name: String,
}

impl Location {
    pub fn to_selector(&self) -> Selector {
        Selector::Location(self.id.clone())
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Capabilities {
    pub has_color: bool,
    pub has_ir: bool,
    pub has_multizone: bool,
    pub has_variable_color_temp: bool,
    pub has_hev: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ProductInformation {
    pub product_name: String,
    pub manufacturer: String,
    pub capabilities: Option<Capabilities>,
}

/// A field of a light that mutation operations may change. `Toggle` differs from `Power`
/// because at the time a toggle is issued the resulting power state is indeterminate; the
/// server answers with the authoritative post-toggle value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MutableProperty {
    Power,
    Brightness,
    Color,
    Toggle,
}

/// A locally written property whose value is known to be newer than any snapshot fetched
/// before `updated_at`.
#[derive(Clone, PartialEq, Debug)]
pub struct DirtyProperty {
    pub property: MutableProperty,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of one remote light plus the mutation-tracking metadata used to
/// reconcile it with later fetches. Never mutated in place: every state transition goes
/// through [`Light::with`] or [`Light::reconcile`] and produces a new value.
#[derive(Clone, Debug)]
pub struct Light {
    pub id: String,
    pub power: bool,
    pub brightness: f64,
    pub color: Color,
    pub label: String,
    pub connected: bool,
    pub group: Option<Group>,
    pub location: Option<Location>,
    pub product: Option<ProductInformation>,
    pub touched_at: DateTime<Utc>,
    /// Properties with an outstanding, unconfirmed remote write. Any fetch that resolves
    /// while these are set is inherently out of date for them.
    pub(crate) in_flight: Vec<MutableProperty>,
    /// Properties whose local value has not yet been reflected by a trusted fetch.
    pub(crate) dirty: Vec<DirtyProperty>,
}

/// Optional overrides for deriving a new [`Light`] value from an existing one.
#[derive(Default)]
pub(crate) struct LightUpdate {
    pub power: Option<bool>,
    pub brightness: Option<f64>,
    pub color: Option<Color>,
    pub connected: Option<bool>,
    pub in_flight: Option<Vec<MutableProperty>>,
    pub dirty: Option<Vec<DirtyProperty>>,
}

impl Light {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        power: bool,
        brightness: f64,
        color: Color,
        label: impl Into<String>,
        connected: bool,
        group: Option<Group>,
        location: Option<Location>,
        product: Option<ProductInformation>,
    ) -> Self {
        Light {
            id: id.into(),
            power,
            brightness,
            color,
            label: label.into(),
            connected,
            group,
            location,
            product,
            touched_at: Utc::now(),
            in_flight: Vec::new(),
            dirty: Vec::new(),
        }
    }

    /// A light that is known only by id, used so observers can attach to a target before
    /// the first fetch populates it.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Light::new(id, false, 0.0, Color::white(crate::domain::color::DEFAULT_KELVIN), "", false, None, None, None)
    }

    pub fn to_selector(&self) -> Selector {
        Selector::Id(self.id.clone())
    }

    /// True while any local write has not been confirmed by a trusted fetch.
    pub fn is_dirty(&self) -> bool {
        !self.in_flight.is_empty() || !self.dirty.is_empty()
    }

    pub fn has_color(&self) -> bool {
        self.capability(|c| c.has_color)
    }

    pub fn has_ir(&self) -> bool {
        self.capability(|c| c.has_ir)
    }

    pub fn has_multizone(&self) -> bool {
        self.capability(|c| c.has_multizone)
    }

    pub fn has_variable_color_temp(&self) -> bool {
        self.capability(|c| c.has_variable_color_temp)
    }

    pub fn has_hev(&self) -> bool {
        self.capability(|c| c.has_hev)
    }

    fn capability(&self, f: impl Fn(&Capabilities) -> bool) -> bool {
        self.product.as_ref().and_then(|p| p.capabilities.as_ref()).is_some_and(f)
    }

    /// Returns a new value with the given overrides applied and `touched_at` refreshed.
    pub(crate) fn with(&self, update: LightUpdate) -> Light {
        Light {
            id: self.id.clone(),
            power: update.power.unwrap_or(self.power),
            brightness: update.brightness.unwrap_or(self.brightness),
            color: update.color.unwrap_or(self.color),
            label: self.label.clone(),
            connected: update.connected.unwrap_or(self.connected),
            group: self.group.clone(),
            location: self.location.clone(),
            product: self.product.clone(),
            touched_at: Utc::now(),
            in_flight: update.in_flight.unwrap_or_else(|| self.in_flight.clone()),
            dirty: update.dirty.unwrap_or_else(|| self.dirty.clone()),
        }
    }

    /// Merges a freshly fetched snapshot into this value for a fetch that started at
    /// `requested_at`.
    ///
    /// A fetch can be slower than a concurrent local write, in which case the snapshot is
    /// stale for the written properties. Dirty properties whose write happened at or after
    /// `requested_at` are re-applied from the current value, as is every in-flight property
    /// (its outcome is unknown regardless of timing). An in-flight toggle inverts whatever
    /// power the snapshot reports, since the correct post-toggle state is unknowable until
    /// the server answers. In-flight bookkeeping is carried over unchanged; resolving it is
    /// the job of the mutation that created it, not of a fetch.
    pub(crate) fn reconcile(&self, incoming: &Light, requested_at: DateTime<Utc>) -> Light {
        let still_dirty: Vec<DirtyProperty> = self.dirty.iter().filter(|entry| entry.updated_at >= requested_at).cloned().collect();

        let mut reapply: Vec<MutableProperty> = still_dirty.iter().map(|entry| entry.property).collect();
        for property in &self.in_flight {
            if !reapply.contains(property) {
                reapply.push(*property);
            }
        }

        let mut merged = incoming.clone();
        for property in reapply {
            let update = match property {
                MutableProperty::Power => LightUpdate { power: Some(self.power), ..LightUpdate::default() },
                MutableProperty::Brightness => LightUpdate { brightness: Some(self.brightness), ..LightUpdate::default() },
                MutableProperty::Color => LightUpdate { color: Some(self.color), ..LightUpdate::default() },
                MutableProperty::Toggle => LightUpdate { power: Some(!merged.power), ..LightUpdate::default() },
            };
            merged = merged.with(update);
        }

        merged.with(LightUpdate {
            in_flight: Some(self.in_flight.clone()),
            dirty: Some(still_dirty),
            ..LightUpdate::default()
        })
    }
}

/// Equality covers the observable attributes and the tracking metadata, but not
/// `touched_at`: a light whose bookkeeping changed is a different value even when every
/// visible field matches, which is what lets the client re-announce it, while the
/// always-fresh timestamp alone must not cause spurious notifications.
impl PartialEq for Light {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.power == other.power
            && self.brightness == other.brightness
            && self.color == other.color
            && self.label == other.label
            && self.connected == other.connected
            && self.group == other.group
            && self.location == other.location
            && self.in_flight == other.in_flight
            && self.dirty == other.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn light(brightness: f64) -> Light {
        Light::new("d1", true, brightness, Color::white(3500), "Desk", true, None, None, None)
    }

    mod equality {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn ignores_touched_at() {
            let a = light(0.5);
            let mut b = a.clone();
            b.touched_at = a.touched_at + Duration::seconds(10);
            assert_eq!(a, b);
        }

        #[test]
        fn includes_tracking_metadata() {
            let a = light(0.5);
            let b = a.with(LightUpdate {
                in_flight: Some(vec![MutableProperty::Brightness]),
                ..LightUpdate::default()
            });
            assert_ne!(a, b);
        }
    }

    mod reconcile {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn fetch_started_before_a_local_write_does_not_clobber_it() {
            let written_at = Utc::now();
            let requested_at = written_at - Duration::seconds(2);
            let current = light(0.9).with(LightUpdate {
                dirty: Some(vec![DirtyProperty { property: MutableProperty::Brightness, updated_at: written_at }]),
                ..LightUpdate::default()
            });
            let incoming = light(0.1);

            let merged = current.reconcile(&incoming, requested_at);

            assert_eq!(merged.brightness, 0.9);
            assert_eq!(merged.dirty.len(), 1, "the write is still unconfirmed");
        }

        #[test]
        fn fetch_started_after_a_local_write_is_trusted_and_clears_the_flag() {
            let written_at = Utc::now();
            let requested_at = written_at + Duration::seconds(2);
            let current = light(0.9).with(LightUpdate {
                dirty: Some(vec![DirtyProperty { property: MutableProperty::Brightness, updated_at: written_at }]),
                ..LightUpdate::default()
            });
            let incoming = light(0.1);

            let merged = current.reconcile(&incoming, requested_at);

            assert_eq!(merged.brightness, 0.1);
            assert!(merged.dirty.is_empty());
        }

        #[test]
        fn in_flight_properties_are_reapplied_regardless_of_timing() {
            let requested_at = Utc::now() + Duration::seconds(60);
            let current = light(0.9).with(LightUpdate {
                in_flight: Some(vec![MutableProperty::Brightness]),
                ..LightUpdate::default()
            });
            let incoming = light(0.1);

            let merged = current.reconcile(&incoming, requested_at);

            assert_eq!(merged.brightness, 0.9);
            assert_eq!(merged.in_flight, vec![MutableProperty::Brightness], "fetches never resolve in-flight writes");
        }

        #[test]
        fn in_flight_toggle_inverts_the_fetched_power() {
            let current = light(0.5).with(LightUpdate {
                in_flight: Some(vec![MutableProperty::Toggle]),
                ..LightUpdate::default()
            });
            let mut incoming = light(0.5);
            incoming.power = false;

            let merged = current.reconcile(&incoming, Utc::now());

            assert!(merged.power, "toggle flips whatever the snapshot reports");
        }

        #[test]
        fn untracked_fields_adopt_the_snapshot() {
            let written_at = Utc::now();
            let current = light(0.9).with(LightUpdate {
                power: Some(true),
                dirty: Some(vec![DirtyProperty { property: MutableProperty::Brightness, updated_at: written_at }]),
                ..LightUpdate::default()
            });
            let mut incoming = light(0.1);
            incoming.power = false;
            incoming.color = Color::color(120.0, 1.0);

            let merged = current.reconcile(&incoming, written_at - Duration::seconds(1));

            assert_eq!(merged.brightness, 0.9);
            assert!(!merged.power);
            assert_eq!(merged.color, Color::color(120.0, 1.0));
        }
    }

    mod capabilities {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn default_to_false_without_product_information() {
            let light = Light::placeholder("d1");
            assert!(!light.has_color());
            assert!(!light.has_multizone());
        }

        #[test]
        fn reflect_the_product_information() {
            let mut light = Light::placeholder("d1");
            light.product = Some(ProductInformation {
                product_name: "Mini Color".to_string(),
                manufacturer: "LIFX".to_string(),
                capabilities: Some(Capabilities {
                    has_color: true,
                    has_ir: false,
                    has_multizone: false,
                    has_variable_color_temp: true,
                    has_hev: false,
                }),
            });
            assert!(light.has_color());
            assert!(light.has_variable_color_temp());
            assert!(!light.has_ir());
        }
    }
}
