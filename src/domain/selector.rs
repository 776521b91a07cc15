use crate::domain::light::Light;
use crate::domain::scene::Scene;
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

/// A typed query over the known lights. The canonical string form is `all`
/// or `<type>:<value>`, which is also what the remote API takes as a path
/// segment.
///
/// `Label` is kept for backward compatibility with old persisted selector
/// strings and will be removed in a future version; address lights by id
/// instead.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Selector {
    All,
    Id(String),
    Group(String),
    Location(String),
    Scene(String),
    Label(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum SelectorError {
    #[error("unknown selector type '{0}'")]
    UnknownType(String),
    #[error("selector type '{0}' requires a non-empty value")]
    EmptyValue(&'static str),
}

impl Selector {
    fn kind(&self) -> &'static str {
        match self {
            Selector::All => "all",
            Selector::Id(_) => "id",
            Selector::Group(_) => "group_id",
            Selector::Location(_) => "location_id",
            Selector::Scene(_) => "scene_id",
            Selector::Label(_) => "label",
        }
    }

    /// Evaluates the selector against a single light. Scene selectors are resolved against
    /// the given scene list at evaluation time, so membership follows the latest fetched
    /// scene definitions; each state's own selector is evaluated recursively.
    pub fn matches(&self, light: &Light, scenes: &[Scene]) -> bool {
        match self {
            Selector::All => true,
            Selector::Id(id) => light.id == *id,
            Selector::Group(id) => light.group.as_ref().is_some_and(|group| group.id == *id),
            Selector::Location(id) => light.location.as_ref().is_some_and(|location| location.id == *id),
            Selector::Label(label) => light.label == *label,
            Selector::Scene(uuid) => scenes
                .iter()
                .find(|scene| scene.uuid == *uuid)
                .is_some_and(|scene| scene.states.iter().any(|state| state.selector.matches(light, scenes))),
        }
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::Id(value) | Selector::Group(value) | Selector::Location(value) | Selector::Scene(value) | Selector::Label(value) => {
                write!(f, "{}:{}", self.kind(), value)
            }
        }
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (kind, value) = raw.split_once(':').unwrap_or((raw, ""));
        if kind == "all" {
            return Ok(Selector::All);
        }

        let constructor: fn(String) -> Selector = match kind {
            "id" => Selector::Id,
            "group_id" => Selector::Group,
            "location_id" => Selector::Location,
            "scene_id" => Selector::Scene,
            "label" => Selector::Label,
            other => return Err(SelectorError::UnknownType(other.to_string())),
        };

        if value.is_empty() {
            return Err(SelectorError::EmptyValue(constructor(String::new()).kind()));
        }

        Ok(constructor(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::light::Light;
    use crate::domain::scene::{Scene, SceneState};
    use rstest::rstest;

    mod string_form {
        use super::*;

        #[rstest]
        #[case("all", Selector::All)]
        #[case("id:d073d5", Selector::Id("d073d5".to_string()))]
        #[case("group_id:1c8de82b", Selector::Group("1c8de82b".to_string()))]
        #[case("location_id:1d6fe8ef", Selector::Location("1d6fe8ef".to_string()))]
        #[case("scene_id:0b1e8a82", Selector::Scene("0b1e8a82".to_string()))]
        #[case("label:Kitchen", Selector::Label("Kitchen".to_string()))]
        fn round_trips_every_variant(#[case] raw: &str, #[case] expected: Selector) {
            let parsed: Selector = raw.parse().unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.to_string(), raw);
        }

        #[rstest]
        #[case("")]
        #[case(":")]
        #[case("id:")]
        #[case("group_id:")]
        #[case("bogus:value")]
        fn rejects_unknown_types_and_empty_values(#[case] raw: &str) {
            assert!(raw.parse::<Selector>().is_err());
        }
    }

    mod matches {
        use super::*;

        #[test]
        fn all_matches_any_light() {
            let light = Light::placeholder("d1");
            assert!(Selector::All.matches(&light, &[]));
        }

        #[test]
        fn id_matches_on_identity() {
            let light = Light::placeholder("d1");
            assert!(Selector::Id("d1".to_string()).matches(&light, &[]));
            assert!(!Selector::Id("d2".to_string()).matches(&light, &[]));
        }

        #[test]
        fn group_does_not_match_a_light_without_a_group() {
            let light = Light::placeholder("d1");
            assert!(!Selector::Group("g1".to_string()).matches(&light, &[]));
        }

        #[test]
        fn scene_matches_through_the_states_of_the_resolved_scene() {
            let light = Light::placeholder("d1");
            let scene = Scene {
                uuid: "s1".to_string(),
                name: "Evening".to_string(),
                states: vec![SceneState {
                    selector: Selector::Id("d1".to_string()),
                    power: Some(true),
                    brightness: None,
                    color: None,
                }],
            };

            assert!(Selector::Scene("s1".to_string()).matches(&light, &[scene.clone()]));
            assert!(!Selector::Scene("s2".to_string()).matches(&light, &[scene]));
            assert!(!Selector::Scene("s1".to_string()).matches(&light, &[]));
        }
    }
}
