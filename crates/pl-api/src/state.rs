use std::collections::BTreeMap;

use pl_core::{value_from_json, PromptValue};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerInfo {
    pub name: String,
    pub attributes: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneInfo {
    pub location: String,
    pub weather: String,
    /// Raw in-game clock, hours 0..24.
    pub hour: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpcInfo {
    pub name: String,
    pub role: String,
    pub distance: f64,
    pub attributes: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatTurn {
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameEvent {
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionInfo {
    pub name: String,
    pub description: String,
}

/// Everything a preview request can say about the world. Deserialized from
/// the CLI's scenario JSON file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    pub player: PlayerInfo,
    pub scene: SceneInfo,
    pub npcs: Vec<NpcInfo>,
    pub chat_history: Vec<ChatTurn>,
    pub events: Vec<GameEvent>,
    pub actions: Vec<ActionInfo>,
    pub overrides: BTreeMap<String, JsonValue>,
}

/// Normalizes scenario data into the nested value map templates render
/// against. Builds are deterministic: every container is a BTreeMap, and
/// identical scenarios produce identical maps.
#[derive(Debug, Clone, Default)]
pub struct SimulationStateBuilder {
    scenario: Scenario,
    overrides: BTreeMap<String, PromptValue>,
}

impl SimulationStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scenario(scenario: Scenario) -> Self {
        Self {
            scenario,
            overrides: BTreeMap::new(),
        }
    }

    pub fn player(mut self, player: PlayerInfo) -> Self {
        self.scenario.player = player;
        self
    }

    pub fn scene(mut self, scene: SceneInfo) -> Self {
        self.scenario.scene = scene;
        self
    }

    pub fn npc(mut self, npc: NpcInfo) -> Self {
        self.scenario.npcs.push(npc);
        self
    }

    pub fn chat_turn(mut self, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        self.scenario.chat_history.push(ChatTurn {
            speaker: speaker.into(),
            text: text.into(),
        });
        self
    }

    pub fn event(mut self, description: impl Into<String>) -> Self {
        self.scenario.events.push(GameEvent {
            description: description.into(),
        });
        self
    }

    pub fn action(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.scenario.actions.push(ActionInfo {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    /// Pre-built top-level entries, applied after everything derived from
    /// the scenario.
    pub fn override_value(mut self, key: impl Into<String>, value: PromptValue) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }

    pub fn build(self) -> BTreeMap<String, PromptValue> {
        let scenario = self.scenario;
        let mut state = BTreeMap::new();

        let mut player = attributes_map(&scenario.player.attributes);
        player.insert(
            "name".to_string(),
            PromptValue::String(scenario.player.name.clone()),
        );
        state.insert("player".to_string(), PromptValue::Map(player));

        let mut scene = BTreeMap::new();
        scene.insert(
            "location".to_string(),
            PromptValue::String(scenario.scene.location.clone()),
        );
        scene.insert(
            "weather".to_string(),
            PromptValue::String(scenario.scene.weather.clone()),
        );
        scene.insert("hour".to_string(), PromptValue::Number(scenario.scene.hour));
        scene.insert(
            "time_of_day".to_string(),
            PromptValue::String(time_of_day(scenario.scene.hour).to_string()),
        );
        state.insert("scene".to_string(), PromptValue::Map(scene));

        state.insert(
            "npcs".to_string(),
            PromptValue::List(
                scenario
                    .npcs
                    .iter()
                    .map(|npc| {
                        let mut entry = attributes_map(&npc.attributes);
                        entry.insert(
                            "name".to_string(),
                            PromptValue::String(npc.name.clone()),
                        );
                        entry.insert(
                            "role".to_string(),
                            PromptValue::String(npc.role.clone()),
                        );
                        entry.insert("distance".to_string(), PromptValue::Number(npc.distance));
                        PromptValue::Map(entry)
                    })
                    .collect(),
            ),
        );

        state.insert(
            "chat_history".to_string(),
            PromptValue::List(
                scenario
                    .chat_history
                    .iter()
                    .map(|turn| {
                        let mut entry = BTreeMap::new();
                        entry.insert(
                            "speaker".to_string(),
                            PromptValue::String(turn.speaker.clone()),
                        );
                        entry.insert(
                            "text".to_string(),
                            PromptValue::String(turn.text.clone()),
                        );
                        PromptValue::Map(entry)
                    })
                    .collect(),
            ),
        );

        state.insert(
            "events".to_string(),
            PromptValue::List(
                scenario
                    .events
                    .iter()
                    .map(|event| {
                        let mut entry = BTreeMap::new();
                        entry.insert(
                            "description".to_string(),
                            PromptValue::String(event.description.clone()),
                        );
                        PromptValue::Map(entry)
                    })
                    .collect(),
            ),
        );

        state.insert(
            "actions".to_string(),
            PromptValue::List(
                scenario
                    .actions
                    .iter()
                    .map(|action| {
                        let mut entry = BTreeMap::new();
                        entry.insert(
                            "name".to_string(),
                            PromptValue::String(action.name.clone()),
                        );
                        entry.insert(
                            "description".to_string(),
                            PromptValue::String(action.description.clone()),
                        );
                        PromptValue::Map(entry)
                    })
                    .collect(),
            ),
        );

        for (key, value) in &scenario.overrides {
            state.insert(key.clone(), value_from_json(value.clone()));
        }
        for (key, value) in self.overrides {
            state.insert(key, value);
        }

        state
    }
}

fn attributes_map(attributes: &BTreeMap<String, JsonValue>) -> BTreeMap<String, PromptValue> {
    attributes
        .iter()
        .map(|(key, value)| (key.clone(), value_from_json(value.clone())))
        .collect()
}

fn time_of_day(hour: f64) -> &'static str {
    if (5.0..12.0).contains(&hour) {
        "morning"
    } else if (12.0..18.0).contains(&hour) {
        "afternoon"
    } else if (18.0..22.0).contains(&hour) {
        "evening"
    } else {
        "night"
    }
}
