use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::AppResult;

pub const DEFAULT_EVENT_TYPE: &str = "NOT_IMPLEMENTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Unknown,
    Starting,
    LoginScreen,
    LoginScreenAuthenticator,
    LoggingIn,
    Loading,
    LoggedIn,
    ConnectionLost,
    Hopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorldType {
    Members,
    Pvp,
    Bounty,
    SkillTotal,
    HighRisk,
    LastManStanding,
    Tournament,
    Deadman,
    League,
    Beta,
    FreshStartWorld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Normal,
    Ironman,
    UltimateIronman,
    HardcoreIronman,
    GroupIronman,
    HardcoreGroupIronman,
}

impl AccountType {
    pub fn name(&self) -> &'static str {
        match self {
            AccountType::Normal => "NORMAL",
            AccountType::Ironman => "IRONMAN",
            AccountType::UltimateIronman => "ULTIMATE_IRONMAN",
            AccountType::HardcoreIronman => "HARDCORE_IRONMAN",
            AccountType::GroupIronman => "GROUP_IRONMAN",
            AccountType::HardcoreGroupIronman => "HARDCORE_GROUP_IRONMAN",
        }
    }

    pub fn is_ironman(&self) -> bool {
        !matches!(self, AccountType::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: i32,
    pub y: i32,
    pub plane: i32,
}

/// A player as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerView {
    pub name: Option<String>,
    pub combat_level: i32,
    pub team: i32,
    pub is_friend: bool,
    pub is_friends_chat_member: bool,
    pub skull_icon: Option<String>,
    pub location: WorldPoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillLevel {
    pub name: String,
    pub boosted_level: i32,
    pub real_level: i32,
    pub experience: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub id: i32,
    pub quantity: i32,
    pub name: String,
}

/// Read access to the host game client.
///
/// Implementations are called on whatever thread the host allows game state
/// to be read from; the crate only calls them synchronously.
pub trait GameClient {
    fn game_state(&self) -> GameState;
    fn local_player(&self) -> Option<PlayerView>;
    /// Every player currently loaded, the local player included.
    fn players(&self) -> Vec<PlayerView>;
    fn skills(&self) -> Vec<SkillLevel>;
    fn account_type(&self) -> AccountType;
    fn world(&self) -> i32;
    fn world_types(&self) -> BTreeSet<WorldType>;
    fn total_level(&self) -> i32;
    /// `None` when the container is not loaded.
    fn equipment(&self) -> Option<Vec<ItemStack>>;
    fn inventory(&self) -> Option<Vec<ItemStack>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyPlayer {
    pub player_name: Option<String>,
    pub is_friend: bool,
    pub is_friends_chat: bool,
    pub team: i32,
    pub combat_level: i32,
}

impl From<&PlayerView> for NearbyPlayer {
    fn from(player: &PlayerView) -> Self {
        Self {
            player_name: player.name.clone(),
            is_friend: player.is_friend,
            is_friends_chat: player.is_friends_chat_member,
            team: player.team,
            combat_level: player.combat_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInfo {
    pub name: String,
    pub boosted_level: i32,
    pub current_level: i32,
    pub experience: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: i32,
    pub quantity: i32,
    pub name: String,
}

impl From<&ItemStack> for ItemInfo {
    fn from(item: &ItemStack) -> Self {
        Self {
            id: item.id,
            quantity: item.quantity,
            name: item.name.clone(),
        }
    }
}

/// Snapshot of the player's state sent alongside a screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub player_name: Option<String>,
    pub account_type: String,
    pub skull_icon: String,
    pub event_type: String,
    pub nearby_players: Vec<NearbyPlayer>,
    pub world_type: BTreeSet<WorldType>,
    pub location: [i32; 3],
    pub combat_level: i32,
    pub world: i32,
    pub total_level: i32,
    pub is_ironman: bool,
    pub equipment: Vec<ItemInfo>,
    pub inventory: Vec<ItemInfo>,
    pub skills: Vec<SkillInfo>,
}

impl UploadMetadata {
    /// Read the current state from the host. `None` without a local player.
    pub fn capture(client: &dyn GameClient, event_type: Option<&str>) -> Option<Self> {
        let player = client.local_player()?;

        let mut players = client.players();
        // Player names are unique per world, so the name identifies our own entry
        let own_entry = match &player.name {
            Some(name) => players.iter().position(|p| p.name.as_ref() == Some(name)),
            None => players.iter().position(|p| *p == player),
        };
        if let Some(index) = own_entry {
            players.remove(index);
        }
        let nearby_players = players.iter().map(NearbyPlayer::from).collect();

        let skills = client
            .skills()
            .into_iter()
            .map(|skill| SkillInfo {
                name: skill.name,
                boosted_level: skill.boosted_level,
                current_level: skill.real_level,
                experience: skill.experience,
            })
            .collect();

        let items = |stacks: Option<Vec<ItemStack>>| -> Vec<ItemInfo> {
            stacks
                .unwrap_or_default()
                .iter()
                .map(ItemInfo::from)
                .collect()
        };

        let account_type = client.account_type();

        Some(Self {
            player_name: player.name.clone(),
            account_type: account_type.name().to_string(),
            skull_icon: player.skull_icon.clone().unwrap_or_default(),
            event_type: event_type.unwrap_or(DEFAULT_EVENT_TYPE).to_string(),
            nearby_players,
            world_type: client.world_types(),
            location: [player.location.x, player.location.y, player.location.plane],
            combat_level: player.combat_level,
            world: client.world(),
            total_level: client.total_level(),
            is_ironman: account_type.is_ironman(),
            equipment: items(client.equipment()),
            inventory: items(client.inventory()),
            skills,
        })
    }

    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Metadata form field for an upload; empty when there is no local player.
pub fn metadata_json(client: &dyn GameClient, event_type: Option<&str>) -> AppResult<String> {
    match UploadMetadata::capture(client, event_type) {
        Some(metadata) => metadata.to_json(),
        None => {
            log::debug!("No local player, uploading without metadata");
            Ok(String::new())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Scripted game client shared by the other module tests.
    #[derive(Clone)]
    pub struct StubClient {
        pub state: GameState,
        pub local: Option<PlayerView>,
        pub others: Vec<PlayerView>,
        pub world_types: BTreeSet<WorldType>,
        pub account: AccountType,
        pub equipment: Option<Vec<ItemStack>>,
    }

    impl StubClient {
        pub fn logged_in(name: &str) -> Self {
            Self {
                state: GameState::LoggedIn,
                local: Some(PlayerView {
                    name: Some(name.to_string()),
                    combat_level: 126,
                    skull_icon: Some("SKULL".to_string()),
                    location: WorldPoint {
                        x: 3222,
                        y: 3218,
                        plane: 0,
                    },
                    ..Default::default()
                }),
                others: vec![PlayerView {
                    name: Some("Friend".to_string()),
                    combat_level: 90,
                    team: 3,
                    is_friend: true,
                    ..Default::default()
                }],
                world_types: BTreeSet::from([WorldType::Members]),
                account: AccountType::HardcoreIronman,
                equipment: Some(vec![ItemStack {
                    id: 4151,
                    quantity: 1,
                    name: "Abyssal whip".to_string(),
                }]),
            }
        }
    }

    impl GameClient for StubClient {
        fn game_state(&self) -> GameState {
            self.state
        }
        fn local_player(&self) -> Option<PlayerView> {
            self.local.clone()
        }
        fn players(&self) -> Vec<PlayerView> {
            self.local.iter().chain(self.others.iter()).cloned().collect()
        }
        fn skills(&self) -> Vec<SkillLevel> {
            vec![SkillLevel {
                name: "Attack".to_string(),
                boosted_level: 118,
                real_level: 99,
                experience: 13_034_431,
            }]
        }
        fn account_type(&self) -> AccountType {
            self.account
        }
        fn world(&self) -> i32 {
            302
        }
        fn world_types(&self) -> BTreeSet<WorldType> {
            self.world_types.clone()
        }
        fn total_level(&self) -> i32 {
            2277
        }
        fn equipment(&self) -> Option<Vec<ItemStack>> {
            self.equipment.clone()
        }
        fn inventory(&self) -> Option<Vec<ItemStack>> {
            None
        }
    }

    #[test]
    fn test_capture_excludes_local_player() {
        let client = StubClient::logged_in("Zezima");
        let metadata = UploadMetadata::capture(&client, None).unwrap();

        assert_eq!(metadata.player_name.as_deref(), Some("Zezima"));
        assert_eq!(metadata.nearby_players.len(), 1);
        assert_eq!(metadata.nearby_players[0].player_name.as_deref(), Some("Friend"));
        assert_eq!(metadata.event_type, DEFAULT_EVENT_TYPE);
        assert_eq!(metadata.location, [3222, 3218, 0]);
        assert!(metadata.is_ironman);
        assert_eq!(metadata.account_type, "HARDCORE_IRONMAN");
        assert!(metadata.inventory.is_empty());
        assert_eq!(metadata.equipment[0].name, "Abyssal whip");
    }

    #[test]
    fn test_lookalike_players_stay_nearby() {
        let mut client = StubClient::logged_in("Zezima");
        let unnamed = PlayerView {
            combat_level: 3,
            ..Default::default()
        };
        client.local.as_mut().unwrap().name = None;
        client.local.as_mut().unwrap().combat_level = 3;
        client.local.as_mut().unwrap().skull_icon = None;
        client.local.as_mut().unwrap().location = WorldPoint::default();
        client.others = vec![unnamed.clone(), unnamed];

        let metadata = UploadMetadata::capture(&client, None).unwrap();

        // Only our own entry is dropped, an identical stranger is kept
        assert_eq!(metadata.nearby_players.len(), 2);
        assert!(metadata.nearby_players.iter().all(|p| p.player_name.is_none()));
    }

    #[test]
    fn test_metadata_json_field_names() {
        let client = StubClient::logged_in("Zezima");
        let json = metadata_json(&client, Some("LEVEL_UP")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        for key in [
            "playerName",
            "accountType",
            "skullIcon",
            "eventType",
            "nearbyPlayers",
            "worldType",
            "location",
            "combatLevel",
            "world",
            "totalLevel",
            "isIronman",
            "equipment",
            "inventory",
            "skills",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(value["eventType"], "LEVEL_UP");
        assert_eq!(value["worldType"][0], "MEMBERS");
        assert_eq!(value["nearbyPlayers"][0]["isFriend"], true);
        assert_eq!(value["skills"][0]["currentLevel"], 99);
        assert_eq!(value["skills"][0]["boostedLevel"], 118);
    }

    #[test]
    fn test_metadata_empty_without_local_player() {
        let mut client = StubClient::logged_in("Zezima");
        client.local = None;
        assert_eq!(metadata_json(&client, None).unwrap(), "");
    }
}
