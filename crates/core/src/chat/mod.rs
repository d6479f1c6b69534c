//! Channel-filtered chat fan-out. Unlike the interest manager's spatial
//! broadcast, chat routing is membership-based, not distance-based.

use crate::entity::EntityRegistry;
use crate::net::Payload;

/// Wire `channel` byte values (`C2S_ChatMessage`/`S2C_ChatMessage`).
pub const CHANNEL_ALL: u8 = 0;
pub const CHANNEL_TEAM: u8 = 1;
pub const CHANNEL_WHISPER: u8 = 2;

/// One routable recipient: a connected, authenticated session's player-id
/// and faction membership, as the router needs it (kept separate from
/// `ClientConnection` so this module doesn't need to know about sessions).
#[derive(Debug, Clone, Copy)]
pub struct ChatRecipient {
    pub player_id: u32,
    pub faction_id: u32,
}

/// Determines which connected players should receive a chat message, given
/// its channel and the sender's own faction membership (looked up from
/// whichever entity the sender owns): filters by faction/team membership
/// or an explicit recipient, depending on the channel.
pub fn route(
    channel: u8,
    sender_player_id: u32,
    target_player_id: Option<u32>,
    registry: &EntityRegistry,
    recipients: &[ChatRecipient],
) -> Vec<u32> {
    match channel {
        CHANNEL_WHISPER => target_player_id.into_iter().collect(),
        CHANNEL_TEAM => {
            let sender_faction = registry
                .owned_by(sender_player_id)
                .map(|e| e.faction_id)
                .next()
                .unwrap_or(0);
            recipients
                .iter()
                .filter(|r| r.faction_id == sender_faction)
                .map(|r| r.player_id)
                .collect()
        }
        _ => recipients.iter().map(|r| r.player_id).collect(),
    }
}

/// Builds the outgoing payload for a chat message, independent of routing.
pub fn to_payload(channel: u8, sender_player_id: u32, target_player_id: Option<u32>, text: String) -> Payload {
    Payload::ChatMessage { channel, sender_player_id, target_player_id, text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;

    #[test]
    fn all_channel_reaches_every_recipient() {
        let registry = EntityRegistry::new();
        let recipients = [
            ChatRecipient { player_id: 1, faction_id: 0 },
            ChatRecipient { player_id: 2, faction_id: 5 },
        ];
        let routed = route(CHANNEL_ALL, 1, None, &registry, &recipients);
        assert_eq!(routed.len(), 2);
    }

    #[test]
    fn team_channel_only_reaches_same_faction() {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn(EntityType::PlayerCharacter, 1);
        registry.get_mut(handle.id()).unwrap().faction_id = 5;

        let recipients = [
            ChatRecipient { player_id: 1, faction_id: 5 },
            ChatRecipient { player_id: 2, faction_id: 9 },
        ];
        let routed = route(CHANNEL_TEAM, 1, None, &registry, &recipients);
        assert_eq!(routed, vec![1]);
    }

    #[test]
    fn whisper_reaches_only_the_explicit_target() {
        let registry = EntityRegistry::new();
        let recipients = [
            ChatRecipient { player_id: 1, faction_id: 0 },
            ChatRecipient { player_id: 2, faction_id: 0 },
        ];
        let routed = route(CHANNEL_WHISPER, 1, Some(2), &registry, &recipients);
        assert_eq!(routed, vec![2]);
    }
}
