//! The cross-node channel directory.
//!
//! Several server processes ("channels") can share one logical world. The
//! directory tells a channel which other channels exist, who is connected
//! to each of them, and forwards relation events between them. Nothing it
//! says is guaranteed to be current, and posts may be lost: callers keep
//! local state correct on their own and treat the directory as a bonus.

use std::collections::HashMap;

use realmforge_protocol::{AccountId, VisualId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u32,
    pub address: String,
}

/// A character some channel reports as connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedCharacter {
    pub account_id: AccountId,
    pub character_id: VisualId,
    pub name: String,
}

/// A relation change that has to reach a character on another channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationEvent {
    /// `from` ended its friendship with `to`.
    FriendDeleted { from: VisualId, to: VisualId },
    /// `character` came online or went offline; `to` is one of its friends.
    FriendStatus {
        character: VisualId,
        to: VisualId,
        connected: bool,
    },
}

impl RelationEvent {
    /// The character the event is addressed to.
    pub fn recipient(&self) -> VisualId {
        match self {
            Self::FriendDeleted { to, .. } | Self::FriendStatus { to, .. } => *to,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("channel {0} is unknown")]
    UnknownChannel(u32),
}

/// Request/response access to the other channels.
pub trait ChannelDirectory: Send + Sync + 'static {
    fn list_channels(&self) -> Result<Vec<ChannelInfo>, DirectoryError>;

    fn list_connected_accounts(&self, channel: u32)
    -> Result<Vec<ConnectedCharacter>, DirectoryError>;

    /// Delivers `event` to `channel`, best effort.
    fn post_relation_event(&self, channel: u32, event: RelationEvent)
    -> Result<(), DirectoryError>;
}

/// The directory of a server that runs alone: there are no other channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnlyDirectory;

impl ChannelDirectory for LocalOnlyDirectory {
    fn list_channels(&self) -> Result<Vec<ChannelInfo>, DirectoryError> {
        Ok(Vec::new())
    }

    fn list_connected_accounts(
        &self,
        channel: u32,
    ) -> Result<Vec<ConnectedCharacter>, DirectoryError> {
        Err(DirectoryError::UnknownChannel(channel))
    }

    fn post_relation_event(
        &self,
        channel: u32,
        _event: RelationEvent,
    ) -> Result<(), DirectoryError> {
        Err(DirectoryError::UnknownChannel(channel))
    }
}

/// Finds a channel other than `own` that reports `character` as connected.
pub fn locate(
    directory: &dyn ChannelDirectory,
    own: u32,
    character: VisualId,
) -> Result<Option<u32>, DirectoryError> {
    for channel in directory.list_channels()? {
        if channel.id == own {
            continue;
        }
        let connected = directory.list_connected_accounts(channel.id)?;
        if connected.iter().any(|c| c.character_id == character) {
            return Ok(Some(channel.id));
        }
    }
    Ok(None)
}

/// Every character connected to a channel other than `own`, with its
/// channel.
pub fn connected_elsewhere(
    directory: &dyn ChannelDirectory,
    own: u32,
) -> Result<HashMap<VisualId, u32>, DirectoryError> {
    let mut index = HashMap::new();
    for channel in directory.list_channels()? {
        if channel.id == own {
            continue;
        }
        for connected in directory.list_connected_accounts(channel.id)? {
            index.insert(connected.character_id, channel.id);
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoChannels;

    impl ChannelDirectory for TwoChannels {
        fn list_channels(&self) -> Result<Vec<ChannelInfo>, DirectoryError> {
            Ok(vec![
                ChannelInfo { id: 1, address: "10.0.0.1:4000".into() },
                ChannelInfo { id: 2, address: "10.0.0.2:4000".into() },
            ])
        }

        fn list_connected_accounts(
            &self,
            channel: u32,
        ) -> Result<Vec<ConnectedCharacter>, DirectoryError> {
            let id = if channel == 1 { 10 } else { 20 };
            Ok(vec![ConnectedCharacter {
                account_id: AccountId(id),
                character_id: VisualId(id),
                name: format!("hero{id}"),
            }])
        }

        fn post_relation_event(
            &self,
            _channel: u32,
            _event: RelationEvent,
        ) -> Result<(), DirectoryError> {
            Ok(())
        }
    }

    #[test]
    fn test_locate_skips_own_channel() {
        assert_eq!(locate(&TwoChannels, 1, VisualId(20)).unwrap(), Some(2));
        assert_eq!(locate(&TwoChannels, 1, VisualId(10)).unwrap(), None);
        assert_eq!(locate(&TwoChannels, 2, VisualId(99)).unwrap(), None);
    }

    #[test]
    fn test_connected_elsewhere_indexes_other_channels() {
        let index = connected_elsewhere(&TwoChannels, 2).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&VisualId(10)), Some(&1));
    }

    #[test]
    fn test_local_only_directory_has_no_channels() {
        assert_eq!(locate(&LocalOnlyDirectory, 1, VisualId(5)).unwrap(), None);
        assert!(
            LocalOnlyDirectory
                .post_relation_event(
                    2,
                    RelationEvent::FriendDeleted { from: VisualId(1), to: VisualId(2) }
                )
                .is_err()
        );
    }

    #[test]
    fn test_relation_event_recipient() {
        let event = RelationEvent::FriendStatus {
            character: VisualId(1),
            to: VisualId(2),
            connected: true,
        };
        assert_eq!(event.recipient(), VisualId(2));
    }
}
