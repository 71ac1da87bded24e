use crate::types::UserKey;
use serde::{Deserialize, Serialize};

/// Directed friendship, owner watches friend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FriendLink {
    pub owner: UserKey,
    pub friend: UserKey,
}

/// Friend list document as stored under the owner's key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FriendListDocument {
    #[serde(default)]
    pub friends: Vec<UserKey>,
}

impl FriendListDocument {
    /// Expand the list into links, dropping blanks, self-links and duplicates.
    pub fn links(&self, owner: &str) -> Vec<FriendLink> {
        let mut links: Vec<FriendLink> = Vec::with_capacity(self.friends.len());
        for friend in &self.friends {
            let friend = friend.trim();
            if friend.is_empty() || friend == owner {
                continue;
            }
            if links.iter().any(|link| link.friend == friend) {
                continue;
            }
            links.push(FriendLink { owner: owner.to_string(), friend: friend.to_string() });
        }
        links
    }
}
