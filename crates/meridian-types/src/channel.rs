use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

const USER_CHANNEL_PREFIX: &str = "private-user-";

/// Name of the public channel carrying profile updates.
pub const PUBLIC_CHANNEL: &str = "user-updates";

/// A relay channel. Private channels belong to exactly one user and require
/// a signed subscription; the public channel does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    User(Uuid),
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl Channel {
    /// The user allowed to subscribe, if the channel is private.
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Public => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{}{}", USER_CHANNEL_PREFIX, id),
            Self::Public => f.write_str(PUBLIC_CHANNEL),
        }
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    /// Strict parse: `private-user-{uuid}` with nothing trailing, or the public channel.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PUBLIC_CHANNEL {
            return Ok(Self::Public);
        }
        s.strip_prefix(USER_CHANNEL_PREFIX)
            .and_then(|rest| Uuid::parse_str(rest).ok())
            .filter(|id| format!("{}{}", USER_CHANNEL_PREFIX, id) == s)
            .map(Self::User)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_channel_name_roundtrips() {
        let id = Uuid::new_v4();
        let name = Channel::User(id).to_string();
        assert_eq!(name, format!("private-user-{}", id));
        assert_eq!(name.parse::<Channel>(), Ok(Channel::User(id)));
    }

    #[test]
    fn rejects_suffixed_and_foreign_names() {
        let id = Uuid::new_v4();
        assert!(format!("private-user-{}extra", id).parse::<Channel>().is_err());
        assert!(format!("private-user-{}", id.simple()).parse::<Channel>().is_err());
        assert!("presence-lobby".parse::<Channel>().is_err());
        assert_eq!("user-updates".parse::<Channel>(), Ok(Channel::Public));
    }
}
