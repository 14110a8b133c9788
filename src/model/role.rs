use serde::Serialize;
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Finance = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Finance),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_role_ids() {
        assert_eq!(Role::from_id(1), Some(Role::Admin));
        assert_eq!(Role::from_id(2), Some(Role::Hr));
        assert_eq!(Role::from_id(3), Some(Role::Finance));
        assert_eq!(Role::from_id(4), None);
        assert_eq!(Role::Finance.to_string(), "finance");
    }
}
