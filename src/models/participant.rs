use rand::Rng;
use serde::{Deserialize, Serialize};

/// A connection's presence inside a room: display identity plus the color
/// other participants render it with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection id. At most one live participant per connection id.
    pub id: String,
    pub username: String,
    /// Assigned at join, `#rrggbb`
    pub color: String,
    /// Durable account id when the connection presented a verified identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Participant {
    pub fn new(connection_id: &str, username: &str, user_id: Option<String>) -> Self {
        Self {
            id: connection_id.to_string(),
            username: username.to_string(),
            color: random_color(),
            user_id,
        }
    }
}

/// Random display color, uniform over the 24-bit RGB space.
pub fn random_color() -> String {
    let mut rng = rand::thread_rng();
    format!("#{:06x}", rng.gen_range(0u32..0x100_0000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_hex_rgb() {
        for _ in 0..64 {
            let color = random_color();
            assert_eq!(color.len(), 7);
            assert!(color.starts_with('#'));
            assert!(u32::from_str_radix(&color[1..], 16).is_ok());
        }
    }

    #[test]
    fn anonymous_participant_has_no_user_id() {
        let p = Participant::new("conn-1", "ada", None);
        assert_eq!(p.id, "conn-1");
        assert!(p.user_id.is_none());
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("userId").is_none());
    }
}
