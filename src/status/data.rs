//! The status JSON document and the flat summary built from it.

use serde::{Deserialize, Serialize};

/// What a status query reports about a server.
///
/// A failed query yields [`StatusResult::offline`], which is also the
/// [`Default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    /// Whether the server answered the query.
    pub online: bool,
    /// Players currently connected.
    pub players_online: u32,
    /// Player slots.
    pub players_max: u32,
    /// The game version name the server reports (e.g. `1.20.1`).
    pub version: String,
    /// The message of the day, flattened to plain text.
    pub motd: String,
}

impl StatusResult {
    /// The result reported for a server that could not be queried.
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Version reported when the document leaves it out.
const UNKNOWN_VERSION: &str = "Unknown";

impl From<StatusResponse> for StatusResult {
    fn from(response: StatusResponse) -> Self {
        let players = response.players.unwrap_or_default();

        Self {
            online: true,
            players_online: players.online,
            players_max: players.max,
            version: response
                .version
                .and_then(|version| version.name)
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            motd: response
                .description
                .as_ref()
                .map(ChatObject::plain_text)
                .unwrap_or_default(),
        }
    }
}

/// Response from the server with status information.
/// Represents [this JSON object](https://wiki.vg/Server_List_Ping#Status_Response)
/// to be deserialized.
///
/// Every field is optional; servers and proxies leave out whatever they like.
#[derive(Debug, Default, Deserialize)]
pub struct StatusResponse {
    /// Information about the game and protocol version.
    #[serde(default)]
    pub version: Option<Version>,

    /// Information about players on the server.
    #[serde(default)]
    pub players: Option<Players>,

    /// The "motd" - message shown in the server list by the client.
    #[serde(default)]
    pub description: Option<ChatObject>,

    /// URI to the server's favicon.
    #[serde(default)]
    pub favicon: Option<String>,

    /// Does the server use signed chat messages?
    /// Only returned for servers post 1.19.1
    #[serde(default, rename = "enforcesSecureChat")]
    pub enforces_secure_chat: Option<bool>,
}

/// Player counts, plus a few of the players online.
#[derive(Debug, Default, Deserialize)]
pub struct Players {
    /// The maximum number of players allowed on the server.
    #[serde(default)]
    pub max: u32,

    /// The number of players currently online.
    #[serde(default)]
    pub online: u32,

    /// A listing of some online players.
    #[serde(default)]
    pub sample: Option<Vec<Sample>>,
}

/// A player listed on the server's list ping information.
///
/// Servers often put arbitrary lines of text here instead of real players,
/// so neither field is guaranteed.
#[derive(Debug, Deserialize)]
pub struct Sample {
    /// The player's username.
    #[serde(default)]
    pub name: Option<String>,

    /// The player's UUID.
    #[serde(default)]
    pub id: Option<String>,
}

/// Version information about the server.
#[derive(Debug, Deserialize)]
pub struct Version {
    /// The game version (e.g: 1.19.1)
    #[serde(default)]
    pub name: Option<String>,

    /// See [the wiki.vg page](https://wiki.vg/Protocol_version_numbers) for a
    /// reference on what versions these correspond to.
    #[serde(default)]
    pub protocol: Option<i64>,
}

/// Represents a chat object (the MOTD is sent as a chat object).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatObject {
    /// A bare string
    Text(String),

    /// Vector of multiple chat objects
    Array(Vec<ChatObject>),

    /// An individual chat component
    Component(ChatComponent),

    /// Unknown data - raw JSON
    Other(serde_json::Value),
}

/// The part of a chat component that carries text. Styling is ignored.
#[derive(Debug, Deserialize)]
pub struct ChatComponent {
    /// Text of the chat message
    #[serde(default)]
    pub text: Option<String>,

    /// Sibling components, rendered after `text`.
    #[serde(default)]
    pub extra: Option<Vec<ChatObject>>,
}

impl ChatObject {
    /// Concatenate the text of this object and its children in display order.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Component(component) => {
                if let Some(text) = &component.text {
                    out.push_str(text);
                }
                for child in component.extra.iter().flatten() {
                    child.push_text(out);
                }
            }
            Self::Array(children) => {
                for child in children {
                    child.push_text(out);
                }
            }
            Self::Other(_) => {}
        }
    }
}
