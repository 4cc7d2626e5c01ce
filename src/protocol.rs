//! Hola-echo text protocol.
//!
//! There is no framing: a message is whatever arrives in one read of at most
//! [`MAX_MESSAGE_SIZE`] bytes, decoded as UTF-8. Each message is matched
//! against three rules, first match wins:
//!
//! ```text
//! Input (trimmed, case-folded)   Reply            Connection
//! desconexion                    (none)           closed by server
//! hola server                    Hola Cliente     stays open
//! anything else                  input uppercased stays open
//! ```

/// Largest chunk read from a connection in one call.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Token a client sends to end its session.
pub const DISCONNECT_KEYWORD: &str = "DESCONEXION";

/// Greeting that gets the special reply, compared in lowercase.
pub const GREETING: &str = "hola server";

/// Reply to [`GREETING`].
pub const GREETING_REPLY: &str = "Hola Cliente";

/// What the session should do with one received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Close the connection without replying.
    Disconnect,
    /// Send this payload and keep reading.
    Reply(String),
}

/// Apply the dispatch rules to a decoded message.
pub fn dispatch(message: &str) -> Action {
    if is_disconnect(message) {
        return Action::Disconnect;
    }

    if trim_edges(message).to_lowercase() == GREETING {
        Action::Reply(GREETING_REPLY.to_string())
    } else {
        Action::Reply(shout(message))
    }
}

/// True if the message is the disconnect keyword, ignoring case and edge
/// whitespace.
pub fn is_disconnect(message: &str) -> bool {
    trim_edges(message).to_uppercase() == DISCONNECT_KEYWORD
}

/// Strip edge whitespace, counting the ASCII separators `\x1c`..=`\x1f`
/// as whitespace too.
fn trim_edges(message: &str) -> &str {
    message.trim_matches(|c: char| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
}

/// Uppercase every letter, leaving everything else (whitespace included)
/// untouched.
///
/// Case mapping is per codepoint and locale-independent, so a few non-ASCII
/// letters expand (`ß` becomes `SS`).
pub fn shout(message: &str) -> String {
    message.to_uppercase()
}
