use std::time::Duration;

use crate::error::{LinkError, Result};

/// A `heart-beat` header value: `cx,cy` in milliseconds.
///
/// The first number is how often the sender can emit heartbeats, the second
/// how often it wants to receive them. `0` means "cannot" / "does not want".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

impl Heartbeat {
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    /// Parse a `heart-beat` header value such as `"4000,4000"`.
    pub fn parse(value: &str) -> Result<Self> {
        let (out, inc) = value.split_once(',').ok_or_else(|| {
            LinkError::ProtocolError(format!("Invalid heart-beat header '{}'", value))
        })?;
        let parse = |part: &str| {
            part.trim().parse::<u64>().map_err(|_| {
                LinkError::ProtocolError(format!("Invalid heart-beat header '{}'", value))
            })
        };
        Ok(Self::new(parse(out)?, parse(inc)?))
    }

    pub fn to_header(self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Negotiate the effective intervals between what this client requested
    /// and what the server answered in CONNECTED.
    ///
    /// Returns `(send_every, expect_every)`; a zero duration disables that
    /// direction.
    pub fn negotiate(client: Heartbeat, server: Heartbeat) -> (Duration, Duration) {
        let send = if client.outgoing_ms == 0 || server.incoming_ms == 0 {
            0
        } else {
            client.outgoing_ms.max(server.incoming_ms)
        };
        let expect = if client.incoming_ms == 0 || server.outgoing_ms == 0 {
            0
        } else {
            client.incoming_ms.max(server.outgoing_ms)
        };
        (Duration::from_millis(send), Duration::from_millis(expect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let hb = Heartbeat::parse("4000, 10000").unwrap();
        assert_eq!(hb, Heartbeat::new(4000, 10000));
        assert_eq!(Heartbeat::new(4000, 4000).to_header(), "4000,4000");
        assert!(Heartbeat::parse("4000").is_err());
        assert!(Heartbeat::parse("a,b").is_err());
    }

    #[test]
    fn test_negotiate_takes_the_slower_side() {
        let (send, expect) =
            Heartbeat::negotiate(Heartbeat::new(4000, 4000), Heartbeat::new(10000, 10000));
        assert_eq!(send, Duration::from_millis(10000));
        assert_eq!(expect, Duration::from_millis(10000));
    }

    #[test]
    fn test_negotiate_zero_disables_direction() {
        let (send, expect) =
            Heartbeat::negotiate(Heartbeat::new(4000, 4000), Heartbeat::new(0, 5000));
        assert_eq!(send, Duration::from_millis(5000));
        assert!(expect.is_zero());

        let (send, expect) = Heartbeat::negotiate(Heartbeat::new(4000, 4000), Heartbeat::default());
        assert!(send.is_zero());
        assert!(expect.is_zero());
    }
}
