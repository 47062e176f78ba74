//! Line-oriented wire codec.
//!
//! Every message is a single newline-terminated line classified by a fixed
//! prefix. Parsing is strict: trailing whitespace, missing fields, extra
//! fields, signs and non-canonical integers are all protocol errors, so
//! `encode(decode(line)) == line` holds for every well-formed message.

use std::fmt;
use std::str::FromStr;

use crate::cards::{Card, COLOURS, REAL_COLOURS};

/// Parse a canonical non-negative decimal: digits only, no sign, no
/// leading zero unless the number is exactly `0`.
pub fn parse_num(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Game and player names travel inside comma-separated lines (`rid`, the
/// scoreboard CSV), so they carry no comma, no newline, and are not empty.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(',') && !name.contains('\n')
}

fn parse_vec<const N: usize>(s: &str) -> Option<[u32; N]> {
    let mut out = [0u32; N];
    let mut fields = s.split(',');
    for slot in out.iter_mut() {
        *slot = fields.next().and_then(parse_num)?;
    }
    if fields.next().is_some() {
        return None;
    }
    Some(out)
}

struct Join<'a>(&'a [u32]);

impl fmt::Display for Join<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

//
// SEATS
//

/// A seat renders as its identity letter: seat 0 is `A`.
pub fn seat_letter(seat: usize) -> char {
    (b'A' + seat as u8) as char
}

fn seat_from_letter(s: &str) -> Option<usize> {
    let mut chars = s.chars();
    let ch = chars.next()?;
    if chars.next().is_some() || !ch.is_ascii_uppercase() {
        return None;
    }
    Some(ch as usize - 'A' as usize)
}

//
// RECONNECT ID
//

/// The `<game-name>,<game-counter>,<seat>` triple that identifies a player
/// slot for the reconnect handshake. Game names carry no commas, so the
/// three fields split unambiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectId {
    pub name: String,
    pub counter: u32,
    pub seat: usize,
}

impl fmt::Display for ReconnectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.name, self.counter, self.seat)
    }
}

impl FromStr for ReconnectId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        let mut fields = s.split(',');
        let name = fields.next().ok_or(())?;
        let counter = fields.next().and_then(parse_num).ok_or(())?;
        let seat = fields.next().and_then(parse_num).ok_or(())? as usize;
        if fields.next().is_some() || name.is_empty() {
            return Err(());
        }
        Ok(ReconnectId { name: name.to_string(), counter, seat })
    }
}

//
// SERVER → PLAYER
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMsg {
    /// `rid<name>,<gc>,<p>` — reconnect id assignment.
    Rid(ReconnectId),
    /// `playinfo<L>/<N>` — your seat letter and the player count.
    PlayInfo { seat: usize, count: usize },
    /// `tokens<n>` — initial size of each real-colour pile.
    Tokens(u32),
    /// `newcard<D>:<V>:<P>,<B>,<Y>,<R>` — card revealed onto the board.
    NewCard(Card),
    /// `purchased<L>:<c>:<P>,<B>,<Y>,<R>,<W>` — card bought with payment.
    Purchased { seat: usize, index: usize, pay: [u32; COLOURS] },
    /// `took<L>:<P>,<B>,<Y>,<R>` — non-wild tokens taken.
    Took { seat: usize, take: [u32; REAL_COLOURS] },
    /// `wild<L>` — a wild token taken.
    WildTaken { seat: usize },
    /// `player<L>:<s>:d=<…>:t=<…>` — catchup snapshot of one player.
    PlayerInfo {
        seat: usize,
        score: u32,
        discounts: [u32; REAL_COLOURS],
        wallet: [u32; COLOURS],
    },
    /// `dowhat` — it is your turn.
    DoWhat,
    /// `disco<L>` — game over, seat L disconnected for good.
    Disco { seat: usize },
    /// `invalid<L>` — game over, seat L misbehaved twice.
    Invalid { seat: usize },
    /// `eog` — normal end of game.
    Eog,
    Yes,
    No,
}

impl fmt::Display for ServerMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMsg::Rid(rid) => write!(f, "rid{rid}"),
            ServerMsg::PlayInfo { seat, count } =>
                write!(f, "playinfo{}/{}", seat_letter(*seat), count),
            ServerMsg::Tokens(n) => write!(f, "tokens{n}"),
            ServerMsg::NewCard(card) => write!(f, "newcard{card}"),
            ServerMsg::Purchased { seat, index, pay } =>
                write!(f, "purchased{}:{}:{}", seat_letter(*seat), index, Join(pay)),
            ServerMsg::Took { seat, take } =>
                write!(f, "took{}:{}", seat_letter(*seat), Join(take)),
            ServerMsg::WildTaken { seat } =>
                write!(f, "wild{}", seat_letter(*seat)),
            ServerMsg::PlayerInfo { seat, score, discounts, wallet } =>
                write!(
                    f,
                    "player{}:{}:d={}:t={}",
                    seat_letter(*seat),
                    score,
                    Join(discounts),
                    Join(wallet),
                ),
            ServerMsg::DoWhat => write!(f, "dowhat"),
            ServerMsg::Disco { seat } => write!(f, "disco{}", seat_letter(*seat)),
            ServerMsg::Invalid { seat } => write!(f, "invalid{}", seat_letter(*seat)),
            ServerMsg::Eog => write!(f, "eog"),
            ServerMsg::Yes => write!(f, "yes"),
            ServerMsg::No => write!(f, "no"),
        }
    }
}

impl ServerMsg {
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "dowhat" => return Some(Self::DoWhat),
            "eog"    => return Some(Self::Eog),
            "yes"    => return Some(Self::Yes),
            "no"     => return Some(Self::No),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("playinfo") {
            let (letter, count) = rest.split_once('/')?;
            return Some(Self::PlayInfo {
                seat: seat_from_letter(letter)?,
                count: parse_num(count)? as usize,
            });
        }
        if let Some(rest) = line.strip_prefix("player") {
            let mut parts = rest.split(':');
            let seat = seat_from_letter(parts.next()?)?;
            let score = parse_num(parts.next()?)?;
            let discounts = parse_vec(parts.next()?.strip_prefix("d=")?)?;
            let wallet = parse_vec(parts.next()?.strip_prefix("t=")?)?;
            if parts.next().is_some() {
                return None;
            }
            return Some(Self::PlayerInfo { seat, score, discounts, wallet });
        }
        if let Some(rest) = line.strip_prefix("purchased") {
            let mut parts = rest.split(':');
            let seat = seat_from_letter(parts.next()?)?;
            let index = parse_num(parts.next()?)? as usize;
            let pay = parse_vec(parts.next()?)?;
            if parts.next().is_some() {
                return None;
            }
            return Some(Self::Purchased { seat, index, pay });
        }
        if let Some(rest) = line.strip_prefix("newcard") {
            return rest.parse::<Card>().ok().map(Self::NewCard);
        }
        if let Some(rest) = line.strip_prefix("tokens") {
            return parse_num(rest).map(Self::Tokens);
        }
        if let Some(rest) = line.strip_prefix("took") {
            let (letter, take) = rest.split_once(':')?;
            return Some(Self::Took {
                seat: seat_from_letter(letter)?,
                take: parse_vec(take)?,
            });
        }
        if let Some(rest) = line.strip_prefix("wild") {
            return Some(Self::WildTaken { seat: seat_from_letter(rest)? });
        }
        if let Some(rest) = line.strip_prefix("rid") {
            return rest.parse::<ReconnectId>().ok().map(Self::Rid);
        }
        if let Some(rest) = line.strip_prefix("disco") {
            return Some(Self::Disco { seat: seat_from_letter(rest)? });
        }
        if let Some(rest) = line.strip_prefix("invalid") {
            return Some(Self::Invalid { seat: seat_from_letter(rest)? });
        }
        None
    }
}

//
// PLAYER → SERVER
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMsg {
    /// `play<key>` — authenticate to join a new game.
    Play(String),
    /// `reconnect<key>` — authenticate to resume a seat.
    Reconnect(String),
    /// `scores` — request the scoreboard.
    Scores,
    /// `rid<name>,<gc>,<p>` — the slot claimed after `reconnect` succeeds.
    Rid(ReconnectId),
    /// `purchase<c>:<P>,<B>,<Y>,<R>,<W>` — buy board card `c`.
    Purchase { index: usize, pay: [u32; COLOURS] },
    /// `take<P>,<B>,<Y>,<R>` — take three non-wild tokens.
    Take([u32; REAL_COLOURS]),
    /// `wild` — take one wild token.
    Wild,
}

impl fmt::Display for ClientMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMsg::Play(key) => write!(f, "play{key}"),
            ClientMsg::Reconnect(key) => write!(f, "reconnect{key}"),
            ClientMsg::Scores => write!(f, "scores"),
            ClientMsg::Rid(rid) => write!(f, "rid{rid}"),
            ClientMsg::Purchase { index, pay } =>
                write!(f, "purchase{}:{}", index, Join(pay)),
            ClientMsg::Take(take) => write!(f, "take{}", Join(take)),
            ClientMsg::Wild => write!(f, "wild"),
        }
    }
}

impl ClientMsg {
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "scores" => return Some(Self::Scores),
            "wild"   => return Some(Self::Wild),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("purchase") {
            let (index, pay) = rest.split_once(':')?;
            return Some(Self::Purchase {
                index: parse_num(index)? as usize,
                pay: parse_vec(pay)?,
            });
        }
        if let Some(rest) = line.strip_prefix("take") {
            return parse_vec(rest).map(Self::Take);
        }
        if let Some(rest) = line.strip_prefix("reconnect") {
            return Some(Self::Reconnect(rest.to_string()));
        }
        if let Some(rest) = line.strip_prefix("rid") {
            return rest.parse::<ReconnectId>().ok().map(Self::Rid);
        }
        if let Some(rest) = line.strip_prefix("play") {
            return Some(Self::Play(rest.to_string()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_round_trip(line: &str) {
        let msg = ServerMsg::parse(line).expect(line);
        assert_eq!(msg.to_string(), line);
    }

    fn client_round_trip(line: &str) {
        let msg = ClientMsg::parse(line).expect(line);
        assert_eq!(msg.to_string(), line);
    }

    #[test]
    fn every_server_message_round_trips() {
        for line in [
            "ridgame,2,0",
            "playinfoB/4",
            "tokens7",
            "newcardR:3:1,0,2,0",
            "purchasedA:0:1,0,0,0,2",
            "tookC:1,1,0,1",
            "wildD",
            "playerA:3:d=1,0,0,0:t=2,0,1,0,1",
            "dowhat",
            "discoB",
            "invalidZ",
            "eog",
            "yes",
            "no",
        ] {
            server_round_trip(line);
        }
    }

    #[test]
    fn every_client_message_round_trips() {
        for line in [
            "playsecret",
            "reconnectsecret",
            "scores",
            "ridg,1,0",
            "purchase3:0,1,0,0,1",
            "take1,0,1,1",
            "wild",
        ] {
            client_round_trip(line);
        }
    }

    #[test]
    fn numbers_are_canonical_decimal() {
        assert_eq!(parse_num("0"), Some(0));
        assert_eq!(parse_num("42"), Some(42));
        assert_eq!(parse_num("007"), None);
        assert_eq!(parse_num("+1"), None);
        assert_eq!(parse_num("-1"), None);
        assert_eq!(parse_num(""), None);
        assert_eq!(parse_num("1 "), None);
        assert_eq!(parse_num("99999999999999999999"), None);
    }

    #[test]
    fn trailing_or_missing_structure_is_rejected() {
        for line in [
            "dowhat ",
            "tokensr",
            "tokens",
            "took1,1,1,0",
            "tookA:1,1,1",
            "tookA:1,1,1,0,0",
            "wilda",
            "wildAB",
            "playinfoA2",
            "playerA:1:d=1,0,0,0",
            "purchasedA:0:1,0,0,0",
            "rid,1,0",
            "ridg,1",
            "ridg,1,0,9",
        ] {
            assert_eq!(ServerMsg::parse(line), None, "accepted {line:?}");
        }
        for line in ["takemelon", "take1,0,0", "purchase0", "purchase0:1,0,0,0", "wild "] {
            assert_eq!(ClientMsg::parse(line), None, "accepted {line:?}");
        }
    }

    #[test]
    fn names_reject_commas_newlines_and_empty() {
        assert!(valid_name("alice"));
        assert!(valid_name("Alice Smith"));
        assert!(!valid_name(""));
        assert!(!valid_name("a,b"));
        assert!(!valid_name("a\nb"));
    }

    #[test]
    fn auth_prefixes_capture_the_key_verbatim() {
        assert_eq!(
            ClientMsg::parse("playsecret"),
            Some(ClientMsg::Play("secret".into()))
        );
        assert_eq!(
            ClientMsg::parse("reconnect s3cr3t"),
            Some(ClientMsg::Reconnect(" s3cr3t".into()))
        );
        // An empty key still parses; it simply never matches the keyfile.
        assert_eq!(ClientMsg::parse("play"), Some(ClientMsg::Play(String::new())));
    }
}
