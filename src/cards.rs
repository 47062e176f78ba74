use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::protocol::parse_num;

//
// COLOURS
//

pub const REAL_COLOURS: usize = 4;
pub const COLOURS: usize = 5;
/// Wallet index of the wild pseudo-colour.
pub const WILD: usize = 4;

/// Token colour. The four real colours plus the wild pseudo-colour.
///
/// The order is fixed and externally observable: every price, payment and
/// wallet vector on the wire is indexed Purple, Brown, Yellow, Red (then
/// Wild where wallets are concerned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Purple,
    Brown,
    Yellow,
    Red,
    Wild,
}

impl Colour {
    pub const REAL: [Colour; REAL_COLOURS] =
        [Colour::Purple, Colour::Brown, Colour::Yellow, Colour::Red];

    /// Position of this colour in a wallet vector.
    pub fn index(self) -> usize {
        match self {
            Colour::Purple => 0,
            Colour::Brown  => 1,
            Colour::Yellow => 2,
            Colour::Red    => 3,
            Colour::Wild   => 4,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Colour::Purple => 'P',
            Colour::Brown  => 'B',
            Colour::Yellow => 'Y',
            Colour::Red    => 'R',
            Colour::Wild   => 'W',
        }
    }

    /// Inverse of [`Colour::letter`] for the four real colours only.
    /// Wild never appears as a card discount or pile colour.
    pub fn real_from_letter(ch: char) -> Option<Colour> {
        match ch {
            'P' => Some(Colour::Purple),
            'B' => Some(Colour::Brown),
            'Y' => Some(Colour::Yellow),
            'R' => Some(Colour::Red),
            _   => None,
        }
    }
}

//
// CARDS
//

/// An immutable card: a discount colour, a point value and a price vector
/// over the four real colours.
///
/// `Card` serialises as `D:V:P,B,Y,R`; the deck-file line format and the
/// payload of the `newcard` broadcast are the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub discount: Colour,
    pub value: u32,
    pub cost: [u32; REAL_COLOURS],
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{},{},{},{}",
            self.discount.letter(),
            self.value,
            self.cost[0],
            self.cost[1],
            self.cost[2],
            self.cost[3],
        )
    }
}

impl FromStr for Card {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        let mut parts = s.split(':');
        let colour = parts.next().ok_or(())?;
        let value  = parts.next().ok_or(())?;
        let costs  = parts.next().ok_or(())?;
        if parts.next().is_some() {
            return Err(());
        }

        let mut chars = colour.chars();
        let discount = chars
            .next()
            .and_then(Colour::real_from_letter)
            .ok_or(())?;
        if chars.next().is_some() {
            return Err(());
        }

        let value = parse_num(value).ok_or(())?;

        let mut cost = [0u32; REAL_COLOURS];
        let mut fields = costs.split(',');
        for slot in cost.iter_mut() {
            *slot = fields.next().and_then(parse_num).ok_or(())?;
        }
        if fields.next().is_some() {
            return Err(());
        }

        Ok(Card { discount, value, cost })
    }
}

//
// DECK
//

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeckError {
    #[error("deck file is empty")]
    Empty,
    #[error("deck file does not end with a newline")]
    MissingNewline,
    #[error("bad card on line {line}")]
    BadCard { line: usize },
}

/// The ordered draw pile, loaded once at start-up. Each game plays from a
/// fresh clone in file order; the deck itself is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck(Vec<Card>);

impl Deck {
    /// Parse a deck file: one `D:V:P,B,Y,R` card per line, at least one
    /// card, a final newline, no blank lines, no stray whitespace.
    pub fn parse(contents: &str) -> Result<Deck, DeckError> {
        if contents.is_empty() {
            return Err(DeckError::Empty);
        }
        let body = contents
            .strip_suffix('\n')
            .ok_or(DeckError::MissingNewline)?;

        let mut cards = Vec::new();
        for (i, line) in body.split('\n').enumerate() {
            let card = line
                .parse::<Card>()
                .map_err(|()| DeckError::BadCard { line: i + 1 })?;
            cards.push(card);
        }
        Ok(Deck(cards))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_round_trips_through_its_line_format() {
        let card: Card = "B:2:0,1,1,2".parse().unwrap();
        assert_eq!(card.discount, Colour::Brown);
        assert_eq!(card.value, 2);
        assert_eq!(card.cost, [0, 1, 1, 2]);
        assert_eq!(card.to_string(), "B:2:0,1,1,2");
    }

    #[test]
    fn card_rejects_structural_deviations() {
        for bad in [
            "",
            "B",
            "B:2",
            "B:2:0,1,1",
            "B:2:0,1,1,2,3",
            "W:2:0,1,1,2",
            "BB:2:0,1,1,2",
            "B:2:0,1,1,2 ",
            "B:-1:0,1,1,2",
            "B:02:0,1,1,2",
            "B:2:0,1,1,2:extra",
        ] {
            assert!(bad.parse::<Card>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn deck_parses_in_file_order() {
        let deck = Deck::parse("P:1:0,0,0,0\nB:0:1,1,1,1\n").unwrap();
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.cards()[0].discount, Colour::Purple);
        assert_eq!(deck.cards()[1].discount, Colour::Brown);
    }

    #[test]
    fn deck_requires_final_newline() {
        assert_eq!(
            Deck::parse("P:1:0,0,0,0"),
            Err(DeckError::MissingNewline)
        );
    }

    #[test]
    fn deck_rejects_blank_lines_and_empty_files() {
        assert_eq!(Deck::parse(""), Err(DeckError::Empty));
        assert_eq!(Deck::parse("\n"), Err(DeckError::BadCard { line: 1 }));
        assert_eq!(
            Deck::parse("P:1:0,0,0,0\n\nB:0:1,1,1,1\n"),
            Err(DeckError::BadCard { line: 2 })
        );
    }
}
