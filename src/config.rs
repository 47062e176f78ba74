//! Start-up configuration: the shared-secret keyfile and the statfile that
//! enumerates listening ports with their play parameters.

use thiserror::Error;

use crate::game::GameConfig;
use crate::protocol::parse_num;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("keyfile must be exactly one non-empty line without a trailing newline")]
    BadKeyfile,
    #[error("statfile is empty")]
    EmptyStatfile,
    #[error("statfile must not end with a trailing newline")]
    StatfileTrailingNewline,
    #[error("bad statfile entry on line {line}")]
    BadStatEntry { line: usize },
    #[error("duplicate port {port} in statfile")]
    DuplicatePort { port: u16 },
}

/// The keyfile holds the shared secret: one non-empty line, no trailing
/// newline, loaded once at start-up.
pub fn parse_keyfile(contents: &str) -> Result<String, ConfigError> {
    if contents.is_empty() || contents.contains('\n') {
        return Err(ConfigError::BadKeyfile);
    }
    Ok(contents.to_string())
}

/// One statfile entry: a port to listen on and the parameters every game
/// created through that port starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    /// 0 means "kernel-chosen ephemeral"; replaced by the bound port.
    pub port: u16,
    pub tokens: u32,
    pub points: u32,
    pub players: usize,
}

impl PortConfig {
    pub fn game_config(&self) -> GameConfig {
        GameConfig { tokens: self.tokens, points: self.points }
    }
}

/// Parse the statfile: one `port,tokens,points,players` entry per line,
/// no trailing newline, no duplicate non-zero ports.
pub fn parse_statfile(contents: &str) -> Result<Vec<PortConfig>, ConfigError> {
    if contents.is_empty() {
        return Err(ConfigError::EmptyStatfile);
    }
    if contents.ends_with('\n') {
        return Err(ConfigError::StatfileTrailingNewline);
    }

    let mut entries: Vec<PortConfig> = Vec::new();
    for (i, line) in contents.split('\n').enumerate() {
        let entry = parse_entry(line).ok_or(ConfigError::BadStatEntry { line: i + 1 })?;
        if entry.port != 0 && entries.iter().any(|e| e.port == entry.port) {
            return Err(ConfigError::DuplicatePort { port: entry.port });
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_entry(line: &str) -> Option<PortConfig> {
    let mut fields = line.split(',');
    let port = parse_num(fields.next()?)?;
    let tokens = parse_num(fields.next()?)?;
    let points = parse_num(fields.next()?)?;
    let players = parse_num(fields.next()?)? as usize;
    if fields.next().is_some() {
        return None;
    }
    if port > u16::MAX as u32 || tokens < 1 || points < 1 {
        return None;
    }
    if !(2..=26).contains(&players) {
        return None;
    }
    Some(PortConfig { port: port as u16, tokens, points, players })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyfile_is_one_bare_line() {
        assert_eq!(parse_keyfile("secret"), Ok("secret".to_string()));
        assert_eq!(parse_keyfile(""), Err(ConfigError::BadKeyfile));
        assert_eq!(parse_keyfile("secret\n"), Err(ConfigError::BadKeyfile));
        assert_eq!(parse_keyfile("a\nb"), Err(ConfigError::BadKeyfile));
    }

    #[test]
    fn statfile_parses_multiple_entries_in_order() {
        let entries = parse_statfile("0,3,1,2\n4001,7,20,4").unwrap();
        assert_eq!(
            entries,
            vec![
                PortConfig { port: 0, tokens: 3, points: 1, players: 2 },
                PortConfig { port: 4001, tokens: 7, points: 20, players: 4 },
            ]
        );
    }

    #[test]
    fn statfile_rejects_trailing_newline() {
        assert_eq!(
            parse_statfile("0,3,1,2\n"),
            Err(ConfigError::StatfileTrailingNewline)
        );
        assert_eq!(parse_statfile(""), Err(ConfigError::EmptyStatfile));
    }

    #[test]
    fn statfile_rejects_out_of_range_fields() {
        for bad in [
            "65536,3,1,2",
            "0,0,1,2",
            "0,3,0,2",
            "0,3,1,1",
            "0,3,1,27",
            "0,3,1",
            "0,3,1,2,9",
            "0,3,1,2 ",
            "-1,3,1,2",
            "0,03,1,2",
        ] {
            assert_eq!(
                parse_statfile(bad),
                Err(ConfigError::BadStatEntry { line: 1 }),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn duplicate_nonzero_ports_are_rejected_but_zero_repeats() {
        assert_eq!(
            parse_statfile("4001,3,1,2\n4001,3,1,2"),
            Err(ConfigError::DuplicatePort { port: 4001 })
        );
        assert!(parse_statfile("0,3,1,2\n0,3,1,2").is_ok());
    }
}
