use std::fmt;

/// Verbosity gate for one diagnostic line.
///
/// `Warn` and `Info` always print; each additional `-v` on the command
/// line unlocks the next level down (`Verbose`, `Debug`, `Trace`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Warn    => "WARN",
            Level::Info    => "INFO",
            Level::Verbose => "VERB",
            Level::Debug   => "DEBG",
            Level::Trace   => "TRCE",
        }
    }

    fn gate(self) -> u8 {
        match self {
            Level::Warn | Level::Info => 0,
            Level::Verbose => 1,
            Level::Debug   => 2,
            Level::Trace   => 3,
        }
    }
}

/// Stderr diagnostics, gated by the `-v` count.
///
/// Anything implementing [`fmt::Display`] can be logged, so the event
/// enums render themselves and nothing is formatted for a line the
/// current verbosity drops. The server runs many games at once, so
/// per-game lines go through [`Logger::game`], which stamps each line
/// with the owning game's name and counter:
///
/// ```text
/// [VERB] Accepted 127.0.0.1:52114 on port 4001
/// [VERB] [game g.2] B → take1,1,0,1
/// ```
pub struct Logger {
    verbosity: u8,
}

impl Logger {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.verbosity >= level.gate()
    }

    pub fn log(&self, level: Level, msg: impl fmt::Display) {
        if self.enabled(level) {
            eprintln!("[{}] {msg}", level.tag());
        }
    }

    pub fn warn   (&self, msg: impl fmt::Display) { self.log(Level::Warn,    msg); }
    pub fn info   (&self, msg: impl fmt::Display) { self.log(Level::Info,    msg); }
    pub fn verbose(&self, msg: impl fmt::Display) { self.log(Level::Verbose, msg); }
    pub fn debug  (&self, msg: impl fmt::Display) { self.log(Level::Debug,   msg); }
    pub fn trace  (&self, msg: impl fmt::Display) { self.log(Level::Trace,   msg); }

    /// A view of this logger scoped to one game. Lines from different
    /// games interleave on stderr; the tag keeps them attributable.
    pub fn game(&self, name: &str, counter: u32) -> GameLog<'_> {
        GameLog { logger: self, name: name.to_string(), counter }
    }
}

/// A [`Logger`] plus the `name.counter` identity of one game.
pub struct GameLog<'a> {
    logger: &'a Logger,
    name: String,
    counter: u32,
}

impl GameLog<'_> {
    pub fn log(&self, level: Level, msg: impl fmt::Display) {
        if self.logger.enabled(level) {
            eprintln!("[{}] [game {}.{}] {msg}", level.tag(), self.name, self.counter);
        }
    }

    pub fn verbose(&self, msg: impl fmt::Display) { self.log(Level::Verbose, msg); }
    pub fn debug  (&self, msg: impl fmt::Display) { self.log(Level::Debug,   msg); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_and_info_always_pass_the_gate() {
        let quiet = Logger::new(0);
        assert!(quiet.enabled(Level::Warn));
        assert!(quiet.enabled(Level::Info));
        assert!(!quiet.enabled(Level::Verbose));
        assert!(!quiet.enabled(Level::Trace));
    }

    #[test]
    fn each_flag_unlocks_one_more_level() {
        assert!(Logger::new(1).enabled(Level::Verbose));
        assert!(!Logger::new(1).enabled(Level::Debug));
        assert!(Logger::new(2).enabled(Level::Debug));
        assert!(Logger::new(3).enabled(Level::Trace));
    }
}
