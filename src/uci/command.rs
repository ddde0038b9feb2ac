//! Command parsing.

use crate::board::types::Color;
use crate::board::Board;
use crate::search::time::Limits;

/// A parsed `go` command.
#[derive(Clone, Debug, Default)]
pub struct GoCommand {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub moves_to_go: Option<u32>,
    pub movetime: Option<u64>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
}

impl GoCommand {
    /// Collapse to the side-to-move's limits.
    #[must_use]
    pub fn to_limits(&self, turn: Color) -> Limits {
        let (time, inc) = match turn {
            Color::White => (self.wtime, self.winc),
            Color::Black => (self.btime, self.binc),
        };
        Limits {
            time,
            inc,
            moves_to_go: self.moves_to_go,
            movetime: self.movetime,
            depth: self.depth,
            nodes: self.nodes,
            infinite: self.infinite,
        }
    }
}

#[derive(Debug)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    SetOption { name: String, value: String },
    Position { board: Board },
    Go(GoCommand),
    Stop,
    Quit,
    Perft(u32),
    Bench(i32),
}

impl UciCommand {
    /// Parse one input line. Unknown commands and malformed arguments
    /// come back as `Err(message)` so the caller can report and carry
    /// on.
    pub fn parse(line: &str) -> Result<UciCommand, String> {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return Err(String::from("empty command"));
        };

        match head {
            "uci" => Ok(UciCommand::Uci),
            "isready" => Ok(UciCommand::IsReady),
            "ucinewgame" => Ok(UciCommand::NewGame),
            "stop" => Ok(UciCommand::Stop),
            "quit" => Ok(UciCommand::Quit),
            "setoption" => parse_setoption(line),
            "position" => parse_position(&mut tokens),
            "go" => parse_go(&mut tokens),
            "perft" => {
                let depth = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| String::from("perft requires a depth"))?;
                Ok(UciCommand::Perft(depth))
            }
            "bench" => {
                let depth = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(8);
                Ok(UciCommand::Bench(depth))
            }
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

fn parse_setoption(line: &str) -> Result<UciCommand, String> {
    // setoption name <name...> [value <value...>]
    let rest = line
        .strip_prefix("setoption")
        .unwrap_or(line)
        .trim_start();
    let rest = rest
        .strip_prefix("name")
        .ok_or_else(|| String::from("setoption requires a name"))?
        .trim_start();

    let (name, value) = match rest.find(" value ") {
        Some(split) => (&rest[..split], rest[split + 7..].trim()),
        None => (rest, ""),
    };

    Ok(UciCommand::SetOption {
        name: name.trim().to_string(),
        value: value.to_string(),
    })
}

fn parse_position<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<UciCommand, String> {
    let mut board = match tokens.next() {
        Some("startpos") => Board::new(),
        Some("fen") => {
            // The FEN occupies everything up to an optional `moves`
            let fields: Vec<&str> = tokens
                .by_ref()
                .take_while(|&t| t != "moves")
                .collect();
            let board: Board = fields
                .join(" ")
                .parse()
                .map_err(|err| format!("bad FEN: {err}"))?;

            // take_while consumed the `moves` token; apply the rest
            let mut board = board;
            for text in tokens.by_ref() {
                let mv = board
                    .parse_uci_move(text)
                    .map_err(|err| format!("bad move list: {err}"))?;
                board.make_move(mv);
            }
            return Ok(UciCommand::Position { board });
        }
        _ => return Err(String::from("position requires startpos or fen")),
    };

    if tokens.next() == Some("moves") {
        for text in tokens.by_ref() {
            let mv = board
                .parse_uci_move(text)
                .map_err(|err| format!("bad move list: {err}"))?;
            board.make_move(mv);
        }
    }

    Ok(UciCommand::Position { board })
}

fn parse_go<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<UciCommand, String> {
    let mut go = GoCommand::default();

    while let Some(token) = tokens.next() {
        let mut number = |name: &str| -> Result<u64, String> {
            tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| format!("go {name} requires a number"))
        };

        match token {
            "wtime" => go.wtime = Some(number("wtime")?),
            "btime" => go.btime = Some(number("btime")?),
            "winc" => go.winc = number("winc")?,
            "binc" => go.binc = number("binc")?,
            "movestogo" => go.moves_to_go = Some(number("movestogo")? as u32),
            "movetime" => go.movetime = Some(number("movetime")?),
            "depth" => go.depth = Some(number("depth")? as i32),
            "nodes" => go.nodes = Some(number("nodes")?),
            "infinite" => go.infinite = true,
            // `ponder` and `searchmoves` are tolerated and ignored
            "ponder" => {}
            "searchmoves" => break,
            other => return Err(format!("unknown go parameter '{other}'")),
        }
    }

    Ok(UciCommand::Go(go))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_commands() {
        assert!(matches!(UciCommand::parse("uci"), Ok(UciCommand::Uci)));
        assert!(matches!(
            UciCommand::parse("isready"),
            Ok(UciCommand::IsReady)
        ));
        assert!(matches!(UciCommand::parse("stop"), Ok(UciCommand::Stop)));
        assert!(UciCommand::parse("flurble").is_err());
        assert!(UciCommand::parse("").is_err());
    }

    #[test]
    fn parses_position_with_moves() {
        let parsed = UciCommand::parse("position startpos moves e2e4 e7e5 g1f3").unwrap();
        let UciCommand::Position { board } = parsed else {
            panic!("expected a position");
        };
        assert_eq!(board.turn(), Color::Black);
        assert_eq!(board.ply(), 3);
    }

    #[test]
    fn parses_position_fen() {
        let parsed = UciCommand::parse(
            "position fen r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1 moves e5g6",
        )
        .unwrap();
        let UciCommand::Position { board } = parsed else {
            panic!("expected a position");
        };
        assert_eq!(board.turn(), Color::Black);
    }

    #[test]
    fn rejects_illegal_position_moves() {
        assert!(UciCommand::parse("position startpos moves e2e5").is_err());
        assert!(UciCommand::parse("position fen garbage w - - 0 1").is_err());
    }

    #[test]
    fn parses_go_clock() {
        let parsed =
            UciCommand::parse("go wtime 30000 btime 28000 winc 100 binc 100 movestogo 20")
                .unwrap();
        let UciCommand::Go(go) = parsed else {
            panic!("expected go");
        };
        assert_eq!(go.wtime, Some(30_000));
        assert_eq!(go.moves_to_go, Some(20));

        let white = go.to_limits(Color::White);
        assert_eq!(white.time, Some(30_000));
        assert_eq!(white.inc, 100);
        let black = go.to_limits(Color::Black);
        assert_eq!(black.time, Some(28_000));
    }

    #[test]
    fn parses_setoption_with_spaces() {
        let parsed = UciCommand::parse("setoption name Eval File value nets/my net.bin").unwrap();
        let UciCommand::SetOption { name, value } = parsed else {
            panic!("expected setoption");
        };
        assert_eq!(name, "Eval File");
        assert_eq!(value, "nets/my net.bin");
    }
}
