//! UCI protocol front end.
//!
//! Reads commands from stdin, drives the search pool, and writes
//! line-buffered, explicitly flushed responses to stdout. Searches run
//! on a background thread so `stop` stays responsive; malformed input
//! is reported as `info string` and dropped, never fatal.

mod command;
mod print;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::board::{attacks, Board};
use crate::nnue::Network;
use crate::search::smp::SearchPool;
use crate::search::time::Limits;
use crate::search::InfoCallback;

pub use command::{GoCommand, UciCommand};

const NAME: &str = concat!("Sable ", env!("CARGO_PKG_VERSION"));

const DEFAULT_HASH_MB: usize = 16;
const MAX_HASH_MB: usize = 65_536;

struct Engine {
    board: Board,
    pool: Arc<Mutex<SearchPool>>,
    stop: Arc<AtomicBool>,
    searcher: Option<JoinHandle<()>>,
}

impl Engine {
    fn new() -> Self {
        Engine {
            board: Board::new(),
            pool: Arc::new(Mutex::new(SearchPool::new(DEFAULT_HASH_MB, 1))),
            stop: Arc::new(AtomicBool::new(false)),
            searcher: None,
        }
    }

    fn join_search(&mut self) {
        if let Some(handle) = self.searcher.take() {
            let _ = handle.join();
        }
    }

    fn stop_search(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.join_search();
    }
}

/// Main command loop. Returns when `quit` arrives or stdin closes.
pub fn run() {
    // Build the attack tables before any search thread exists
    attacks::init();

    let mut engine = Engine::new();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match UciCommand::parse(&line) {
            Ok(UciCommand::Quit) => {
                engine.stop_search();
                break;
            }
            Ok(command) => {
                if !dispatch(&mut engine, command) {
                    break;
                }
            }
            Err(message) => print::info_string(&message),
        }
    }
}

fn dispatch(engine: &mut Engine, command: UciCommand) -> bool {
    match command {
        UciCommand::Uci => {
            print::id_and_options(NAME, DEFAULT_HASH_MB, MAX_HASH_MB);
        }

        UciCommand::IsReady => {
            print::ready();
        }

        UciCommand::NewGame => {
            engine.stop_search();
            engine.pool.lock().new_game();
            engine.board = Board::new();
        }

        UciCommand::SetOption { name, value } => {
            engine.stop_search();
            set_option(engine, &name, &value);
        }

        UciCommand::Position { board } => {
            engine.join_search();
            engine.board = board;
        }

        UciCommand::Go(go) => {
            engine.join_search();
            start_search(engine, go);
        }

        UciCommand::Stop => {
            engine.stop_search();
        }

        UciCommand::Perft(depth) => {
            engine.join_search();
            let nodes = engine.board.clone().perft(depth);
            print::perft(nodes);
        }

        UciCommand::Bench(depth) => {
            engine.join_search();
            bench(engine, depth);
        }

        UciCommand::Quit => return false,
    }
    true
}

fn set_option(engine: &mut Engine, name: &str, value: &str) {
    match name.to_ascii_lowercase().as_str() {
        "hash" => match value.parse::<usize>() {
            Ok(megabytes) if (1..=MAX_HASH_MB).contains(&megabytes) => {
                engine.pool.lock().set_hash(megabytes);
            }
            _ => print::info_string(&format!("invalid Hash value '{value}'")),
        },
        "threads" => match value.parse::<usize>() {
            Ok(threads) if (1..=2048).contains(&threads) => {
                engine.pool.lock().set_threads(threads);
            }
            _ => print::info_string(&format!("invalid Threads value '{value}'")),
        },
        "multipv" => match value.parse::<usize>() {
            Ok(multipv) if (1..=256).contains(&multipv) => {
                engine.pool.lock().set_multipv(multipv);
            }
            _ => print::info_string(&format!("invalid MultiPV value '{value}'")),
        },
        "evalfile" => {
            if value.is_empty() || value == "<empty>" {
                engine.pool.lock().set_network(None);
                return;
            }
            match Network::load(value) {
                Ok(network) => engine.pool.lock().set_network(Some(Arc::new(network))),
                Err(err) => {
                    // Fall back to the hand-crafted evaluation
                    print::info_string(&format!("unable to read network '{value}': {err}"));
                    engine.pool.lock().set_network(None);
                }
            }
        }
        // Accepted so GUIs can set it; probing is not implemented
        "syzygypath" => {}
        // Unrecognized options are accepted and ignored per convention
        _ => {}
    }
}

fn start_search(engine: &mut Engine, go: GoCommand) {
    let limits = go.to_limits(engine.board.turn());
    let board = engine.board.clone();
    let pool = Arc::clone(&engine.pool);

    engine.stop.store(false, Ordering::Relaxed);
    let stop = Arc::clone(&engine.stop);

    let info: InfoCallback = Arc::new(print::report);

    let handle = std::thread::Builder::new()
        .name("go".into())
        .spawn(move || {
            let result = pool.lock().search(&board, &limits, stop, Some(info));

            let best = if result.best_move.is_none() {
                // Mated or stalemated root, or stopped before a single
                // depth finished: fall back to any legal move
                board.clone().gen_legal().as_slice().first().copied()
            } else {
                Some(result.best_move)
            };
            print::best_move(best, result.ponder);
        })
        .expect("failed to spawn search");

    engine.searcher = Some(handle);
}

/// Fixed positions searched to a fixed depth; prints total nodes and
/// speed. Used for quick regression and speed measurements.
fn bench(engine: &mut Engine, depth: i32) {
    const BENCH_FENS: [&str; 6] = [
        crate::board::START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    ];

    let start = std::time::Instant::now();
    let mut total_nodes = 0u64;

    for fen in BENCH_FENS {
        let board: Board = fen.parse().expect("bench position parses");
        let stop = Arc::new(AtomicBool::new(false));
        let result = engine
            .pool
            .lock()
            .search(&board, &Limits::depth(depth), stop, None);
        total_nodes += result.nodes;
    }

    let elapsed = start.elapsed().as_millis().max(1) as u64;
    print::bench(total_nodes, total_nodes * 1000 / elapsed);
}
