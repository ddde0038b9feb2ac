//! Response formatting. Everything goes through stdout with an
//! explicit flush, since GUIs read the engine through a pipe.

use std::io::Write;

use crate::board::types::Move;
use crate::search::params::{MATE, MATE_IN_MAX};
use crate::search::SearchReport;
use crate::tt::Bound;

fn emit(line: &str) {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let _ = writeln!(lock, "{line}");
    let _ = lock.flush();
}

pub fn id_and_options(name: &str, default_hash: usize, max_hash: usize) {
    emit(&format!("id name {name}"));
    emit("id author the Sable authors");
    emit(&format!(
        "option name Hash type spin default {default_hash} min 1 max {max_hash}"
    ));
    emit("option name Threads type spin default 1 min 1 max 2048");
    emit("option name MultiPV type spin default 1 min 1 max 256");
    emit("option name EvalFile type string default <empty>");
    emit("option name SyzygyPath type string default <empty>");
    emit("uciok");
}

pub fn ready() {
    emit("readyok");
}

pub fn info_string(message: &str) {
    emit(&format!("info string {message}"));
}

/// `score cp N` for normal values, `score mate N` in moves (not
/// plies), negative when the engine is being mated.
fn format_score(value: i32, bound: Option<Bound>) -> String {
    let mut text = if value >= MATE_IN_MAX {
        format!("score mate {}", (MATE - value + 1) / 2)
    } else if value <= -MATE_IN_MAX {
        format!("score mate {}", -(MATE + value + 1) / 2)
    } else {
        format!("score cp {value}")
    };
    match bound {
        Some(Bound::Lower) => text.push_str(" lowerbound"),
        Some(Bound::Upper) => text.push_str(" upperbound"),
        _ => {}
    }
    text
}

/// One `info` line per completed depth (or aspiration fail).
pub fn report(report: &SearchReport) {
    let nps = report.nodes * 1000 / report.elapsed_ms.max(1);
    let pv: Vec<String> = report.pv.iter().map(ToString::to_string).collect();

    let mut line = format!(
        "info depth {} seldepth {} multipv {} {} time {} nodes {} nps {} hashfull {}",
        report.depth,
        report.seldepth,
        report.multipv,
        format_score(report.value, report.bound),
        report.elapsed_ms,
        report.nodes,
        nps,
        report.hashfull,
    );
    if !pv.is_empty() {
        line.push_str(" pv ");
        line.push_str(&pv.join(" "));
    }
    emit(&line);
}

pub fn best_move(best: Option<Move>, ponder: Move) {
    match best {
        Some(best) if !best.is_none() => {
            if ponder.is_none() {
                emit(&format!("bestmove {best}"));
            } else {
                emit(&format!("bestmove {best} ponder {ponder}"));
            }
        }
        // No legal move to report
        _ => emit("bestmove 0000"),
    }
}

pub fn perft(nodes: u64) {
    emit(&format!("{nodes}"));
}

pub fn bench(nodes: u64, nps: u64) {
    emit(&format!("bench: {nodes} nodes, {nps} nps"));
}
