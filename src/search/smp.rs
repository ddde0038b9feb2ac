//! Lazy-SMP thread pool.
//!
//! Every worker runs full iterative deepening on its own copy of the
//! position with private heuristic tables; coordination happens only
//! through the shared transposition table and the stop flag. The main
//! worker owns time management and reporting; helpers exist to widen
//! and deepen the tree, staggered one ply apart so they populate the
//! table ahead of the main line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::board::types::MAX_PLY;
use crate::board::Board;
use crate::nnue::Network;
use crate::tt::TranspositionTable;

use super::time::Limits;
use super::{InfoCallback, SearchResult, SearchThread, SharedSearch};

/// Deep recursion lives on the search threads' own stacks.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

pub struct SearchPool {
    tt: Arc<TranspositionTable>,
    network: Option<Arc<Network>>,
    threads: usize,
    multipv: usize,
}

impl SearchPool {
    #[must_use]
    pub fn new(hash_mb: usize, threads: usize) -> Self {
        SearchPool {
            tt: Arc::new(TranspositionTable::new(hash_mb)),
            network: None,
            threads: threads.max(1),
            multipv: 1,
        }
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    pub fn set_hash(&mut self, megabytes: usize) {
        self.tt = Arc::new(TranspositionTable::new(megabytes));
    }

    pub fn set_multipv(&mut self, multipv: usize) {
        self.multipv = multipv.max(1);
    }

    pub fn set_network(&mut self, network: Option<Arc<Network>>) {
        self.network = network;
    }

    #[must_use]
    pub fn network(&self) -> Option<Arc<Network>> {
        self.network.clone()
    }

    /// Reset shared state between games.
    pub fn new_game(&self) {
        self.tt.clear();
    }

    /// Search `board` under `limits`, blocking until finished or
    /// `stop` is raised. Helper workers stop when the main worker
    /// does.
    pub fn search(
        &self,
        board: &Board,
        limits: &Limits,
        stop: Arc<AtomicBool>,
        info: Option<InfoCallback>,
    ) -> SearchResult {
        self.tt.bump_generation();

        let mut shared = SharedSearch::new(Arc::clone(&self.tt), self.network.clone());
        shared.stop = Arc::clone(&stop);
        shared.multipv = self.multipv;
        let shared = Arc::new(shared);

        let max_depth = limits.depth.unwrap_or(MAX_PLY as i32 - 1);

        // Single-threaded searches skip the spawn entirely; this also
        // keeps node counts reproducible for tests
        if self.threads == 1 {
            let mut worker = SearchThread::new(0, board.clone(), Arc::clone(&shared));
            let result = worker.iterative_deepening(limits, max_depth, info.as_ref());
            stop.store(true, Ordering::Relaxed);
            return result;
        }

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.threads - 1);

            for index in 1..self.threads {
                let shared = Arc::clone(&shared);
                let board = board.clone();
                let limits = limits.clone();
                // Odd helpers search one ply deeper to feed the table
                let helper_depth = max_depth.saturating_add((index % 2) as i32);

                let handle = thread::Builder::new()
                    .name(format!("search-{index}"))
                    .stack_size(SEARCH_STACK_SIZE)
                    .spawn_scoped(scope, move || {
                        let mut worker = SearchThread::new(index, board, shared);
                        let result = worker.iterative_deepening(&limits, helper_depth, None);
                        (result, worker.nodes)
                    })
                    .expect("failed to spawn search worker");
                handles.push(handle);
            }

            let main = thread::Builder::new()
                .name("search-0".into())
                .stack_size(SEARCH_STACK_SIZE)
                .spawn_scoped(scope, {
                    let shared = Arc::clone(&shared);
                    let board = board.clone();
                    let limits = limits.clone();
                    let info = info.clone();
                    move || {
                        let mut worker = SearchThread::new(0, board, shared);
                        let result = worker.iterative_deepening(&limits, max_depth, info.as_ref());
                        (result, worker.nodes)
                    }
                })
                .expect("failed to spawn main search worker");

            let (mut result, main_nodes) = main.join().expect("main worker panicked");

            // The main worker is done: release the helpers
            stop.store(true, Ordering::Relaxed);

            let mut total_nodes = main_nodes;
            for handle in handles {
                if let Ok((_, nodes)) = handle.join() {
                    total_nodes += nodes;
                }
            }

            result.nodes = total_nodes;
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multithreaded_search_completes() {
        let pool = SearchPool::new(4, 3);
        let board = Board::new();
        let stop = Arc::new(AtomicBool::new(false));
        let result = pool.search(&board, &Limits::depth(5), stop, None);
        assert!(!result.best_move.is_none());
        assert!(result.depth >= 5);
    }

    #[test]
    fn stop_flag_halts_search() {
        let pool = SearchPool::new(4, 1);
        let board = Board::new();
        let stop = Arc::new(AtomicBool::new(true));
        // An already-raised flag aborts almost immediately
        let result = pool.search(&board, &Limits::default(), stop, None);
        // Whatever was completed is returned without hanging
        assert!(result.depth <= 2);
    }

    #[test]
    fn multipv_reports_distinct_lines() {
        let mut pool = SearchPool::new(4, 1);
        pool.set_multipv(2);
        let board = Board::new();
        let stop = Arc::new(AtomicBool::new(false));

        use std::sync::Mutex;
        let lines: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let info: InfoCallback = Arc::new(move |report| {
            if let Some(first) = report.pv.first() {
                sink.lock().unwrap().push((report.multipv, first.to_string()));
            }
        });

        pool.search(&board, &Limits::depth(4), stop, Some(info));

        let lines = lines.lock().unwrap();
        let first: Vec<&String> = lines.iter().filter(|(i, _)| *i == 1).map(|(_, m)| m).collect();
        let second: Vec<&String> = lines.iter().filter(|(i, _)| *i == 2).map(|(_, m)| m).collect();
        assert!(!first.is_empty());
        assert!(!second.is_empty());
        // The two lines at the last depth start with different moves
        assert_ne!(first.last(), second.last());
    }
}
