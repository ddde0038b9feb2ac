//! Principal-variation search.
//!
//! Iterative deepening with aspiration windows drives an alpha-beta
//! searcher armed with transposition-table cutoffs, razoring, beta
//! pruning, null-move pruning, ProbCut, internal iterative deepening,
//! singular extensions, late-move reductions and pruning, futility and
//! SEE pruning, and a noisy-only quiescence search. Each thread owns
//! its stacks, histories and caches; only the transposition table and
//! the stop flag are shared.

pub mod history;
pub mod params;
pub mod picker;
pub mod smp;
pub mod time;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::board::types::{Move, Piece, MAX_PLY};
use crate::board::Board;
use crate::eval::cache::EvalCache;
use crate::eval::{evaluate, EvalCaches};
use crate::nnue::{AccumulatorStack, Network};
use crate::tt::{Bound, TranspositionTable, TTEntry};

use history::{ContinuationTable, CounterMoveTable, HistoryTable, KillerTable};
use params::*;
use picker::{MovePicker, QuietOrdering};
use time::{Limits, TimeManager};

/// Guard slots in front of the root for continuation-history
/// lookbacks.
const STACK_OFFSET: usize = 4;
const STACK_SIZE: usize = MAX_PLY + STACK_OFFSET;

/// Stop-flag poll interval, in nodes.
const POLL_MASK: u64 = 1023;

/// One completed depth, reported up to the UCI layer.
#[derive(Clone, Debug)]
pub struct SearchReport {
    pub depth: i32,
    pub seldepth: i32,
    pub multipv: usize,
    pub value: i32,
    pub bound: Option<Bound>,
    pub nodes: u64,
    pub elapsed_ms: u64,
    pub hashfull: usize,
    pub pv: Vec<Move>,
}

pub type InfoCallback = Arc<dyn Fn(&SearchReport) + Send + Sync>;

/// State shared by every worker in one `go`.
pub struct SharedSearch {
    pub tt: Arc<TranspositionTable>,
    pub network: Option<Arc<Network>>,
    pub stop: Arc<AtomicBool>,
    pub nodes: AtomicU64,
    pub multipv: usize,
}

impl SharedSearch {
    #[must_use]
    pub fn new(tt: Arc<TranspositionTable>, network: Option<Arc<Network>>) -> Self {
        SharedSearch {
            tt,
            network,
            stop: Arc::new(AtomicBool::new(false)),
            nodes: AtomicU64::new(0),
            multipv: 1,
        }
    }
}

/// Outcome of a finished search.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: Move,
    pub ponder: Move,
    pub value: i32,
    pub depth: i32,
    pub nodes: u64,
}

/// A principal variation, built child-first.
#[derive(Clone)]
pub struct PVLine {
    moves: [Move; MAX_PLY],
    len: usize,
}

impl PVLine {
    #[must_use]
    pub fn new() -> Self {
        PVLine {
            moves: [Move::NONE; MAX_PLY],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// This node's PV is `mv` followed by the child's line.
    pub fn load(&mut self, mv: Move, child: &PVLine) {
        self.moves[0] = mv;
        let take = child.len.min(MAX_PLY - 1);
        self.moves[1..=take].copy_from_slice(&child.moves[..take]);
        self.len = take + 1;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    #[must_use]
    pub fn first(&self) -> Move {
        if self.len > 0 {
            self.moves[0]
        } else {
            Move::NONE
        }
    }
}

impl Default for PVLine {
    fn default() -> Self {
        PVLine::new()
    }
}

/// A single search worker: position, stacks, heuristic tables, caches.
pub struct SearchThread {
    pub board: Board,
    pub index: usize,
    shared: Arc<SharedSearch>,

    // Per-ply context, offset so the root can look back a few plies
    eval_stack: [i32; STACK_SIZE],
    move_stack: [Move; STACK_SIZE],
    piece_stack: [Option<Piece>; STACK_SIZE],

    killers: KillerTable,
    counters: CounterMoveTable,
    history: HistoryTable,
    continuation: ContinuationTable,

    caches: EvalCaches,
    eval_cache: EvalCache,
    accumulators: AccumulatorStack,

    /// Root moves excluded from this pass (MultiPV).
    excluded_root: Vec<Move>,

    pub nodes: u64,
    pub seldepth: i32,
    time: Option<TimeManager>,
    node_limit: Option<u64>,
    aborted: bool,
}

impl SearchThread {
    #[must_use]
    pub fn new(index: usize, board: Board, shared: Arc<SharedSearch>) -> Self {
        SearchThread {
            board,
            index,
            shared,
            eval_stack: [VALUE_NONE; STACK_SIZE],
            move_stack: [Move::NONE; STACK_SIZE],
            piece_stack: [None; STACK_SIZE],
            killers: KillerTable::new(),
            counters: CounterMoveTable::new(),
            history: HistoryTable::new(),
            continuation: ContinuationTable::new(),
            caches: EvalCaches::new(),
            eval_cache: EvalCache::new(),
            accumulators: AccumulatorStack::new(),
            excluded_root: Vec::new(),
            nodes: 0,
            seldepth: 0,
            time: None,
            node_limit: None,
            aborted: false,
        }
    }

    /// Wipe the heuristic tables, as on `ucinewgame`.
    pub fn reset_tables(&mut self) {
        self.killers.clear();
        self.counters.clear();
        self.history.clear();
        self.continuation.clear();
        self.caches.clear();
        self.eval_cache.clear();
        self.accumulators.reset();
    }

    // ---- driving --------------------------------------------------------

    /// Run iterative deepening to the given limits. Only the main
    /// worker (`index == 0`) manages time and reports progress.
    pub fn iterative_deepening(
        &mut self,
        limits: &Limits,
        max_depth: i32,
        info: Option<&InfoCallback>,
    ) -> SearchResult {
        let is_main = self.index == 0;
        self.time = is_main.then(|| TimeManager::new(limits));
        self.node_limit = limits.nodes;
        self.nodes = 0;
        self.aborted = false;
        self.accumulators.reset();

        let multipv = self.shared.multipv.max(1);
        let mut result = SearchResult {
            best_move: Move::NONE,
            ponder: Move::NONE,
            value: -MATE,
            depth: 0,
            nodes: 0,
        };
        let mut previous = -MATE;

        for depth in 1..=max_depth.min(MAX_PLY as i32 - 1) {
            self.excluded_root.clear();

            for pv_index in 0..multipv {
                self.seldepth = 0;
                let mut pv = PVLine::new();
                let value = self.aspiration(&mut pv, depth, previous, pv_index, info);

                if self.aborted {
                    break;
                }

                if pv_index == 0 {
                    previous = value;
                    result = SearchResult {
                        best_move: pv.first(),
                        ponder: if pv.as_slice().len() > 1 {
                            pv.as_slice()[1]
                        } else {
                            Move::NONE
                        },
                        value,
                        depth,
                        nodes: self.nodes,
                    };
                }
                self.excluded_root.push(pv.first());
            }

            if self.aborted {
                break;
            }

            if let Some(tm) = &mut self.time {
                tm.update(result.best_move);
                if tm.should_stop(depth) {
                    break;
                }
            }

            if self
                .node_limit
                .is_some_and(|cap| self.nodes >= cap)
            {
                break;
            }
        }

        result.nodes = self.nodes;
        result
    }

    /// Aspiration windows around the previous score, widening on the
    /// failing side until the search lands inside.
    fn aspiration(
        &mut self,
        pv: &mut PVLine,
        depth: i32,
        previous: i32,
        pv_index: usize,
        info: Option<&InfoCallback>,
    ) -> i32 {
        let mut delta = ASPIRATION_DELTA;
        let (mut alpha, mut beta) = if depth >= ASPIRATION_MIN_DEPTH {
            (
                (previous - delta).max(-MATE),
                (previous + delta).min(MATE),
            )
        } else {
            (-MATE, MATE)
        };

        loop {
            let value = self.search(pv, alpha, beta, depth, 0);
            if self.aborted {
                return value;
            }

            if value <= alpha {
                // Fail low: report, then widen downwards
                self.report(depth, value, Some(Bound::Upper), pv, pv_index, info);
                beta = (alpha + beta) / 2;
                alpha = (alpha - delta).max(-MATE);
            } else if value >= beta {
                self.report(depth, value, Some(Bound::Lower), pv, pv_index, info);
                beta = (beta + delta).min(MATE);
            } else {
                self.report(depth, value, None, pv, pv_index, info);
                return value;
            }

            delta += delta / 2;
        }
    }

    fn report(
        &self,
        depth: i32,
        value: i32,
        bound: Option<Bound>,
        pv: &PVLine,
        pv_index: usize,
        info: Option<&InfoCallback>,
    ) {
        let Some(info) = info else { return };
        let elapsed = self
            .time
            .as_ref()
            .map_or(0, TimeManager::elapsed_ms);
        let nodes = self.shared.nodes.load(Ordering::Relaxed) + self.nodes;
        info(&SearchReport {
            depth,
            seldepth: self.seldepth,
            multipv: pv_index + 1,
            value,
            bound,
            nodes,
            elapsed_ms: elapsed,
            hashfull: self.shared.tt.hashfull(),
            pv: pv.as_slice().to_vec(),
        });
    }

    // ---- plumbing -------------------------------------------------------

    #[inline]
    fn poll_stop(&mut self) {
        if self.nodes & POLL_MASK == 0 {
            if self.shared.stop.load(Ordering::Relaxed) {
                self.aborted = true;
            }
            if let Some(tm) = &self.time {
                if tm.out_of_time() {
                    self.aborted = true;
                    self.shared.stop.store(true, Ordering::Relaxed);
                }
            }
            if self.node_limit.is_some_and(|cap| self.nodes >= cap) {
                self.aborted = true;
                self.shared.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Static evaluation through the eval cache, from the NNUE network
    /// when one is loaded, the hand-crafted terms otherwise.
    fn static_eval(&mut self, height: usize) -> i32 {
        if let Some(hit) = self.eval_cache.probe(self.board.hash()) {
            return hit;
        }

        let value = match self.shared.network.clone() {
            Some(network) => self
                .accumulators
                .evaluate(&network, &self.board, height),
            None => evaluate(&self.board, &mut self.caches),
        };
        let value = value.clamp(-MATE_IN_MAX + 1, MATE_IN_MAX - 1);

        self.eval_cache.store(self.board.hash(), value);
        value
    }

    #[inline]
    fn stack_slot(height: usize) -> usize {
        height + STACK_OFFSET
    }

    /// Move made `back` plies above `height`, or `Move::NONE` past the
    /// root.
    #[inline]
    fn previous_move(&self, height: usize, back: usize) -> Move {
        self.move_stack[Self::stack_slot(height) - back]
    }

    fn quiet_ordering(&self, height: usize) -> QuietOrdering<'_> {
        let prev_mv = self.previous_move(height, 1);
        let prev = if prev_mv.is_none() {
            None
        } else {
            self.piece_stack[Self::stack_slot(height) - 1].map(|piece| (piece, prev_mv.to()))
        };
        QuietOrdering {
            history: &self.history,
            continuation: &self.continuation,
            colour: self.board.turn(),
            prev,
        }
    }

    fn counter_move(&self, height: usize) -> Move {
        let prev_mv = self.previous_move(height, 1);
        if prev_mv.is_none() {
            return Move::NONE;
        }
        match self.piece_stack[Self::stack_slot(height) - 1] {
            Some(piece) => self.counters.get(piece, prev_mv.to()),
            None => Move::NONE,
        }
    }

    /// Record the move entering `height + 1` on the stacks and the
    /// accumulator chain.
    fn record_move(&mut self, height: usize, mv: Move, piece: Option<Piece>, undo_deltas: crate::board::DeltaList) {
        let slot = Self::stack_slot(height);
        self.move_stack[slot] = mv;
        self.piece_stack[slot] = piece;
        self.accumulators.push_deltas(height + 1, undo_deltas);
    }

    // ---- the search -----------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn search(
        &mut self,
        pv: &mut PVLine,
        mut alpha: i32,
        mut beta: i32,
        depth: i32,
        height: usize,
    ) -> i32 {
        let is_pv = beta - alpha != 1;
        let is_root = height == 0;

        pv.clear();

        if depth <= 0 {
            return self.qsearch(pv, alpha, beta, height);
        }

        self.nodes += 1;
        self.poll_stop();
        if self.aborted {
            return 0;
        }
        self.seldepth = self.seldepth.max(height as i32);

        if !is_root {
            if self.board.is_draw() {
                return 0;
            }
            if height >= MAX_PLY - 1 {
                return self.static_eval(height);
            }

            // Mate-distance pruning: even an immediate mate cannot
            // improve on these bounds
            alpha = alpha.max(-MATE + height as i32);
            beta = beta.min(MATE - height as i32 - 1);
            if alpha >= beta {
                return alpha;
            }
        }

        let in_check = self.board.in_check();

        // Transposition table
        let tt_hit = self.shared.tt.probe(self.board.hash());
        let mut tt_move = tt_hit.map_or(Move::NONE, |entry| entry.mv);
        if let Some(entry) = tt_hit {
            let tt_value = value_from_tt(entry.value, height as i32);
            if !is_pv && entry.depth >= depth {
                let cutoff = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => tt_value >= beta,
                    Bound::Upper => tt_value <= alpha,
                };
                if cutoff {
                    return tt_value;
                }
            }
        }

        // Static evaluation anchors the pruning decisions
        let eval = if in_check {
            VALUE_NONE
        } else {
            self.static_eval(height)
        };
        self.eval_stack[Self::stack_slot(height)] = eval;

        let improving = !in_check
            && height >= 2
            && self.eval_stack[Self::stack_slot(height) - 2] != VALUE_NONE
            && eval > self.eval_stack[Self::stack_slot(height) - 2];

        // Razoring: hopeless shallow nodes drop into quiescence
        if !is_pv
            && !in_check
            && depth <= RAZOR_DEPTH
            && eval + RAZOR_MARGINS[depth as usize] <= alpha
        {
            return self.qsearch(pv, alpha, beta, height);
        }

        // Beta pruning: a comfortable static margin refutes the node
        if !is_pv
            && !in_check
            && depth <= BETA_PRUNING_DEPTH
            && eval - BETA_MARGIN * depth >= beta
            && !is_mate_score(beta)
        {
            return eval;
        }

        // Null-move pruning: hand over the move and search reduced
        if !is_pv
            && !in_check
            && depth >= NULL_MOVE_DEPTH
            && eval >= beta
            && !self.previous_move(height, 1).is_none()
            && self.board.has_non_pawn_material(self.board.turn())
        {
            let reduction = 4 + depth / 6 + ((eval - beta) / 200).min(3);
            let undo = self.board.make_null();
            let slot = Self::stack_slot(height);
            self.move_stack[slot] = Move::NONE;
            self.piece_stack[slot] = None;
            self.accumulators
                .push_deltas(height + 1, crate::board::DeltaList::default());

            let mut child = PVLine::new();
            let value = -self.search(
                &mut child,
                -beta,
                -beta + 1,
                depth - reduction,
                height + 1,
            );
            self.board.unmake_null(&undo);

            if self.aborted {
                return 0;
            }
            if value >= beta {
                return beta;
            }
        }

        // ProbCut: a good capture that beats beta by a margin at
        // reduced depth usually holds at full depth
        if !is_pv
            && !in_check
            && depth >= PROBCUT_DEPTH
            && !is_mate_score(beta)
            && eval != VALUE_NONE
        {
            let rbeta = (beta + PROBCUT_MARGIN).min(MATE_IN_MAX - 1);
            let mut picker = MovePicker::new_noisy(tt_move);
            loop {
                let ordering = self.quiet_ordering(height);
                let mv = picker.next(&self.board, &ordering);
                if mv.is_none() {
                    break;
                }
                // Only captures that can realistically reach rbeta
                if !self.board.see(mv, rbeta - eval) {
                    continue;
                }

                let piece = self.board.piece_at(mv.from()).map(|(_, p)| p);
                let undo = self.board.make_move(mv);
                if !self.board.was_legal() {
                    self.board.unmake_move(mv, &undo);
                    continue;
                }
                self.record_move(height, mv, piece, undo.deltas);

                let mut child = PVLine::new();
                let value = -self.search(
                    &mut child,
                    -rbeta,
                    -rbeta + 1,
                    depth - 4,
                    height + 1,
                );
                self.board.unmake_move(mv, &undo);

                if self.aborted {
                    return 0;
                }
                if value >= rbeta {
                    return value;
                }
            }
        }

        // Internal iterative deepening: a PV node with no table move
        // runs a shallow search to find an ordering hint
        if is_pv && depth >= IID_DEPTH && tt_move.is_none() && !in_check {
            let mut child = PVLine::new();
            self.search(&mut child, alpha, beta, depth - 2, height);
            if self.aborted {
                return 0;
            }
            tt_move = child.first();
            if tt_move.is_none() {
                if let Some(entry) = self.shared.tt.probe(self.board.hash()) {
                    tt_move = entry.mv;
                }
            }
        }

        // Singular extension: verify the table move has no peer
        let mut singular_extension = false;
        if !is_root && depth >= SINGULAR_DEPTH {
            if let Some(entry) = tt_hit {
                if entry.mv == tt_move
                    && !tt_move.is_none()
                    && entry.depth >= depth - 3
                    && matches!(entry.bound, Bound::Lower | Bound::Exact)
                    && !is_mate_score(entry.value)
                {
                    singular_extension =
                        self.move_is_singular(tt_move, entry, depth, height);
                    if self.aborted {
                        return 0;
                    }
                }
            }
        }

        // ---- move loop --------------------------------------------------

        let killers = self.killers.get(height);
        let counter = self.counter_move(height);
        let mut picker = MovePicker::new(tt_move, killers, counter);

        let mut best = -MATE;
        let mut best_move = Move::NONE;
        let original_alpha = alpha;
        let mut played = 0i32;
        let mut quiets_tried: Vec<Move> = Vec::with_capacity(32);
        let mut skip_quiets = false;

        loop {
            let ordering = self.quiet_ordering(height);
            let mv = picker.next(&self.board, &ordering);
            if mv.is_none() {
                break;
            }
            if is_root && self.excluded_root.contains(&mv) {
                continue;
            }

            let is_quiet =
                !mv.is_promotion() && !mv.is_en_passant() && self.board.piece_at(mv.to()).is_none();

            // Late-move pruning: enough quiets at a shallow depth
            // exhausts the node's potential
            if !skip_quiets
                && depth <= LATE_MOVE_PRUNING_DEPTH
                && played >= LATE_MOVE_PRUNING_COUNTS[depth as usize]
                && best > -MATE_IN_MAX
                && !in_check
            {
                skip_quiets = true;
                picker.skip_quiets();
                if is_quiet {
                    continue;
                }
            }

            // Futility: a quiet move cannot lift a bad static eval
            if is_quiet
                && !is_pv
                && !in_check
                && depth <= FUTILITY_DEPTH
                && eval != VALUE_NONE
                && eval + FUTILITY_MARGIN * depth <= alpha
                && best > -MATE_IN_MAX
            {
                skip_quiets = true;
                picker.skip_quiets();
                continue;
            }

            // SEE pruning: skip moves that shed too much material
            if depth <= SEE_PRUNING_DEPTH && best > -MATE_IN_MAX && !in_check {
                let threshold = if is_quiet {
                    SEE_QUIET_MARGIN * depth
                } else {
                    SEE_NOISY_MARGIN * depth * depth
                };
                if !self.board.see(mv, threshold) {
                    continue;
                }
            }

            let piece = self.board.piece_at(mv.from()).map(|(_, p)| p);
            let undo = self.board.make_move(mv);
            if !self.board.was_legal() {
                self.board.unmake_move(mv, &undo);
                continue;
            }
            self.record_move(height, mv, piece, undo.deltas);
            played += 1;
            if is_quiet {
                quiets_tried.push(mv);
            }

            let gives_check = self.board.in_check();
            let mut extension = i32::from(gives_check);
            if mv == tt_move && singular_extension {
                extension += 1;
            }
            let new_depth = depth - 1 + extension;

            // Late-move reductions for quiet moves after the first few
            let mut reduction = 0;
            if is_quiet && depth > 2 && played > 1 + i32::from(is_pv) && !gives_check {
                reduction = LMR_TABLE[depth.min(63) as usize][(played as usize).min(63)];
                reduction += i32::from(!improving);
                reduction -= i32::from(mv == killers[0] || mv == killers[1] || mv == counter);
                reduction = reduction.clamp(0, new_depth - 1);
            }

            let mut child = PVLine::new();
            let value = if played == 1 {
                -self.search(&mut child, -beta, -alpha, new_depth, height + 1)
            } else {
                // Null-window probe, re-searched on improvement
                let mut value = -self.search(
                    &mut child,
                    -alpha - 1,
                    -alpha,
                    new_depth - reduction,
                    height + 1,
                );
                if value > alpha && reduction > 0 {
                    value = -self.search(&mut child, -alpha - 1, -alpha, new_depth, height + 1);
                }
                if value > alpha && value < beta {
                    value = -self.search(&mut child, -beta, -alpha, new_depth, height + 1);
                }
                value
            };

            self.board.unmake_move(mv, &undo);
            if self.aborted {
                return 0;
            }

            if value > best {
                best = value;
                best_move = mv;
                if value > alpha {
                    alpha = value;
                    pv.load(mv, &child);
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        if played == 0 {
            // Checkmate is scored by distance from the root; an
            // exclusion pass reports failure instead
            return if in_check { -MATE + height as i32 } else { 0 };
        }

        if best >= beta && !best_move.is_none() {
            let is_quiet_cutoff = !best_move.is_promotion()
                && !best_move.is_en_passant()
                && self.board.piece_at(best_move.to()).is_none();
            if is_quiet_cutoff {
                self.update_quiet_heuristics(height, depth, best_move, &quiets_tried);
            }
        }

        if !self.aborted {
            let bound = if best >= beta {
                Bound::Lower
            } else if best > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            self.shared.tt.store(
                self.board.hash(),
                best_move,
                value_to_tt(best, height as i32),
                depth,
                bound,
            );
        }

        best
    }

    /// Quiescence: stand pat on the static eval, then resolve noisy
    /// moves only.
    fn qsearch(&mut self, pv: &mut PVLine, mut alpha: i32, beta: i32, height: usize) -> i32 {
        pv.clear();

        self.nodes += 1;
        self.poll_stop();
        if self.aborted {
            return 0;
        }
        self.seldepth = self.seldepth.max(height as i32);

        if self.board.is_draw() {
            return 0;
        }
        if height >= MAX_PLY - 1 {
            return self.static_eval(height);
        }

        let eval = self.static_eval(height);
        let mut best = eval;
        if best >= beta {
            return best;
        }
        alpha = alpha.max(best);

        let mut picker = MovePicker::new_noisy(Move::NONE);
        loop {
            let ordering = self.quiet_ordering(height);
            let mv = picker.next(&self.board, &ordering);
            if mv.is_none() {
                break;
            }

            // Futility: the capture cannot close the gap to alpha
            if eval + self.board.capture_value(mv) + QS_FUTILITY_MARGIN <= alpha {
                continue;
            }

            // Heavily losing captures cannot rescue the position
            if !self.board.see(mv, QS_SEE_MARGIN) {
                continue;
            }

            let piece = self.board.piece_at(mv.from()).map(|(_, p)| p);
            let undo = self.board.make_move(mv);
            if !self.board.was_legal() {
                self.board.unmake_move(mv, &undo);
                continue;
            }
            self.record_move(height, mv, piece, undo.deltas);

            let mut child = PVLine::new();
            let value = -self.qsearch(&mut child, -beta, -alpha, height + 1);
            self.board.unmake_move(mv, &undo);

            if self.aborted {
                return 0;
            }

            if value > best {
                best = value;
                if value > alpha {
                    alpha = value;
                    pv.load(mv, &child);
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        best
    }

    /// Is the table move the only one to hold near its stored value?
    /// Searches every other move with a window just below it.
    fn move_is_singular(
        &mut self,
        tt_move: Move,
        entry: TTEntry,
        depth: i32,
        height: usize,
    ) -> bool {
        let tt_value = value_from_tt(entry.value, height as i32);
        let rbeta = (tt_value - SINGULAR_MARGIN_PER_DEPTH * depth).max(-MATE);
        let singular_depth = (depth - 1) / 2;

        let killers = self.killers.get(height);
        let counter = self.counter_move(height);
        let mut picker = MovePicker::new(tt_move, killers, counter);

        let mut child = PVLine::new();
        loop {
            let ordering = self.quiet_ordering(height);
            let mv = picker.next(&self.board, &ordering);
            if mv.is_none() {
                break;
            }
            if mv == tt_move {
                continue;
            }

            let piece = self.board.piece_at(mv.from()).map(|(_, p)| p);
            let undo = self.board.make_move(mv);
            if !self.board.was_legal() {
                self.board.unmake_move(mv, &undo);
                continue;
            }
            self.record_move(height, mv, piece, undo.deltas);

            let value = -self.search(&mut child, -rbeta, -rbeta + 1, singular_depth, height + 1);
            self.board.unmake_move(mv, &undo);

            if self.aborted {
                return false;
            }
            // A second move reaching the window refutes singularity
            if value >= rbeta {
                return false;
            }
        }

        true
    }

    /// Killer, counter-move, butterfly and continuation updates on a
    /// quiet beta cutoff. Earlier quiets receive the matching malus.
    fn update_quiet_heuristics(
        &mut self,
        height: usize,
        depth: i32,
        cutoff: Move,
        quiets_tried: &[Move],
    ) {
        self.killers.update(height, cutoff);

        let prev_mv = self.previous_move(height, 1);
        let prev = self.piece_stack[Self::stack_slot(height) - 1];
        if let (false, Some(prev_piece)) = (prev_mv.is_none(), prev) {
            self.counters.update(prev_piece, prev_mv.to(), cutoff);
        }

        let colour = self.board.turn();
        let delta = (depth * depth).min(400);

        for &mv in quiets_tried {
            let bonus = if mv == cutoff { delta } else { -delta };
            self.history.update(colour, mv, bonus);

            if let (false, Some(prev_piece)) = (prev_mv.is_none(), prev) {
                if let Some((_, piece)) = self.board.piece_at(mv.from()) {
                    self.continuation
                        .update(prev_piece, prev_mv.to(), piece, mv.to(), bonus);
                }
            }
        }
    }
}
