/// Where a session stands, for progress displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based round number; retries of round `n` form round `n + 1`.
    pub round: u32,
    /// Items already presented in the current round.
    pub position: usize,
    pub round_len: usize,
    /// Failed items waiting for the next round.
    pub pending_retries: usize,
    /// Graded answers across all rounds.
    pub answered: usize,
    pub is_complete: bool,
}
