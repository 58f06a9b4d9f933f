//! LP recomputation (Glossary "LP"; spec §9 Open Questions resolves the
//! formula as a fixed K-factor ELO expectation over team mean MMR).

/// Fixed per spec §9: "LP calculation uses an ELO-like formula with a fixed
/// K-factor (32) ...".
pub const K_FACTOR: f64 = 32.0;

/// Expected score of team A against team B from their mean MMRs, using the
/// standard logistic ELO expectation.
pub fn expected_score(mean_mmr_a: f64, mean_mmr_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((mean_mmr_b - mean_mmr_a) / 400.0))
}

/// Per-player LP delta for one team given the match outcome. `actual` is
/// 1.0 for a win, 0.0 for a loss. Every player on a team receives the same
/// delta, rounded to the nearest integer LP.
pub fn lp_delta(mean_mmr_team: f64, mean_mmr_opponent: f64, actual: f64) -> i64 {
    let expected = expected_score(mean_mmr_team, mean_mmr_opponent);
    (K_FACTOR * (actual - expected)).round() as i64
}

/// Computes the per-team LP deltas for a completed match. Team-pair
/// conservation (spec §8 scenario 1) holds only in expectation for
/// differing mean MMRs — the two deltas are not required to sum to zero,
/// only the two teams' *expected* score sum to 1.0, which callers can
/// assert against `expected_score`.
pub fn team_deltas(mean_mmr_team1: f64, mean_mmr_team2: f64, winner_team: u8) -> (i64, i64) {
    let (actual1, actual2) = if winner_team == 1 { (1.0, 0.0) } else { (0.0, 1.0) };
    (
        lp_delta(mean_mmr_team1, mean_mmr_team2, actual1),
        lp_delta(mean_mmr_team2, mean_mmr_team1, actual2),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn even_teams_split_k_factor_evenly() {
        let (d1, d2) = team_deltas(1000.0, 1000.0, 1);
        assert_eq!(d1, 16);
        assert_eq!(d2, -16);
    }

    #[test]
    fn expectations_sum_to_one() {
        let e1 = expected_score(1200.0, 1000.0);
        let e2 = expected_score(1000.0, 1200.0);
        assert!((e1 + e2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn underdog_win_awards_more_lp() {
        let (underdog_win, _) = team_deltas(900.0, 1100.0, 1);
        let (favorite_win, _) = team_deltas(1100.0, 900.0, 1);
        assert!(underdog_win > favorite_win);
    }
}
