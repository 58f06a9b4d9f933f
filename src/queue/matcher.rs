//! Lane assignment and team balancing (spec §4.4 "Team formation loop",
//! steps 2-4).

use crate::domain::player::Lane;
use crate::domain::queue_entry::QueueEntry;
use crate::types::SummonerName;

#[derive(Debug, Clone)]
pub struct SlotPlayer {
    pub summoner_name: SummonerName,
    pub region: String,
    pub custom_lp: i64,
    pub lane: Lane,
    pub autofill: bool,
}

impl SlotPlayer {
    pub fn custom_mmr(&self) -> i64 {
        crate::domain::player::BASE_MMR + self.custom_lp
    }
}

#[derive(Debug, Clone)]
pub struct FormedMatch {
    /// Ordered `top, jungle, mid, bot, support` (spec §4.4 step 4).
    pub team1: Vec<SlotPlayer>,
    pub team2: Vec<SlotPlayer>,
    pub average_mmr_team1: f64,
    pub average_mmr_team2: f64,
}

/// Picks the single best remaining candidate for `lane` from `remaining`
/// (primary match first, breaking ties by longest wait, then secondary
/// match, else the earliest unassigned player autofills) and removes it.
fn pick_for_lane(remaining: &mut Vec<QueueEntry>, lane: Lane) -> Option<SlotPlayer> {
    let pick_index = remaining
        .iter()
        .enumerate()
        .filter(|(_, e)| e.primary_lane == lane)
        .min_by_key(|(_, e)| e.join_time)
        .map(|(i, _)| i)
        .or_else(|| {
            remaining
                .iter()
                .enumerate()
                .filter(|(_, e)| e.secondary_lane == lane)
                .min_by_key(|(_, e)| e.join_time)
                .map(|(i, _)| i)
        });

    let (index, autofill) = match pick_index {
        Some(index) => (index, false),
        None => {
            if remaining.is_empty() {
                return None;
            }
            (0, true)
        }
    };

    let entry = remaining.remove(index);
    Some(SlotPlayer {
        summoner_name: entry.summoner_name,
        region: entry.region,
        custom_lp: entry.custom_lp,
        lane,
        autofill,
    })
}

/// Assigns every one of the ten cohort entries a lane (spec §4.4 step 2)
/// before any team split happens: for each of the five lanes, two
/// candidates are picked from the *whole* remaining pool, one destined
/// for each team. Running this over all ten up front (rather than over
/// two pre-split halves) means a lane only autofills when no candidate
/// anywhere in the cohort wants it, not just no candidate in an
/// arbitrary half.
fn assign_lanes(mut cohort: Vec<QueueEntry>) -> Option<(Vec<SlotPlayer>, Vec<SlotPlayer>)> {
    cohort.sort_by_key(|e| e.join_time);
    let mut remaining = cohort;
    let mut team1 = Vec::with_capacity(5);
    let mut team2 = Vec::with_capacity(5);

    for &lane in Lane::SLOT_ORDER.iter() {
        team1.push(pick_for_lane(&mut remaining, lane)?);
        team2.push(pick_for_lane(&mut remaining, lane)?);
    }

    Some((team1, team2))
}

fn mean_mmr(team: &[SlotPlayer]) -> f64 {
    let total: i64 = team.iter().map(|p| p.custom_mmr()).sum();
    total as f64 / team.len() as f64
}

/// Splits ten lane-assigned players into two teams minimising the mean
/// MMR gap, constrained to one player per lane per team, using a bounded
/// swap search (spec §4.4 step 3).
fn balance_teams(slots: Vec<SlotPlayer>, second_slots: Vec<SlotPlayer>) -> (Vec<SlotPlayer>, Vec<SlotPlayer>) {
    let mut team1 = slots;
    let mut team2 = second_slots;

    let mut best_gap = (mean_mmr(&team1) - mean_mmr(&team2)).abs();

    for _ in 0..10 {
        let mut improved = false;
        for lane_index in 0..team1.len() {
            let gap_before = best_gap;

            // Try swapping this lane's players across the two teams.
            std::mem::swap(&mut team1[lane_index], &mut team2[lane_index]);
            let gap_after = (mean_mmr(&team1) - mean_mmr(&team2)).abs();

            if gap_after < gap_before {
                best_gap = gap_after;
                improved = true;
            } else {
                // Revert: no improvement from this swap.
                std::mem::swap(&mut team1[lane_index], &mut team2[lane_index]);
            }
        }
        if !improved {
            break;
        }
    }

    (team1, team2)
}

/// Forms a single `match_found` proposal from exactly ten idle queue
/// entries (spec §4.4 steps 2-4). Returns `None` if lane assignment
/// cannot fill both five-lane teams (fewer than ten entries, or the
/// caller handed in something other than a full cohort).
pub fn form_teams(cohort: Vec<QueueEntry>) -> Option<FormedMatch> {
    if cohort.len() != 10 {
        return None;
    }

    let (team1_raw, team2_raw) = assign_lanes(cohort)?;

    let (team1, team2) = balance_teams(team1_raw, team2_raw);

    let average_mmr_team1 = mean_mmr(&team1);
    let average_mmr_team2 = mean_mmr(&team2);

    Some(FormedMatch {
        team1,
        team2,
        average_mmr_team1,
        average_mmr_team2,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::queue_entry::AcceptanceStatus;

    fn entry(name: &str, lp: i64, primary: Lane, secondary: Lane, join_time: i64) -> QueueEntry {
        QueueEntry {
            summoner_name: name.to_string(),
            region: "euw".to_string(),
            custom_lp: lp,
            primary_lane: primary,
            secondary_lane: secondary,
            join_time,
            queue_position: 0,
            acceptance_status: AcceptanceStatus::Idle,
        }
    }

    fn ten_balanced() -> Vec<QueueEntry> {
        let lanes = Lane::SLOT_ORDER;
        (0..10)
            .map(|i| {
                let lane = lanes[i % 5];
                entry(&format!("p{i}"), 0, lane, lane, i as i64)
            })
            .collect()
    }

    #[test]
    fn forms_two_five_player_teams() {
        let formed = form_teams(ten_balanced()).unwrap();
        assert_eq!(formed.team1.len(), 5);
        assert_eq!(formed.team2.len(), 5);
    }

    #[test]
    fn each_team_has_one_player_per_lane() {
        let formed = form_teams(ten_balanced()).unwrap();
        let lanes1: Vec<Lane> = formed.team1.iter().map(|p| p.lane).collect();
        assert_eq!(lanes1.len(), 5);
        for lane in Lane::SLOT_ORDER {
            assert_eq!(formed.team1.iter().filter(|p| p.lane == lane).count(), 1);
            assert_eq!(formed.team2.iter().filter(|p| p.lane == lane).count(), 1);
        }
    }

    #[test]
    fn non_ten_cohort_returns_none() {
        let mut cohort = ten_balanced();
        cohort.pop();
        assert!(form_teams(cohort).is_none());
    }

    #[test]
    fn autofill_used_when_lane_has_no_candidates() {
        // All ten prefer top/jungle; bot/support/mid must autofill.
        let lanes = [Lane::Top, Lane::Jungle];
        let cohort: Vec<QueueEntry> = (0..10)
            .map(|i| entry(&format!("p{i}"), 0, lanes[i % 2], lanes[i % 2], i as i64))
            .collect();
        let formed = form_teams(cohort).unwrap();
        let autofill_count = formed
            .team1
            .iter()
            .chain(formed.team2.iter())
            .filter(|p| p.autofill)
            .count();
        assert!(autofill_count > 0);
    }
}
