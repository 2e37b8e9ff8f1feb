use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::types::{GuessRecord, LeaderboardEntry};

#[derive(Default)]
struct Tally {
    guesses: usize,
    wins: usize,
    closest_win: Option<f64>,
}

/// Rank participants by wins, descending. Participants without a win are left out;
/// equal win counts keep the order in which participants first appear in `records`.
pub fn compute_leaderboard<'a, I>(records: I) -> Result<Vec<LeaderboardEntry>>
where
    I: IntoIterator<Item = &'a GuessRecord>,
{
    let mut order: Vec<&'a str> = Vec::new();
    let mut tallies: HashMap<&'a str, Tally> = HashMap::new();

    for record in records {
        let name = record.participant.as_str();
        let tally = tallies.entry(name).or_insert_with(|| {
            order.push(name);
            Tally::default()
        });
        tally.guesses += 1;
        if record.win {
            tally.wins += 1;
            tally.closest_win = Some(match tally.closest_win {
                Some(best) => best.min(record.absolute_error),
                None => record.absolute_error,
            });
        }
    }

    let mut board = Vec::new();
    for name in order {
        let Some(tally) = tallies.remove(name) else { continue };
        if tally.wins == 0 {
            continue;
        }
        let closest_win_error = tally.closest_win.ok_or_else(|| {
            AppError::DegenerateAggregate(format!(
                "{name} has {} wins but no winning record errors",
                tally.wins
            ))
        })?;
        board.push(LeaderboardEntry {
            participant: name.to_string(),
            guesses_made: tally.guesses,
            wins: tally.wins,
            closest_win_error,
            win_rate: tally.guesses as f64 / tally.wins as f64,
        });
    }

    // sort_by is stable: ties stay in first-seen order.
    board.sort_by(|a, b| b.wins.cmp(&a.wins));
    Ok(board)
}
