use clap::Subcommand;
use coliseum_core::leaderboard::{
    self, format_accuracy, format_duration, format_duration_hours_minutes,
};
use coliseum_core::roster::Roster;
use coliseum_core::storage::{Config, HistoryStore};

#[derive(Subcommand)]
pub enum BoardAction {
    /// Lifetime counts per participant
    Lifetime,
    /// Best accuracy per attempt
    Accuracy,
    /// Most numbers counted in one attempt
    Numbers,
    /// Best fixed-duration window per attempt
    Fastest,
    /// Longest two-person run per attempt
    Longest,
    /// Cross-category points per team
    Points,
    /// Every recorded attempt, one line each
    Attempts,
}

pub fn run(action: BoardAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let roster = Roster::new(config.roster);
    let store = HistoryStore::load(&HistoryStore::default_path()?);

    match action {
        BoardAction::Lifetime => {
            for (rank, entry) in leaderboard::lifetime_board(&store, &roster).iter().enumerate() {
                let team = entry.team.as_deref().unwrap_or("-");
                println!("{:>3}. {} ({team}) {}", rank + 1, entry.name, entry.total);
            }
        }
        BoardAction::Accuracy => {
            for (rank, entry) in leaderboard::accuracy_board(&store).iter().enumerate() {
                println!(
                    "{:>3}. {} attempt #{} {}",
                    rank + 1,
                    entry.team,
                    entry.attempt,
                    format_accuracy(Some(entry.accuracy))
                );
            }
        }
        BoardAction::Numbers => {
            for (rank, entry) in leaderboard::numbers_board(&store).iter().enumerate() {
                println!(
                    "{:>3}. {} attempt #{} {}",
                    rank + 1,
                    entry.team,
                    entry.attempt,
                    entry.correct
                );
            }
        }
        BoardAction::Fastest => {
            for (rank, entry) in leaderboard::fastest_board(&store).iter().enumerate() {
                println!(
                    "{:>3}. {} attempt #{} {} ({})",
                    rank + 1,
                    entry.team,
                    entry.attempt,
                    entry.best_window,
                    entry.top_names.join(", ")
                );
            }
        }
        BoardAction::Longest => {
            for (rank, entry) in leaderboard::longest_board(&store, &roster).iter().enumerate() {
                println!(
                    "{:>3}. {} attempt #{} {} ({})",
                    rank + 1,
                    entry.team,
                    entry.attempt,
                    format_duration_hours_minutes(entry.duration_secs),
                    entry.pair_names.join(" & ")
                );
            }
        }
        BoardAction::Attempts => {
            for entry in leaderboard::attempts_board(&store) {
                let longest = entry
                    .longest_pair_secs
                    .map(format_duration)
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "{} attempt #{}: {} counted, {} accuracy, best window {}, longest run {}",
                    entry.team,
                    entry.attempt,
                    entry.correct,
                    format_accuracy(entry.accuracy),
                    entry.best_window,
                    longest
                );
            }
        }
        BoardAction::Points => {
            for (rank, entry) in leaderboard::points_board(&store, &roster).iter().enumerate() {
                println!(
                    "{:>3}. {} {} pts [{}]",
                    rank + 1,
                    entry.team,
                    entry.points,
                    entry.categories.join(", ")
                );
            }
        }
    }
    Ok(())
}
