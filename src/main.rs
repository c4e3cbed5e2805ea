// Prediction game entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, table output stays on stdout)
// 2. Load config
// 3. Open database, build the engine
// 4. Dispatch the subcommand

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use douze::config;
use douze::db::Store;
use douze::engine::{Engine, RatingWindow};
use douze::model::Category;

#[derive(Parser)]
#[command(name = "douze", about = "Song contest prediction game", version)]
struct Cli {
    /// Project directory holding config/, defaults/ and data/.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import the contest lineup from the configured countries file.
    Init,
    /// Register a player and create their blank rating set.
    AddPlayer { name: String },
    /// Show a player's ratings and prediction state.
    Ratings { player: String },
    /// Submit category points for one rating. Omitted values clear the
    /// category.
    Submit {
        rating_id: i64,
        #[arg(long)]
        song: Option<u8>,
        #[arg(long)]
        performance: Option<u8>,
        #[arg(long)]
        show: Option<u8>,
    },
    /// Order a tie group explicitly, best placement first.
    Tiebreak {
        #[arg(required = true, num_args = 2..)]
        rating_ids: Vec<i64>,
    },
    /// Import the final placements from a CSV file.
    ImportResults { path: PathBuf },
    /// Score every rating and compute the final standings.
    Compute,
    /// Show the saved standings.
    Standings {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    let config =
        config::load_config(&cli.base_dir).context("failed to load configuration")?;
    info!(game = %config.game_name, "config loaded");

    let db_path = cli.base_dir.join(&config.db_path);
    let store = Store::open(
        db_path
            .to_str()
            .context("database path is not valid UTF-8")?,
    )
    .context("failed to open database")?;
    let engine = Engine::new(store, RatingWindow::from_config(&config));

    match cli.command {
        Command::Init => {
            let path = cli.base_dir.join(&config.countries_path);
            let inserted = engine.import_countries(&path)?;
            println!("imported {inserted} countries from {}", path.display());
        }
        Command::AddPlayer { name } => {
            let player_id = engine.register_player(&name)?;
            println!("registered `{name}` (player {player_id})");
        }
        Command::Ratings { player } => {
            print_ratings(&engine, &player)?;
        }
        Command::Submit {
            rating_id,
            song,
            performance,
            show,
        } => {
            engine.submit_points(rating_id, [song, performance, show])?;
            println!("rating {rating_id} updated");
        }
        Command::Tiebreak { rating_ids } => {
            engine.resolve_tie_break(&rating_ids)?;
            println!("tie group reordered");
        }
        Command::ImportResults { path } => {
            let imported = engine.import_results(&path)?;
            println!("imported placements for {imported} countries");
        }
        Command::Compute => {
            let standings = engine.compute_game_results()?;
            println!("scored {} players", standings.len());
            print_standings(&standings, false)?;
        }
        Command::Standings { json } => {
            let standings = engine.standings()?;
            print_standings(&standings, json)?;
        }
    }

    Ok(())
}

fn print_ratings(engine: &Engine, player: &str) -> anyhow::Result<()> {
    println!(
        "{:>4}  {:<24} {:>4} {:>4} {:>4} {:>5} {:>4} {:>5}",
        "id", "country", "song", "perf", "show", "total", "rank", "guess"
    );
    for (country, rating) in engine.ratings_for(player)? {
        let point = |c: Category| {
            rating
                .point(c)
                .map_or_else(|| "-".to_string(), |v| v.to_string())
        };
        let opt = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:>4}  {:<24} {:>4} {:>4} {:>4} {:>5} {:>4} {:>5}",
            rating.id,
            country.name,
            point(Category::Song),
            point(Category::Performance),
            point(Category::Show),
            rating
                .prediction
                .total_given_points
                .map_or_else(|| "-".to_string(), |v| v.to_string()),
            opt(rating.prediction.calculated_rank),
            opt(rating.prediction.predicted_rank()),
        );
    }
    Ok(())
}

fn print_standings(
    standings: &[douze::model::PlayerGameResult],
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(standings)?);
        return Ok(());
    }
    if standings.is_empty() {
        println!("no standings yet; run `douze compute` after importing results");
        return Ok(());
    }
    println!("{:>4}  {:<24} {:>6}", "rank", "player", "score");
    for result in standings {
        println!(
            "{:>4}  {:<24} {:>6}",
            result.rank.map_or_else(|| "-".to_string(), |r| r.to_string()),
            result.player_name,
            result.total_points
        );
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("douze=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
