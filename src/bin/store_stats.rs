use anyhow::{Context, Result};
use clap::Parser;
use draw_store::{CsvDrawStore, DrawStore};
use lotto_ingest::Catalog;
use std::path::PathBuf;

/// Prints row counts and date coverage for every game store.
#[derive(Debug, Parser)]
#[command(name = "store-stats")]
struct Args {
    #[arg(long, env = "LOTTO_DATA_DIR", default_value = "data/nj")]
    data_dir: PathBuf,

    #[arg(long, env = "LOTTO_GAMES_FILE", default_value = "config/games.toml")]
    games: PathBuf,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let catalog = Catalog::load(&args.games)?;
    let store = CsvDrawStore::new(&args.data_dir);

    println!("data_dir={}", args.data_dir.display());
    for game in &catalog.games {
        let id = game.profile.game.as_str();
        let rows = store.load(id).with_context(|| format!("load {id}"))?;
        let first = rows.iter().map(|r| r.draw_date).min();
        let last = rows.iter().map(|r| r.draw_date).max();
        match (first, last) {
            (Some(first), Some(last)) => println!("{id}: {} rows, {first} .. {last}", rows.len()),
            _ => println!("{id}: <empty>"),
        }
    }

    Ok(())
}
