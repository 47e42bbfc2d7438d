//! Per-game pipeline: load store → fetch → adapt → normalize → merge → replace.
//!
//! Every source ends in exactly one of Written, FallbackKept or Failed. A
//! failure at any stage leaves the game's store as it was. Games never share
//! state, so one broken upstream cannot affect another game.

use crate::config::{Catalog, GameConfig, SourceConfig};
use draw_adapters::SourceAdapter;
use draw_core::{DrawRecord, GameProfile, Normalizer};
use draw_fetcher::{Downloader, Outcome};
use draw_store::{merge_into, DrawStore};
use logger::{now_iso, EventLogger, RunSummaryEvent, SourceStatusEvent};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching,
    Adapting,
    Normalizing,
    Merging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetching => "fetching",
            Stage::Adapting => "adapting",
            Stage::Normalizing => "normalizing",
            Stage::Merging => "merging",
        })
    }
}

/// Terminal state of one source in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Written { rows_added: usize, rows_rejected: usize },
    /// Store left as it was; the run still counts as healthy for this source.
    FallbackKept { reason: String, diagnostic: Option<PathBuf> },
    /// Required source could not deliver.
    Failed { reason: String },
}

impl SourceState {
    pub fn label(&self) -> &'static str {
        match self {
            SourceState::Written { .. } => "WRITTEN",
            SourceState::FallbackKept { .. } => "FALLBACK_KEPT",
            SourceState::Failed { .. } => "FAILED",
        }
    }

    fn not_delivered(required: bool, reason: String, diagnostic: Option<PathBuf>) -> Self {
        if required {
            SourceState::Failed { reason }
        } else {
            SourceState::FallbackKept { reason, diagnostic }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub game: String,
    pub source: String,
    pub required: bool,
    pub state: SourceState,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub games: usize,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// False only when a required source failed.
    pub fn success(&self) -> bool {
        !self.sources.iter().any(|s| matches!(s.state, SourceState::Failed { .. }))
    }

    pub fn rows_added(&self) -> usize {
        self.sources
            .iter()
            .map(|s| match s.state {
                SourceState::Written { rows_added, .. } => rows_added,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, label: &str) -> usize {
        self.sources.iter().filter(|s| s.state.label() == label).count()
    }

    pub fn summary_event(&self) -> RunSummaryEvent {
        RunSummaryEvent {
            ts: now_iso(),
            event: "RUN_SUMMARY",
            games: self.games,
            sources: self.sources.len(),
            written: self.count("WRITTEN"),
            kept_cached: self.count("FALLBACK_KEPT"),
            failed: self.count("FAILED"),
            rows_added: self.rows_added(),
            success: self.success(),
        }
    }
}

/// Rows a source delivered, before merging.
struct Fresh {
    rows: Vec<DrawRecord>,
    rejected: usize,
}

pub struct Orchestrator<S: DrawStore> {
    downloader: Downloader,
    store: S,
    events: Option<EventLogger>,
    default_timeout: Duration,
}

impl<S: DrawStore> Orchestrator<S> {
    pub fn new(store: S, default_timeout: Duration) -> Self {
        Self {
            downloader: Downloader::new(),
            store,
            events: None,
            default_timeout,
        }
    }

    pub fn with_events(mut self, events: EventLogger) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(&self, catalog: &Catalog) -> RunReport {
        let mut report = RunReport { games: catalog.games.len(), ..Default::default() };
        for game in &catalog.games {
            let reports = self.run_game(game).await;
            for r in &reports {
                self.emit_status(r);
            }
            report.sources.extend(reports);
        }

        if let Some(events) = &self.events {
            if let Err(e) = events.log(&report.summary_event()) {
                warn!("event log write failed: {e}");
            }
        }
        info!(
            games = report.games,
            sources = report.sources.len(),
            rows_added = report.rows_added(),
            success = report.success(),
            "run finished"
        );
        report
    }

    /// Loads the store once, merges every delivering source in catalog order
    /// and replaces the store at most once.
    pub async fn run_game(&self, game: &GameConfig) -> Vec<SourceReport> {
        let profile = &game.profile;
        let report = |source: &SourceConfig, state: SourceState| SourceReport {
            game: profile.game.clone(),
            source: source.name.clone(),
            required: source.required,
            state,
        };

        let mut history = match self.store.load(&profile.game) {
            Ok(h) => h,
            Err(e) => {
                error!(game = %profile.game, "store unreadable, leaving it alone: {e}");
                return game
                    .sources
                    .iter()
                    .map(|s| report(s, SourceState::not_delivered(s.required, format!("store unreadable: {e}"), None)))
                    .collect();
            }
        };
        debug!(game = %profile.game, rows = history.len(), "store loaded");

        let mut out = Vec::with_capacity(game.sources.len());
        // (index into `out`, rows added, rows rejected) for sources awaiting the write
        let mut pending = Vec::new();
        for source in &game.sources {
            match self.run_source(profile, source).await {
                Ok(fresh) => {
                    debug!(game = %profile.game, source = %source.name, stage = %Stage::Merging);
                    let added = merge_into(&mut history, fresh.rows);
                    pending.push((out.len(), added, fresh.rejected));
                    out.push(report(source, SourceState::Written { rows_added: 0, rows_rejected: fresh.rejected }));
                }
                Err(state) => out.push(report(source, state)),
            }
        }

        let added: usize = pending.iter().map(|(_, a, _)| a).sum();
        if added == 0 {
            if !pending.is_empty() {
                info!(game = %profile.game, "no new draws, store unchanged");
            }
            return out;
        }

        match self.store.replace(&profile.game, &history) {
            Ok(path) => {
                info!(game = %profile.game, added, total = history.len(), "store written: {}", path.display());
                for (i, a, rejected) in pending {
                    out[i].state = SourceState::Written { rows_added: a, rows_rejected: rejected };
                }
            }
            Err(e) => {
                error!(game = %profile.game, "store write failed, prior store kept: {e}");
                for (i, _, _) in pending {
                    out[i].state = SourceState::not_delivered(out[i].required, format!("store write failed: {e}"), None);
                }
            }
        }
        out
    }

    async fn run_source(&self, profile: &GameProfile, source: &SourceConfig) -> Result<Fresh, SourceState> {
        let game = profile.game.as_str();
        let name = source.name.as_str();

        debug!(game, source = name, stage = %Stage::Fetching, url = %source.url);
        let body = match self.downloader.fetch(&source.url, source.timeout(self.default_timeout)).await {
            Outcome::Body(b) => b,
            other => {
                warn!(game, source = name, required = source.required, "fetch failed: {other}");
                return Err(SourceState::not_delivered(source.required, other.to_string(), None));
            }
        };

        debug!(game, source = name, stage = %Stage::Adapting, bytes = body.len());
        let adapter: Box<dyn SourceAdapter + Send + Sync> = source.adapter();
        let adapted = match adapter.adapt(&body, profile) {
            Ok(a) => a,
            Err(e) => {
                warn!(game, source = name, "adapter failed: {e}");
                return Err(self.keep_cached(profile, source, &body, e.to_string()));
            }
        };

        debug!(game, source = name, stage = %Stage::Normalizing, candidates = adapted.rows.len());
        let mut normalizer = Normalizer::new(profile);
        let rows = normalizer.normalize_all(&adapted.rows);
        let rejected = adapted.discarded + normalizer.rejected();
        if rows.is_empty() {
            warn!(game, source = name, rejected, "no row survived normalization");
            return Err(self.keep_cached(profile, source, &body, format!("0 usable rows ({rejected} rejected)")));
        }
        if rejected > 0 {
            info!(game, source = name, accepted = rows.len(), rejected, "rows rejected");
        }

        Ok(Fresh { rows, rejected })
    }

    /// Content-level failure: the upstream answered but nothing usable came
    /// out. Always falls back to the cached store, even for required sources.
    fn keep_cached(&self, profile: &GameProfile, source: &SourceConfig, raw: &str, reason: String) -> SourceState {
        let diagnostic = match self.store.dump_diagnostic(&profile.game, &source.name, raw) {
            Ok(path) => {
                info!(game = %profile.game, source = %source.name, "raw response saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!(game = %profile.game, source = %source.name, "diagnostic dump failed: {e}");
                None
            }
        };
        SourceState::FallbackKept { reason, diagnostic }
    }

    fn emit_status(&self, r: &SourceReport) {
        match &r.state {
            SourceState::Written { rows_added, rows_rejected } => {
                info!(game = %r.game, source = %r.source, rows_added, rows_rejected, "WRITTEN")
            }
            SourceState::FallbackKept { reason, .. } => {
                warn!(game = %r.game, source = %r.source, "FALLBACK_KEPT: {reason}")
            }
            SourceState::Failed { reason } => error!(game = %r.game, source = %r.source, "FAILED: {reason}"),
        }

        let Some(events) = &self.events else { return };
        let (rows_added, rows_rejected, message, diagnostic) = match &r.state {
            SourceState::Written { rows_added, rows_rejected } => (*rows_added, *rows_rejected, String::new(), None),
            SourceState::FallbackKept { reason, diagnostic } => {
                (0, 0, reason.clone(), diagnostic.as_ref().map(|p| p.display().to_string()))
            }
            SourceState::Failed { reason } => (0, 0, reason.clone(), None),
        };
        let ev = SourceStatusEvent {
            ts: now_iso(),
            event: "SOURCE_STATUS",
            game: r.game.clone(),
            source: r.source.clone(),
            required: r.required,
            state: r.state.label().to_string(),
            rows_added,
            rows_rejected,
            message,
            diagnostic,
        };
        if let Err(e) = events.log(&ev) {
            warn!("event log write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use draw_adapters::{LandmarkGrammar, SecondaryKind, SecondaryLandmark};
    use draw_core::{BonusSpec, HeaderAliases};
    use draw_store::CsvDrawStore;
    use httpmock::prelude::*;
    use std::fs;

    fn powerball(url: String, required: bool) -> GameConfig {
        GameConfig {
            profile: GameProfile {
                game: "powerball".into(),
                arity: 5,
                min: 1,
                max: 69,
                bonus: Some(BonusSpec { min: 1, max: 39, embedded: true }),
                secondary_arity: None,
                modifier: true,
                aliases: HeaderAliases {
                    date: vec!["Draw Date".into()],
                    numbers: vec!["Winning Numbers".into()],
                    modifier: vec!["Multiplier".into()],
                    ..Default::default()
                },
            },
            sources: vec![SourceConfig {
                name: "ny_open_data".into(),
                url,
                kind: SourceKind::Tabular,
                required,
                timeout_secs: Some(2),
                delimiter: None,
                grammar: None,
            }],
        }
    }

    fn pick6(url: String) -> GameConfig {
        GameConfig {
            profile: GameProfile {
                game: "pick6".into(),
                arity: 6,
                min: 1,
                max: 46,
                bonus: None,
                secondary_arity: Some(6),
                modifier: false,
                aliases: HeaderAliases::default(),
            },
            sources: vec![SourceConfig {
                name: "njlottery".into(),
                url,
                kind: SourceKind::Landmark,
                required: false,
                timeout_secs: Some(2),
                delimiter: None,
                grammar: Some(LandmarkGrammar {
                    secondary: Some(SecondaryLandmark { label: "Double Play".into(), kind: SecondaryKind::Run }),
                    ..Default::default()
                }),
            }],
        }
    }

    const POWERBALL_CSV: &str = "Draw Date,Winning Numbers,Multiplier\n\
        2025-12-27T00:00:00.000,05 20 34 39 62 01,2\n\
        2025-12-24T00:00:00.000,10 11 12 13 14 26,3\n\
        2025-12-22T00:00:00.000,07 18 22 41 60 12,\n";

    async fn serve(server: &MockServer, path: &str, body: &str) {
        let body = body.to_string();
        let path = path.to_string();
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200).body(body);
            })
            .await;
    }

    fn orchestrator(dir: &std::path::Path) -> Orchestrator<CsvDrawStore> {
        Orchestrator::new(CsvDrawStore::new(dir.join("nj")), Duration::from_secs(5))
            .with_events(EventLogger::new(dir.join("logs")))
    }

    #[tokio::test]
    async fn writes_new_store_then_second_run_is_a_no_op() {
        let server = MockServer::start_async().await;
        serve(&server, "/pb.csv", POWERBALL_CSV).await;
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let catalog = Catalog { games: vec![powerball(server.url("/pb.csv"), true)] };

        let first = orch.run(&catalog).await;
        assert!(first.success());
        assert_eq!(first.sources[0].state, SourceState::Written { rows_added: 3, rows_rejected: 0 });

        let path = orch.store().store_path("powerball");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("draw_date,numbers,bonus,secondary,modifier\n2025-12-27,05 20 34 39 62,01,,2X\n"));
        assert!(text.ends_with("2025-12-22,07 18 22 41 60,12,,N/A\n"));

        let second = orch.run(&catalog).await;
        assert_eq!(second.sources[0].state, SourceState::Written { rows_added: 0, rows_rejected: 0 });
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[tokio::test]
    async fn appends_only_unseen_draws() {
        let server = MockServer::start_async().await;
        serve(&server, "/pb.csv", POWERBALL_CSV).await;
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let path = orch.store().store_path("powerball");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "draw_date,numbers,bonus,secondary,modifier\n2025-12-24,10 11 12 13 14,26,,5X\n",
        )
        .unwrap();

        let report = orch.run(&Catalog { games: vec![powerball(server.url("/pb.csv"), true)] }).await;
        assert_eq!(report.rows_added(), 2);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        // prior row keeps its place and its own modifier
        assert_eq!(lines[1], "2025-12-24,10 11 12 13 14,26,,5X");
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn malformed_rows_are_isolated() {
        let mut csv = String::from("Draw Date,Winning Numbers\n");
        for d in 1..=9 {
            csv.push_str(&format!("2024-03-{d:02},01 02 03 04 05 06\n"));
        }
        csv.push_str("2024-03-10,01 02 03 04 99 06\n");

        let server = MockServer::start_async().await;
        serve(&server, "/pb.csv", &csv).await;
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator(dir.path())
            .run(&Catalog { games: vec![powerball(server.url("/pb.csv"), true)] })
            .await;

        assert_eq!(report.sources[0].state, SourceState::Written { rows_added: 9, rows_rejected: 1 });
    }

    #[tokio::test]
    async fn layout_change_keeps_store_byte_identical() {
        let server = MockServer::start_async().await;
        serve(&server, "/pick6.html", "<html><body><h1>We are upgrading our site</h1></body></html>").await;
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let path = orch.store().store_path("pick6");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let prior = "draw_date,numbers,bonus,secondary,modifier\n2023-01-02,01 02 03 04 05 06,,07 08 09 10 11 12,N/A\n";
        fs::write(&path, prior).unwrap();

        let report = orch.run(&Catalog { games: vec![pick6(server.url("/pick6.html"))] }).await;
        assert!(report.success());
        let SourceState::FallbackKept { diagnostic: Some(diag), .. } = &report.sources[0].state else {
            panic!("expected fallback with diagnostic, got {:?}", report.sources[0].state);
        };
        assert!(fs::read_to_string(diag).unwrap().contains("upgrading"));
        assert_eq!(fs::read_to_string(&path).unwrap(), prior);
    }

    #[tokio::test]
    async fn landmark_page_merges_with_double_play() {
        let page = "<html><body><div class=\"draw\">\
            <span>Drawing Date: 01/05/2023</span>\
            <ul><li>3</li><li>11</li><li>19</li><li>27</li><li>33</li><li>45</li></ul>\
            <p>Double Play</p>\
            <ul><li>2</li><li>8</li><li>14</li><li>21</li><li>30</li><li>40</li></ul>\
            </div></body></html>";
        let server = MockServer::start_async().await;
        serve(&server, "/pick6.html", page).await;
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let report = orch.run(&Catalog { games: vec![pick6(server.url("/pick6.html"))] }).await;
        assert_eq!(report.sources[0].state, SourceState::Written { rows_added: 1, rows_rejected: 0 });
        let rows = orch.store().load("pick6").unwrap();
        assert_eq!(rows[0].numbers, vec![3, 11, 19, 27, 33, 45]);
        assert_eq!(rows[0].secondary, vec![2, 8, 14, 21, 30, 40]);
    }

    #[tokio::test]
    async fn required_source_unreachable_fails_run_but_not_other_games() {
        let server = MockServer::start_async().await;
        serve(&server, "/pick6.html", "<p>Draw Date: 2023-01-02 1 2 3 4 5 6</p>").await;
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let catalog = Catalog {
            games: vec![
                powerball("http://127.0.0.1:9/rows.csv".into(), true),
                pick6(server.url("/pick6.html")),
            ],
        };

        let report = orch.run(&catalog).await;
        assert!(!report.success());
        assert!(matches!(report.sources[0].state, SourceState::Failed { .. }));
        assert!(matches!(report.sources[1].state, SourceState::Written { rows_added: 1, .. }));
        assert!(!orch.store().store_path("powerball").exists());

        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let events = fs::read_to_string(dir.path().join("logs").join(format!("{date}.jsonl"))).unwrap();
        let last: serde_json::Value = serde_json::from_str(events.lines().last().unwrap()).unwrap();
        assert_eq!(last["event"], "RUN_SUMMARY");
        assert_eq!(last["failed"], 1);
        assert_eq!(last["success"], false);
    }

    #[tokio::test]
    async fn optional_source_bad_status_keeps_cache() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/pb.csv");
                then.status(503);
            })
            .await;
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator(dir.path())
            .run(&Catalog { games: vec![powerball(server.url("/pb.csv"), false)] })
            .await;

        assert!(report.success());
        assert_eq!(
            report.sources[0].state,
            SourceState::FallbackKept { reason: "HTTP 503".into(), diagnostic: None }
        );
    }

    #[tokio::test]
    async fn schema_change_on_required_source_is_fallback_not_failure() {
        let server = MockServer::start_async().await;
        serve(&server, "/pb.csv", "date,balls\n2025-12-27,05 20 34 39 62 01\n").await;
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator(dir.path())
            .run(&Catalog { games: vec![powerball(server.url("/pb.csv"), true)] })
            .await;

        assert!(report.success());
        assert!(matches!(report.sources[0].state, SourceState::FallbackKept { diagnostic: Some(_), .. }));
    }

    #[tokio::test]
    async fn corrupt_store_is_not_overwritten() {
        let server = MockServer::start_async().await;
        serve(&server, "/pb.csv", POWERBALL_CSV).await;
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let path = orch.store().store_path("powerball");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "something,else\n").unwrap();

        let report = orch.run(&Catalog { games: vec![powerball(server.url("/pb.csv"), true)] }).await;
        assert!(!report.success());
        assert_eq!(fs::read_to_string(&path).unwrap(), "something,else\n");
    }
}
