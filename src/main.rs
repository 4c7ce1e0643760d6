// Copyright 2026 Placefind Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;
use placefind::area::AreaFilter;
use placefind::area::AreaMatch;
use placefind::area::SpatialSearchContext;
use placefind::cli::Cli;
use placefind::cli::Commands;
use placefind::cli::NearbyArgs;
use placefind::cli::SearchArgs;
use placefind::config;
use placefind::config::Config;
use placefind::config::ConfigCtx;
use placefind::error::SearchError;
use placefind::executor::Cancellation;
use placefind::logging;
use placefind::model::SearchFilters;
use placefind::model::Visibility;
use placefind::output::JsonResponse;
use placefind::output::StatsOut;
use placefind::output::print_json;
use placefind::output::print_table;
use placefind::search::PlaceSearch;
use placefind::search::SearchOptions;
use placefind::store::Store;
use placefind::store::StoreMode;
use placefind::transfer;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose), cli.log_json)?;
    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Search(args) => {
            let json = args.json;
            handle_result(cmd_search(args), json)
        }
        Commands::Nearby(args) => {
            let json = args.json;
            handle_result(cmd_nearby(args), json)
        }
        Commands::Stats { json } => handle_result(cmd_stats(json), json),
        Commands::Export(args) => handle_result(cmd_export(args.out, args.json), args.json),
        Commands::Import(args) => handle_result(cmd_import(args.path, args.json), args.json),
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let (code, hint) = error_code(&err);
                let resp = JsonResponse::error(code, &format!("{err:#}")).with_hint(hint);
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn error_code(err: &anyhow::Error) -> (&'static str, Option<String>) {
    match err.downcast_ref::<SearchError>() {
        Some(SearchError::InvalidArea { .. }) => (
            "invalid_area",
            Some("fix the area or set invalid_area = \"skip\"".to_string()),
        ),
        Some(SearchError::Cancelled) => (
            "cancelled",
            Some("raise query_timeout_ms or set it to 0".to_string()),
        ),
        Some(SearchError::Store(_)) => ("store_error", None),
        Some(SearchError::Compose(_)) => ("compose_error", None),
        None => ("error", None),
    }
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    let config = match config::global_config_path() {
        Some(config_path) if config_path.exists() => config::read_config(&config_path)?,
        Some(config_path) => {
            let config = Config::default();
            config::write_config(&config_path, &config)?;
            config
        }
        None => Config::default(),
    };

    let store_path = if config.store_path.is_absolute() {
        config.store_path.clone()
    } else {
        root.join(&config.store_path)
    };
    Store::init(&store_path)?;

    println!("Initialized place store at {}", store_path.display());
    Ok(())
}

fn open_search_store(ctx: &ConfigCtx) -> Result<Store> {
    Store::open(&ctx.store_path(), StoreMode::ReadOnly)
}

fn cancellation_for(config: &Config) -> Cancellation {
    match config.query_timeout() {
        Some(timeout) => Cancellation::new().with_timeout(timeout),
        None => Cancellation::new(),
    }
}

fn cmd_search(args: SearchArgs) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = open_search_store(&ctx)?;

    let visibility = if args.all {
        Visibility::Unrestricted
    } else if let Some(user) = args.user {
        Visibility::User(user)
    } else {
        Visibility::Public
    };

    let mut filters = SearchFilters {
        query: args.query,
        limit: args.limit,
        offset: args.offset,
        ..Default::default()
    };
    filters.categories.extend(args.categories);
    filters.tags.extend(args.tags);

    let area_match = match args.area_match {
        Some(arg) => arg.into(),
        None if args.areas.is_empty() => AreaMatch::AllOf,
        None => anyhow::bail!("--area requires --area-match any|all"),
    };
    let spatial = SpatialSearchContext {
        within: args.within,
        near: args.near,
        intersects: args.intersects,
        areas: args.areas,
        area_match,
    };

    let started = Instant::now();
    let engine = PlaceSearch::new(&store, SearchOptions::from(&ctx.config)).with_visibility(visibility);
    let result = engine.search(&filters, &spatial, &cancellation_for(&ctx.config))?;
    let took_ms = started.elapsed().as_millis() as i64;

    if args.json {
        let resp = JsonResponse::ok()
            .with_query(&filters, &spatial, result.limit)
            .with_search_result(&result, took_ms);
        print_json(&resp)?;
    } else {
        print_table(&result);
    }
    Ok(())
}

fn cmd_nearby(args: NearbyArgs) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = open_search_store(&ctx)?;
    let limit = args.limit.unwrap_or(ctx.config.default_limit);

    let started = Instant::now();
    let engine = PlaceSearch::new(&store, SearchOptions::from(&ctx.config));
    let result = engine.get_nearby(
        args.lat,
        args.lng,
        args.radius_km,
        limit,
        &cancellation_for(&ctx.config),
    )?;
    let took_ms = started.elapsed().as_millis() as i64;

    if args.json {
        let filters = SearchFilters::default().with_limit(limit);
        let spatial = SpatialSearchContext::new(AreaMatch::AllOf)
            .near(AreaFilter::circle(args.lng, args.lat, args.radius_km));
        let resp = JsonResponse::ok()
            .with_query(&filters, &spatial, result.limit)
            .with_search_result(&result, took_ms);
        print_json(&resp)?;
    } else {
        print_table(&result);
    }
    Ok(())
}

fn print_summary(json: bool, stats: StatsOut, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        print_json(&JsonResponse::ok().with_stats(stats))
    } else {
        println!("{}", text());
        Ok(())
    }
}

fn cmd_stats(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let stats = store.stats()?;
    let stats_out = StatsOut {
        place_count: Some(stats.place_count),
        public_count: Some(stats.public_count),
        db_size_bytes: Some(stats.db_size_bytes),
        ..Default::default()
    };
    print_summary(json, stats_out, || {
        format!(
            "Places: {} ({} public)\nDB size: {} bytes\nInvalid areas: {:?}",
            stats.place_count, stats.public_count, stats.db_size_bytes, ctx.config.invalid_area
        )
    })
}

fn cmd_export(out: Option<PathBuf>, json: bool) -> Result<()> {
    if json && out.is_none() {
        anyhow::bail!("--json requires --out for export");
    }
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;

    let stats = if let Some(path) = &out {
        let file =
            std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        transfer::export_store(&store, std::io::BufWriter::new(file))?
    } else {
        let stdout = std::io::stdout();
        transfer::export_store(&store, stdout.lock())?
    };

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            total_hits: stats.places as i64,
            place_count: Some(stats.places as i64),
            ..Default::default()
        });
        print_json(&resp)?;
    }
    Ok(())
}

fn cmd_import(path: PathBuf, json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite)?;
    let file = std::fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
    let stats = transfer::import_store(&store, file)?;

    let summary = StatsOut {
        total_hits: stats.places as i64,
        place_count: Some(stats.places as i64),
        ..Default::default()
    };
    print_summary(json, summary, || format!("Imported {} places", stats.places))
}
