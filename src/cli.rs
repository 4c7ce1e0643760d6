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

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

use crate::area::AreaFilter;
use crate::area::AreaMatch;

#[derive(Parser, Debug)]
#[command(name = "placefind", version, about = "Spatial place search over a local store")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new place store
    Init {
        /// Path to the store directory
        path: Option<PathBuf>,
    },

    /// Search places by text, attributes and area
    Search(SearchArgs),

    /// Places within a radius of a point, nearest first
    Nearby(NearbyArgs),

    /// Show stats
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Export places as JSONL
    Export(ExportArgs),

    /// Import places from JSONL
    Import(ImportArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AreaMatchArg {
    Any,
    All,
}

impl From<AreaMatchArg> for AreaMatch {
    fn from(value: AreaMatchArg) -> Self {
        match value {
            AreaMatchArg::Any => AreaMatch::AnyOf,
            AreaMatchArg::All => AreaMatch::AllOf,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text match on name, description and address
    #[arg(long, short)]
    pub query: Option<String>,

    /// Category filter (repeatable, any match)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Tag filter (repeatable, any match)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Area the place point must lie in (area JSON)
    #[arg(long, value_parser = parse_area)]
    pub within: Option<AreaFilter>,

    /// Circle the place point must be near (area JSON)
    #[arg(long, value_parser = parse_area)]
    pub near: Option<AreaFilter>,

    /// Area the place shape must touch (area JSON)
    #[arg(long, value_parser = parse_area)]
    pub intersects: Option<AreaFilter>,

    /// Additional area constraint (repeatable, area JSON)
    #[arg(long = "area", value_parser = parse_area, requires = "area_match")]
    pub areas: Vec<AreaFilter>,

    /// How repeated --area constraints combine
    #[arg(long, value_enum)]
    pub area_match: Option<AreaMatchArg>,

    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,

    /// Page offset
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Also show private places created by this user
    #[arg(long, conflicts_with = "all")]
    pub user: Option<String>,

    /// Ignore visibility entirely
    #[arg(long)]
    pub all: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
#[command(allow_negative_numbers = true)]
pub struct NearbyArgs {
    pub lng: f64,
    pub lat: f64,
    pub radius_km: f64,

    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file (defaults to stdout)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output JSON summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSONL file to import
    pub path: PathBuf,

    /// Output JSON summary
    #[arg(long)]
    pub json: bool,
}

/// Parses `{"type":"circle","center":[lng,lat],"radius_km":1.5}` and friends.
fn parse_area(text: &str) -> Result<AreaFilter, String> {
    serde_json::from_str(text).map_err(|err| format!("invalid area JSON: {err}"))
}
