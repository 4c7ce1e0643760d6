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

//! JSONL import and export: one place object per line.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;

use anyhow::Context;
use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::area::AreaFilter;
use crate::model::Place;
use crate::store::Store;

#[derive(Debug, Default)]
pub struct TransferStats {
    pub places: usize,
}

pub fn export_store(store: &Store, mut writer: impl Write) -> Result<TransferStats> {
    let mut places = 0usize;
    for place in store.all_places()? {
        let line = serde_json::to_string(&place)?;
        writeln!(writer, "{}", line)?;
        places += 1;
    }
    writer.flush()?;
    info!(places, "exported places");
    Ok(TransferStats { places })
}

/// Loads every line or nothing: the first invalid line rolls back the import.
pub fn import_store(store: &Store, reader: impl std::io::Read) -> Result<TransferStats> {
    let mut places = 0usize;
    let mut buf = BufReader::new(reader);
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format import timestamp")?;

    store.conn.execute_batch("BEGIN IMMEDIATE")?;
    let res = (|| -> Result<()> {
        let mut line = String::new();
        let mut line_no = 0usize;
        loop {
            line.clear();
            let bytes = buf.read_line(&mut line)?;
            if bytes == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut place: Place = serde_json::from_str(trimmed)
                .with_context(|| format!("parse import line {line_no}"))?;
            validate_place(&place).with_context(|| format!("invalid place on line {line_no}"))?;
            if place.created_at.trim().is_empty() {
                place.created_at = now.clone();
            }
            place.distance_km = None;
            store.insert_place(&place)?;
            places += 1;
        }
        Ok(())
    })();

    if let Err(err) = res {
        store.conn.execute_batch("ROLLBACK")?;
        return Err(err);
    }

    store.conn.execute_batch("COMMIT")?;
    info!(places, "imported places");
    Ok(TransferStats { places })
}

fn validate_place(place: &Place) -> Result<()> {
    if place.id.trim().is_empty() {
        anyhow::bail!("place id is empty");
    }
    if place.name.trim().is_empty() {
        anyhow::bail!("place {} has an empty name", place.id);
    }
    if let Some(location) = place.location
        && !location.is_valid()
    {
        anyhow::bail!(
            "place {} has an out-of-range location ({}, {})",
            place.id,
            location.lng,
            location.lat
        );
    }
    if let Some(ring) = &place.bounds {
        AreaFilter::Polygon { ring: ring.clone() }
            .validate()
            .with_context(|| format!("place {} has invalid bounds", place.id))?;
    }
    if let Some(rating) = place.rating_avg
        && !(0.0..=5.0).contains(&rating)
    {
        anyhow::bail!("place {} has rating {rating} outside 0..=5", place.id);
    }
    Ok(())
}
