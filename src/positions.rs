//! User position records and the bookmark protocol used to page them.
//!
//! The ledger stores one [`DexPositionOwner`] record per `(owner, pool)`;
//! each record maps tick ranges to an ordered list of position ids, so the
//! number of positions behind one scanned record varies and can be zero.
//! A continuation bookmark is therefore two cursors in one: the store's
//! opaque page cursor plus the count of positions already consumed within
//! that page.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::error::DexError;
use crate::ledger::{
    composite_key, get_object, get_objects_by_partial_key_paginated, ChainObject, Ledger,
};

/// Canonical textual key for a position's tick range.
pub fn tick_range_key(tick_lower: i32, tick_upper: i32) -> String {
    format!("{tick_lower}:{tick_upper}")
}

/// One liquidity position over a tick range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexPosition {
    pub pool_hash: String,
    pub position_id: String,
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: BigDecimal,
}

impl ChainObject for DexPosition {
    const INDEX_KEY: &'static str = "DEXPS";

    fn key_parts(&self) -> Vec<String> {
        vec![
            self.pool_hash.clone(),
            tick_range_key(self.tick_lower, self.tick_upper),
            self.position_id.clone(),
        ]
    }
}

/// Composite key of a position record.
pub fn position_key(pool_hash: &str, tick_range: &str, position_id: &str) -> String {
    composite_key(DexPosition::INDEX_KEY, &[pool_hash, tick_range, position_id])
}

/// One tick range owned by a user within a pool, with its position ids in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRangeEntry {
    pub tick_range: String,
    pub position_ids: Vec<String>,
}

/// Index record of a user's positions within one pool. Entries keep their
/// insertion order, which fixes the paging order of the positions behind
/// this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexPositionOwner {
    pub owner: String,
    pub pool_hash: String,
    pub tick_range_map: Vec<TickRangeEntry>,
}

impl ChainObject for DexPositionOwner {
    const INDEX_KEY: &'static str = "DEXPO";

    fn key_parts(&self) -> Vec<String> {
        vec![self.owner.clone(), self.pool_hash.clone()]
    }
}

impl DexPositionOwner {
    pub fn new(owner: impl Into<String>, pool_hash: impl Into<String>) -> Self {
        DexPositionOwner {
            owner: owner.into(),
            pool_hash: pool_hash.into(),
            tick_range_map: Vec::new(),
        }
    }

    /// Appends a position id under its tick range, creating the range
    /// entry at the end of the map when it is new.
    pub fn add_position(&mut self, tick_range: &str, position_id: impl Into<String>) {
        let position_id = position_id.into();
        match self
            .tick_range_map
            .iter_mut()
            .find(|entry| entry.tick_range == tick_range)
        {
            Some(entry) => entry.position_ids.push(position_id),
            None => self.tick_range_map.push(TickRangeEntry {
                tick_range: tick_range.to_string(),
                position_ids: vec![position_id],
            }),
        }
    }

    /// Total positions behind this record.
    pub fn position_count(&self) -> usize {
        self.tick_range_map
            .iter()
            .map(|entry| entry.position_ids.len())
            .sum()
    }

    fn position_refs(&self) -> impl Iterator<Item = PositionRef> + '_ {
        self.tick_range_map.iter().flat_map(move |entry| {
            entry.position_ids.iter().map(move |id| PositionRef {
                pool_hash: self.pool_hash.clone(),
                tick_range: entry.tick_range.clone(),
                position_id: id.clone(),
            })
        })
    }
}

struct PositionRef {
    pool_hash: String,
    tick_range: String,
    position_id: String,
}

/// A page of positions plus the continuation bookmark; an empty bookmark
/// means the listing is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPage {
    pub positions: Vec<DexPosition>,
    pub bookmark: String,
}

/// Owner records fetched from the store per page while paging positions.
pub const OWNER_PAGE_SIZE: usize = 10;

/// Splits a bookmark into the store cursor and the in-page offset.
fn split_bookmark(bookmark: &str) -> Result<(String, usize), DexError> {
    if bookmark.is_empty() {
        return Ok((String::new(), 0));
    }
    match bookmark.split_once('|') {
        None => Ok((bookmark.to_string(), 0)),
        Some((chain, "")) => Ok((chain.to_string(), 0)),
        Some((chain, local)) => {
            let local: usize = local
                .parse()
                .map_err(|_| DexError::validation("Invalid bookmark"))?;
            Ok((chain.to_string(), local))
        }
    }
}

/// Pages through a user's positions.
///
/// Returns up to `limit` positions starting at `bookmark` and the bookmark
/// at which the next call resumes. The scan tolerates owner records that
/// hold no positions anywhere in the chain of store pages; a bookmark
/// whose in-page offset points past the end of the data fails validation.
pub fn fetch_user_positions(
    ledger: &dyn Ledger,
    owner: &str,
    limit: usize,
    bookmark: &str,
    owner_page_size: usize,
) -> Result<PositionPage, DexError> {
    let (chain_bookmark, local_bookmark) = split_bookmark(bookmark)?;

    let mut to_skip = local_bookmark;
    let mut required = limit;
    let mut positions = Vec::new();
    let mut is_last = false;
    let mut next_local = 0usize;

    // Some("") starts the scan from the beginning; None means exhausted.
    let mut cursor = Some(chain_bookmark);

    while required > 0 {
        let Some(page_cursor) = cursor.clone() else {
            break;
        };

        let (owners, next) = get_objects_by_partial_key_paginated::<DexPositionOwner>(
            ledger,
            &[owner],
            owner_page_size,
            &page_cursor,
        )?;
        let next_cursor = (!next.is_empty()).then_some(next);

        let refs: Vec<PositionRef> = owners.iter().flat_map(|o| o.position_refs()).collect();

        if refs.is_empty() {
            if next_cursor.is_some() {
                cursor = next_cursor;
                continue;
            }
            is_last = true;
            cursor = None;
            break;
        }

        if to_skip >= refs.len() {
            to_skip -= refs.len();
            cursor = next_cursor;
            if cursor.is_none() {
                break;
            }
            continue;
        }

        let start = to_skip;
        to_skip = 0;
        let mut consumed_to = start;
        for (index, position_ref) in refs.iter().enumerate().skip(start) {
            if required == 0 {
                break;
            }
            let key = position_key(
                &position_ref.pool_hash,
                &position_ref.tick_range,
                &position_ref.position_id,
            );
            let position = get_object::<DexPosition>(ledger, &key, "position").map_err(|err| {
                match err {
                    DexError::NotFound(_) => DexError::Inconsistent(format!(
                        "Position {} indexed but not stored",
                        position_ref.position_id
                    )),
                    other => other,
                }
            })?;
            positions.push(position);
            required -= 1;
            consumed_to = index + 1;
            is_last = index + 1 == refs.len();
        }
        next_local = consumed_to;

        if is_last {
            cursor = next_cursor;
        } else {
            // stopped mid-page; resume inside the same store page
            cursor = Some(page_cursor);
            break;
        }
    }

    if to_skip > 0 {
        return Err(DexError::validation("Invalid bookmark"));
    }

    let bookmark = match cursor {
        None => String::new(),
        Some(chain) => {
            if is_last {
                format!("{chain}|")
            } else {
                format!("{chain}|{next_local}")
            }
        }
    };

    Ok(PositionPage { positions, bookmark })
}
