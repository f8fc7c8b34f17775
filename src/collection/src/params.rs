// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Collection policy parameters and the info records returned to callers.

use crate::{SiloError, TimeValue};

/// Schema marker stored in every status record. A stored record with a
/// different version is refused at open.
pub const DATA_VERSION: u64 = 1;

pub const MEMORY_RESERVE_MIN: f64 = 0.05;
pub const MEMORY_RESERVE_MAX: f64 = 0.5;

/// Policy parameters of a collection, fixed at creation and validated
/// against the stored values on every subsequent open.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionParams {
    /// When false, inserts older than the last removed time are refused.
    pub older_allowed: bool,
    /// Extra bytes to evict beyond the minimum whenever cleaning runs.
    pub advance_cleanup_bytes: u64,
    /// Extra items to evict beyond the minimum whenever cleaning runs.
    pub advance_cleanup_num: u64,
    /// Fraction of the memory ceiling kept free as headroom before
    /// eviction begins.
    pub memory_reserve: f64,
}

impl Default for CollectionParams {
    fn default() -> Self {
        Self {
            older_allowed: true,
            advance_cleanup_bytes: 0,
            advance_cleanup_num: 0,
            memory_reserve: 0.25,
        }
    }
}

impl CollectionParams {
    pub fn validate(&self) -> Result<(), SiloError> {
        if !(MEMORY_RESERVE_MIN..=MEMORY_RESERVE_MAX).contains(&self.memory_reserve) {
            return Err(SiloError::Argument(format!(
                "memory_reserve {} outside {}..{}",
                self.memory_reserve, MEMORY_RESERVE_MIN, MEMORY_RESERVE_MAX
            )));
        }
        Ok(())
    }
}

/// A partial update to the resizable status fields. `None` leaves a field
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct ResizeSpec {
    pub older_allowed: Option<bool>,
    pub advance_cleanup_bytes: Option<u64>,
    pub advance_cleanup_num: Option<u64>,
    pub memory_reserve: Option<f64>,
}

impl ResizeSpec {
    pub fn is_empty(&self) -> bool {
        self.older_allowed.is_none()
            && self.advance_cleanup_bytes.is_none()
            && self.advance_cleanup_num.is_none()
            && self.memory_reserve.is_none()
    }
}

/// A point-in-time view of a collection's counters and policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub lists: u64,
    pub items: u64,
    pub oldest_time: Option<TimeValue>,
    pub last_removed_time: TimeValue,
    pub older_allowed: bool,
    pub advance_cleanup_bytes: u64,
    pub advance_cleanup_num: u64,
    pub memory_reserve: f64,
    pub data_version: u64,
}

/// A point-in-time view of one list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListInfo {
    pub items: u64,
    pub oldest_time: Option<TimeValue>,
}
