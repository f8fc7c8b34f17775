// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Eviction of the globally oldest items. The queue index orders lists by
//! the data time of each list's oldest item, so the head of the queue always
//! names the list holding the globally oldest item; that item is located
//! through the list's time index (or directly, for a single-item list),
//! removed, and the indexes are repaired to keep the invariants.

use super::context::{Guard, ScriptAbort, Tx, FIELD_ITEMS, FIELD_LISTS};
use super::{Status, CLEAN_ITEM, CLEAN_LIST};
use crate::probe::MemoryProbe;

/// The globally oldest item, located but not yet removed.
pub(crate) struct HeadItem {
    pub(crate) list: Vec<u8>,
    pub(crate) data_id: Vec<u8>,
    pub(crate) data: Vec<u8>,
    pub(crate) time: f64,
    pub(crate) list_len: usize,
}

impl Tx<'_> {
    /// Locates the globally oldest item. `Ok(None)` means the queue index
    /// does not exist (no lists). A queue head that points at a missing or
    /// empty data map is an inconsistency and aborts.
    pub(crate) fn read_head(&mut self) -> Result<Option<HeadItem>, ScriptAbort> {
        self.read_head_guarded(None)
    }

    /// As [`Tx::read_head`], but tolerant of the window where a guarded
    /// insert has written its data entry and not yet finished building the
    /// list's time index: if the head list holds the guard item while its
    /// index is missing, the guard item is reported (the caller's guard
    /// check then stops the cleaning pass) instead of aborting.
    pub(crate) fn read_head_guarded(
        &mut self,
        guard: Option<Guard<'_>>,
    ) -> Result<Option<HeadItem>, ScriptAbort> {
        let queue_key = self.keys.queue();
        let (list, time) = match self.store.zhead(&queue_key).map_err(ScriptAbort::internal)? {
            Some(head) => head,
            None => return Ok(None),
        };

        let data_key = self.keys.data(&list);
        let list_len = self.store.hlen(&data_key).map_err(ScriptAbort::internal)?;
        if list_len == 0 {
            return Err(ScriptAbort::inconsistent("queue names a missing list"));
        }

        let (data_id, data) = if list_len == 1 {
            let mut pairs = self.store.hgetall(&data_key).map_err(ScriptAbort::internal)?;
            match pairs.pop() {
                Some(pair) => pair,
                None => return Err(ScriptAbort::inconsistent("queue names a missing list")),
            }
        } else {
            let time_key = self.keys.time(&list);
            match self.store.zhead(&time_key).map_err(ScriptAbort::internal)? {
                Some((data_id, _)) => {
                    let data = match self
                        .store
                        .hget(&data_key, &data_id)
                        .map_err(ScriptAbort::internal)?
                    {
                        Some(data) => data.to_vec(),
                        None => {
                            return Err(ScriptAbort::inconsistent(
                                "time index names a missing item",
                            ));
                        }
                    };
                    (data_id, data)
                }
                None => {
                    let guard = guard.filter(|g| list == g.list);
                    let mid_insert = match guard {
                        Some(g) => self
                            .store
                            .hexists(&data_key, g.data_id)
                            .map_err(ScriptAbort::internal)?,
                        None => false,
                    };
                    match guard {
                        Some(g) if mid_insert => (g.data_id.to_vec(), Vec::new()),
                        _ => return Err(ScriptAbort::inconsistent("time index missing")),
                    }
                }
            }
        };

        Ok(Some(HeadItem {
            list,
            data_id,
            data,
            time,
            list_len,
        }))
    }

    /// Removes a located head item, repairing the time index and the queue,
    /// and records its time as the last removed time. Returns true when the
    /// list emptied and was dropped from the queue.
    pub(crate) fn delete_head_item(&mut self, item: &HeadItem) -> Result<bool, ScriptAbort> {
        let data_key = self.keys.data(&item.list);
        let queue_key = self.keys.queue();

        self.store
            .hdel(&data_key, &item.data_id)
            .map_err(ScriptAbort::internal)?;
        self.set_last_removed_time(item.time)?;

        let remaining = item.list_len - 1;
        if remaining == 0 {
            self.store
                .zrem(&queue_key, &item.list)
                .map_err(ScriptAbort::internal)?;
            CLEAN_LIST.increment();
            return Ok(true);
        }

        let time_key = self.keys.time(&item.list);
        self.store
            .zrem(&time_key, &item.data_id)
            .map_err(ScriptAbort::internal)?;
        match self.store.zhead(&time_key).map_err(ScriptAbort::internal)? {
            Some((_, new_min)) => {
                self.store
                    .zadd(&queue_key, &item.list, new_min)
                    .map_err(ScriptAbort::internal)?;
                // a single remaining item carries its time in the queue alone
                if remaining == 1 {
                    self.store.del(&time_key);
                }
            }
            None => return Err(ScriptAbort::inconsistent("time index missing")),
        }

        Ok(false)
    }

    /// Removes oldest items across the collection until memory is
    /// sufficient, the advance-cleanup thresholds are met, or the guard
    /// would be hit. Forced cleaning (after a refused write) only cares
    /// about freeing memory; proactive cleaning also honors the advance
    /// thresholds.
    pub(crate) fn clean(&mut self, guard: Guard<'_>, forced: bool) -> Result<(), ScriptAbort> {
        let status = self
            .read_status()?
            .ok_or(ScriptAbort::new(Status::CollectionDeleted, "collection was deleted"))?;

        let probe = MemoryProbe::new(self.store, status.memory_reserve);
        let mut used = self.store.used_memory();
        let mut need_enough = forced || probe.tight(used);

        // the advance thresholds widen a cleaning pass that pressure (or a
        // refused write) started; without pressure there is nothing to do
        if !need_enough {
            return Ok(());
        }

        let advance_bytes_target = status.advance_cleanup_bytes;
        let mut advance_rem = if forced {
            0
        } else {
            status.advance_cleanup_num.min(status.items)
        };
        let mut advance_bytes = 0u64;

        let mut items_left = status.items;
        let mut deleted_total = 0u64;
        let mut lists_deleted = 0u64;
        let mut iter = 1u64;

        loop {
            let advance_wanted = !forced
                && (advance_rem > 0
                    || (advance_bytes_target > 0 && advance_bytes < advance_bytes_target));
            if items_left == 0 || !(advance_wanted || need_enough) {
                break;
            }

            let item = match self.read_head_guarded(Some(guard))? {
                Some(item) => item,
                None => {
                    // items remain but the queue is gone: another party
                    // deleted it out from under us
                    return Err(ScriptAbort::inconsistent("queue index missing"));
                }
            };

            if item.list == guard.list && item.data_id == guard.data_id {
                if iter == 1 {
                    // the mutation's own target is the oldest item; removing
                    // it cannot make room for itself
                    return Err(ScriptAbort::new(
                        Status::MaxMemory,
                        "out of memory",
                    ));
                }
                break;
            }

            let list_removed = self.delete_head_item(&item)?;
            if list_removed {
                lists_deleted += 1;
            }

            used = self.store.used_memory();
            deleted_total += 1;
            items_left -= 1;
            CLEAN_ITEM.increment();

            if !forced {
                advance_bytes += item.data.len() as u64;
                if advance_rem > 0 {
                    advance_rem -= 1;
                }
            }
            if need_enough {
                need_enough = probe.tight(used);
            }
            iter += 1;
        }

        if deleted_total > 0 {
            self.status_add(FIELD_ITEMS, -(deleted_total as i64))?;
            if lists_deleted > 0 {
                self.status_add(FIELD_LISTS, -(lists_deleted as i64))?;
            }
            debug!(
                "{}: cleaned {} items across {} emptied lists",
                self.keys.collection(),
                deleted_total,
                lists_deleted
            );
        }
        self.cleanings += deleted_total;

        Ok(())
    }
}
