// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The client driver and the typed collection handle. The driver owns the
//! channel, caches script digests per connection, classifies error replies,
//! and reconnects when the handle is configured for it; the handle exposes
//! the public operations.

use crate::channel::Channel;
use crate::error::{ErrorKind, SiloError};
use crate::keyspace::{valid_name, KeySpace};
use crate::params::{
    CollectionInfo, CollectionParams, ListInfo, ResizeSpec, DATA_VERSION,
};
use crate::probe::parse_used_memory;
use crate::scripts::{self, ScriptDef, Status};
use crate::time::{fmt_time, now, parse_time, TimeValue};

use metriken::{metric, Counter};
use protocol_resp::{Message, Request};

use std::collections::HashMap;

#[metric(name = "driver_dispatch", description = "number of script dispatches")]
pub static DRIVER_DISPATCH: Counter = Counter::new();

#[metric(
    name = "driver_reload",
    description = "number of script reloads after a no-script reply"
)]
pub static DRIVER_RELOAD: Counter = Counter::new();

#[metric(name = "driver_reconnect", description = "number of reconnect attempts")]
pub static DRIVER_RECONNECT: Counter = Counter::new();

/// Largest single data item accepted when the store reports no ceiling.
const MAX_DATASIZE_CAP: u64 = 512 * 1024 * 1024;

const POLICY_NOEVICTION: &str = "noeviction";

/// Options applied when opening a collection.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Reconnect and retry once on network errors. Argument and policy
    /// errors never trigger a reconnect.
    pub reconnect_on_error: bool,
    /// Overrides the single-item size limit. Defaults to the smaller of
    /// 512 MiB and the store's memory ceiling.
    pub max_datasize: Option<u64>,
}

/// The low-level driver: channel ownership, digest cache, classification.
pub struct CollectionClient {
    channel: Box<dyn Channel>,
    digests: HashMap<&'static str, Vec<u8>>,
    reconnect_on_error: bool,
}

impl CollectionClient {
    pub fn new(channel: Box<dyn Channel>, reconnect_on_error: bool) -> Self {
        Self {
            channel,
            digests: HashMap::new(),
            reconnect_on_error,
        }
    }

    fn map_io(error: std::io::Error) -> SiloError {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            SiloError::NoReply
        } else {
            SiloError::Network { source: error }
        }
    }

    /// One exchange, with a single reconnect-and-retry when the handle is
    /// configured for it.
    fn exchange(&mut self, request: &Request) -> Result<Message, SiloError> {
        match self.channel.exchange(request) {
            Ok(reply) => Ok(reply),
            Err(error) => {
                if self.reconnect_on_error && self.channel.can_reconnect() {
                    warn!("exchange failed ({}), reconnecting", error);
                    DRIVER_RECONNECT.increment();
                    self.channel.reconnect().map_err(Self::map_io)?;
                    self.channel.exchange(request).map_err(Self::map_io)
                } else {
                    Err(Self::map_io(error))
                }
            }
        }
    }

    fn load_script(&mut self, script: &'static ScriptDef) -> Result<Vec<u8>, SiloError> {
        let reply = self.exchange(&Request::ScriptLoad {
            source: script.source.as_bytes().to_vec(),
        })?;
        if let Some(text) = reply.as_error() {
            return Err(SiloError::BackingStore(format!(
                "loading script {}: {}",
                script.name, text
            )));
        }
        let digest = reply
            .as_bulk()
            .ok_or_else(|| SiloError::Unknown(format!("{:?}", reply)))?
            .to_vec();
        self.digests.insert(script.name, digest.clone());
        Ok(digest)
    }

    /// Dispatches a script by cached digest, falling back to sending the
    /// source on the first call or after a no-script reply.
    pub(crate) fn call_script(
        &mut self,
        script: &'static ScriptDef,
        keys: Vec<Vec<u8>>,
        args: Vec<Vec<u8>>,
    ) -> Result<Vec<Message>, SiloError> {
        DRIVER_DISPATCH.increment();

        let digest = match self.digests.get(script.name) {
            Some(digest) => digest.clone(),
            None => self.load_script(script)?,
        };

        let mut reply = self.exchange(&Request::EvalSha {
            digest,
            keys: keys.clone(),
            args: args.clone(),
        })?;

        if let Some(text) = reply.as_error() {
            if text.starts_with("NOSCRIPT") {
                debug!("script {} not resident, reloading", script.name);
                DRIVER_RELOAD.increment();
                self.digests.remove(script.name);
                let digest = self.load_script(script)?;
                reply = self.exchange(&Request::EvalSha { digest, keys, args })?;
            }
        }

        if let Some(text) = reply.as_error() {
            let text = text.to_string();
            return Err(if text.starts_with("OOM") {
                self.digests.clear();
                SiloError::MaxMemoryLimit(text)
            } else if text.contains("Error running script") || text.contains("Error compiling script")
            {
                SiloError::BackingStore(format!("script {} ({}): {}", script.name, script.source, text))
            } else {
                SiloError::BackingStore(text)
            });
        }

        self.decode_reply(reply)
    }

    /// Splits a tagged reply into its payload or the typed error its status
    /// code names.
    fn decode_reply(&mut self, reply: Message) -> Result<Vec<Message>, SiloError> {
        let raw = format!("{:?}", reply);
        let mut values = match reply.into_array() {
            Some(values) => values,
            None => return Err(SiloError::Unknown(raw)),
        };
        if values.is_empty() {
            return Err(SiloError::NoReply);
        }

        let code = values
            .remove(0)
            .as_integer()
            .ok_or_else(|| SiloError::Unknown(raw.clone()))?;
        let message = values
            .first()
            .and_then(|m| m.as_bulk())
            .map(|b| String::from_utf8_lossy(b).to_string())
            .unwrap_or_default();

        match Status::from_code(code) {
            Some(Status::Ok) => Ok(values),
            Some(Status::CollectionDeleted) => Err(SiloError::CollectionDeleted),
            Some(Status::DataIdExists) => Err(SiloError::DataIdExists),
            Some(Status::OlderThanAllowed) => Err(SiloError::OlderThanAllowed),
            Some(Status::NonExistentDataId) => Err(SiloError::NonExistentDataId),
            Some(Status::MaxMemory) => {
                // the script already attempted forced eviction
                self.digests.clear();
                Err(SiloError::MaxMemoryLimit(message))
            }
            Some(Status::MaxMemoryPolicy) => {
                // the collection is compromised; drop cached digests
                self.digests.clear();
                Err(SiloError::MaxMemoryPolicy(message))
            }
            Some(Status::BadArgument) => Err(SiloError::Argument(message)),
            Some(Status::Internal) => Err(SiloError::BackingStore(message)),
            None => Err(SiloError::Unknown(raw)),
        }
    }

    // raw (non-script) commands

    fn config_get(&mut self, parameter: &str) -> Result<Option<String>, SiloError> {
        let reply = self.exchange(&Request::ConfigGet {
            parameter: parameter.to_string(),
        })?;
        let values = reply.into_array().ok_or(SiloError::NoReply)?;
        Ok(values
            .get(1)
            .and_then(|m| m.as_bulk())
            .map(|b| String::from_utf8_lossy(b).to_string()))
    }

    fn exists(&mut self, key: Vec<u8>) -> Result<bool, SiloError> {
        let reply = self.exchange(&Request::Exists { key })?;
        Ok(reply.as_integer().unwrap_or(0) != 0)
    }

    fn info(&mut self) -> Result<String, SiloError> {
        let reply = self.exchange(&Request::Info)?;
        reply
            .as_bulk()
            .map(|b| String::from_utf8_lossy(b).to_string())
            .ok_or(SiloError::NoReply)
    }

    fn ping(&mut self) -> Result<bool, SiloError> {
        let reply = self.exchange(&Request::Ping)?;
        Ok(matches!(reply, Message::SimpleString(ref s) if s.as_str() == "PONG"))
    }
}

/// A handle to one capped collection.
pub struct Collection {
    client: CollectionClient,
    name: String,
    keys: KeySpace,
    params: CollectionParams,
    max_datasize: u64,
    debug_seq: u64,
    last_error: Option<ErrorKind>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("max_datasize", &self.max_datasize)
            .field("debug_seq", &self.debug_seq)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl Collection {
    /// Opens (creating if absent) a collection, validating the caller's
    /// parameters against any stored ones and the store's memory policy.
    pub fn open(
        channel: Box<dyn Channel>,
        name: &str,
        params: CollectionParams,
    ) -> Result<Self, SiloError> {
        Self::open_with(channel, name, params, OpenOptions::default())
    }

    pub fn open_with(
        channel: Box<dyn Channel>,
        name: &str,
        params: CollectionParams,
        options: OpenOptions,
    ) -> Result<Self, SiloError> {
        if !valid_name(name) {
            return Err(SiloError::Argument(format!(
                "collection name must be non-empty and colon-free: {:?}",
                name
            )));
        }
        params.validate()?;

        let mut client = CollectionClient::new(channel, options.reconnect_on_error);

        let policy = client
            .config_get("maxmemory-policy")?
            .unwrap_or_default();
        if policy != POLICY_NOEVICTION {
            return Err(SiloError::MaxMemoryPolicy(format!(
                "store evicts on its own (maxmemory-policy={})",
                policy
            )));
        }

        let maxmemory: u64 = client
            .config_get("maxmemory")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let max_datasize = options.max_datasize.unwrap_or(if maxmemory > 0 {
            MAX_DATASIZE_CAP.min(maxmemory)
        } else {
            MAX_DATASIZE_CAP
        });

        let payload = client.call_script(
            &scripts::VERIFY_COLLECTION,
            vec![KeySpace::new(name).status()],
            vec![
                name.as_bytes().to_vec(),
                (params.older_allowed as u64).to_string().into_bytes(),
                params.advance_cleanup_bytes.to_string().into_bytes(),
                params.advance_cleanup_num.to_string().into_bytes(),
                format!("{}", params.memory_reserve).into_bytes(),
                DATA_VERSION.to_string().into_bytes(),
            ],
        )?;

        let created = payload_u64(&payload, 0)? != 0;
        if !created {
            let stored_older = payload_u64(&payload, 1)? != 0;
            let stored_bytes = payload_u64(&payload, 2)?;
            let stored_num = payload_u64(&payload, 3)?;
            let stored_reserve = payload_f64(&payload, 4)?;
            let stored_version = payload_u64(&payload, 5)?;

            if stored_version != DATA_VERSION {
                return Err(SiloError::IncompatibleDataVersion {
                    stored: stored_version,
                    expected: DATA_VERSION,
                });
            }
            if stored_older != params.older_allowed
                || stored_bytes != params.advance_cleanup_bytes
                || stored_num != params.advance_cleanup_num
                || (stored_reserve - params.memory_reserve).abs() > 1e-9
            {
                return Err(SiloError::Argument(format!(
                    "collection {} exists with different parameters \
                     (older_allowed={} advance_cleanup_bytes={} advance_cleanup_num={} \
                     memory_reserve={})",
                    name, stored_older, stored_bytes, stored_num, stored_reserve
                )));
            }
        }

        info!("opened collection {} (created={})", name, created);

        Ok(Self {
            client,
            name: name.to_string(),
            keys: KeySpace::new(name),
            params,
            max_datasize,
            debug_seq: 0,
            last_error: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &CollectionParams {
        &self.params
    }

    pub fn max_datasize(&self) -> u64 {
        self.max_datasize
    }

    /// The kind of the most recent error returned by this handle.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    fn remember<T>(&mut self, result: Result<T, SiloError>) -> Result<T, SiloError> {
        if let Err(e) = &result {
            self.last_error = Some(e.kind());
        }
        result
    }

    fn check_list(list: &str) -> Result<(), SiloError> {
        if valid_name(list) {
            Ok(())
        } else {
            Err(SiloError::Argument(format!(
                "list id must be non-empty and colon-free: {:?}",
                list
            )))
        }
    }

    fn check_data(&self, data: &[u8]) -> Result<(), SiloError> {
        if data.len() as u64 > self.max_datasize {
            return Err(SiloError::DataTooLarge {
                size: data.len(),
                limit: self.max_datasize,
            });
        }
        Ok(())
    }

    fn check_time(time: Option<TimeValue>) -> Result<(), SiloError> {
        if let Some(time) = time {
            if !(time > 0.0) {
                return Err(SiloError::Argument(format!(
                    "data time must be positive: {}",
                    time
                )));
            }
        }
        Ok(())
    }

    fn next_debug_id(&mut self) -> String {
        self.debug_seq += 1;
        self.debug_seq.to_string()
    }

    fn dispatch(
        &mut self,
        script: &'static ScriptDef,
        args: Vec<Vec<u8>>,
    ) -> Result<Vec<Message>, SiloError> {
        let keys = vec![self.keys.status()];
        let result = self.client.call_script(script, keys, args);
        self.remember(result)
    }

    /// Inserts a new item. Returns the list id on success.
    pub fn insert(
        &mut self,
        list: &str,
        data_id: &str,
        data: &[u8],
        data_time: Option<TimeValue>,
    ) -> Result<String, SiloError> {
        let prepared = Self::check_list(list)
            .and_then(|()| self.check_data(data))
            .and_then(|()| Self::check_time(data_time));
        self.remember(prepared)?;

        let time = data_time.unwrap_or_else(now);
        let debug_id = self.next_debug_id();
        self.dispatch(
            &scripts::INSERT,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                data_id.as_bytes().to_vec(),
                data.to_vec(),
                fmt_time(time).into_bytes(),
                debug_id.into_bytes(),
            ],
        )?;
        Ok(list.to_string())
    }

    /// Updates an existing item, optionally moving its time. Returns false
    /// if the in-script cleaning pass evicted the item before the write.
    pub fn update(
        &mut self,
        list: &str,
        data_id: &str,
        data: &[u8],
        new_data_time: Option<TimeValue>,
    ) -> Result<bool, SiloError> {
        let prepared = Self::check_list(list)
            .and_then(|()| self.check_data(data))
            .and_then(|()| Self::check_time(new_data_time));
        self.remember(prepared)?;

        let debug_id = self.next_debug_id();
        let payload = self.dispatch(
            &scripts::UPDATE,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                data_id.as_bytes().to_vec(),
                data.to_vec(),
                fmt_time(new_data_time.unwrap_or(0.0)).into_bytes(),
                debug_id.into_bytes(),
            ],
        )?;
        Ok(payload_u64(&payload, 1)? != 0)
    }

    /// Inserts or updates, depending on whether the data id is present.
    pub fn upsert(
        &mut self,
        list: &str,
        data_id: &str,
        data: &[u8],
        data_time: Option<TimeValue>,
    ) -> Result<String, SiloError> {
        let prepared = Self::check_list(list)
            .and_then(|()| self.check_data(data))
            .and_then(|()| Self::check_time(data_time));
        self.remember(prepared)?;

        let debug_id = self.next_debug_id();
        self.dispatch(
            &scripts::UPSERT,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                data_id.as_bytes().to_vec(),
                data.to_vec(),
                fmt_time(data_time.unwrap_or(0.0)).into_bytes(),
                fmt_time(now()).into_bytes(),
                debug_id.into_bytes(),
            ],
        )?;
        Ok(list.to_string())
    }

    /// One item's bytes, or `None` when the list or id is absent.
    pub fn receive_one(
        &mut self,
        list: &str,
        data_id: &str,
    ) -> Result<Option<Vec<u8>>, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let payload = self.dispatch(
            &scripts::RECEIVE,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                b"val".to_vec(),
                data_id.as_bytes().to_vec(),
            ],
        )?;
        Ok(payload
            .first()
            .and_then(|m| m.as_bulk())
            .map(|b| b.to_vec()))
    }

    /// The number of items in a list; zero when absent.
    pub fn list_len(&mut self, list: &str) -> Result<u64, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let payload = self.dispatch(
            &scripts::RECEIVE,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                b"len".to_vec(),
            ],
        )?;
        payload_u64(&payload, 0)
    }

    /// Every value in a list.
    pub fn receive_values(&mut self, list: &str) -> Result<Vec<Vec<u8>>, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let payload = self.dispatch(
            &scripts::RECEIVE,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                b"vals".to_vec(),
            ],
        )?;
        let values = payload
            .into_iter()
            .next()
            .and_then(|m| m.into_array())
            .unwrap_or_default();
        Ok(values
            .iter()
            .filter_map(|m| m.as_bulk().map(|b| b.to_vec()))
            .collect())
    }

    /// Every id/value pair in a list.
    pub fn receive_all(&mut self, list: &str) -> Result<Vec<(String, Vec<u8>)>, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let payload = self.dispatch(
            &scripts::RECEIVE,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
                b"all".to_vec(),
            ],
        )?;
        let values = payload
            .into_iter()
            .next()
            .and_then(|m| m.into_array())
            .unwrap_or_default();
        let mut pairs = Vec::with_capacity(values.len() / 2);
        for chunk in values.chunks_exact(2) {
            let id = chunk[0]
                .as_bulk()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default();
            let data = chunk[1].as_bulk().map(|b| b.to_vec()).unwrap_or_default();
            pairs.push((id, data));
        }
        Ok(pairs)
    }

    /// Removes and returns the globally oldest item, or `None` when empty.
    pub fn pop_oldest(&mut self) -> Result<Option<(String, Vec<u8>)>, SiloError> {
        let payload = self.dispatch(
            &scripts::POP_OLDEST,
            vec![self.name.clone().into_bytes()],
        )?;
        if payload_u64(&payload, 0)? == 0 {
            return Ok(None);
        }
        let list = payload
            .get(1)
            .and_then(|m| m.as_bulk())
            .map(|b| String::from_utf8_lossy(b).to_string())
            .ok_or(SiloError::NoReply)?;
        let data = payload
            .get(2)
            .and_then(|m| m.as_bulk())
            .map(|b| b.to_vec())
            .ok_or(SiloError::NoReply)?;
        Ok(Some((list, data)))
    }

    /// The data time of the globally oldest item.
    pub fn oldest_time(&mut self) -> Result<Option<TimeValue>, SiloError> {
        let payload = self.dispatch(
            &scripts::OLDEST_TIME,
            vec![self.name.clone().into_bytes()],
        )?;
        Ok(payload.first().and_then(|m| m.as_bulk()).and_then(parse_time))
    }

    pub fn collection_info(&mut self) -> Result<CollectionInfo, SiloError> {
        let payload = self.dispatch(
            &scripts::COLLECTION_INFO,
            vec![self.name.clone().into_bytes()],
        )?;
        Ok(CollectionInfo {
            lists: payload_u64(&payload, 0)?,
            items: payload_u64(&payload, 1)?,
            oldest_time: payload.get(2).and_then(|m| m.as_bulk()).and_then(parse_time),
            last_removed_time: payload
                .get(3)
                .and_then(|m| m.as_bulk())
                .and_then(parse_time)
                .unwrap_or(0.0),
            older_allowed: payload_u64(&payload, 4)? != 0,
            advance_cleanup_bytes: payload_u64(&payload, 5)?,
            advance_cleanup_num: payload_u64(&payload, 6)?,
            memory_reserve: payload_f64(&payload, 7)?,
            data_version: payload_u64(&payload, 8)?,
        })
    }

    pub fn list_info(&mut self, list: &str) -> Result<ListInfo, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let payload = self.dispatch(
            &scripts::LIST_INFO,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
            ],
        )?;
        Ok(ListInfo {
            items: payload_u64(&payload, 0)?,
            oldest_time: payload.get(1).and_then(|m| m.as_bulk()).and_then(parse_time),
        })
    }

    /// Whether a list currently holds any items. A plain key check, not a
    /// script.
    pub fn list_exists(&mut self, list: &str) -> Result<bool, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let key = self.keys.data(list.as_bytes());
        let result = self.client.exists(key);
        self.remember(result)
    }

    /// Deletes the collection and every key belonging to it. Returns the
    /// number of keys deleted. Linear in the number of lists.
    pub fn drop_collection(&mut self) -> Result<u64, SiloError> {
        let payload = self.dispatch(
            &scripts::DROP_COLLECTION,
            vec![self.name.clone().into_bytes()],
        )?;
        payload_u64(&payload, 0)
    }

    /// Empties the collection but keeps its status record and
    /// configuration. Returns the number of keys deleted. Linear in the
    /// number of lists.
    pub fn clear_collection(&mut self) -> Result<u64, SiloError> {
        let payload = self.dispatch(
            &scripts::CLEAR_COLLECTION,
            vec![self.name.clone().into_bytes()],
        )?;
        payload_u64(&payload, 0)
    }

    /// Drops one list. Returns true if the list existed.
    pub fn drop_list(&mut self, list: &str) -> Result<bool, SiloError> {
        let prepared = Self::check_list(list);
        self.remember(prepared)?;
        let payload = self.dispatch(
            &scripts::DROP_LIST,
            vec![
                self.name.clone().into_bytes(),
                list.as_bytes().to_vec(),
            ],
        )?;
        Ok(payload_u64(&payload, 0)? != 0)
    }

    /// Changes one or more status fields. Returns the number of fields
    /// whose stored value actually changed.
    pub fn resize(&mut self, spec: ResizeSpec) -> Result<u64, SiloError> {
        if spec.is_empty() {
            let err = Err(SiloError::Argument(
                "resize requires at least one field".to_string(),
            ));
            return self.remember(err);
        }

        let mut args = vec![self.name.clone().into_bytes()];
        if let Some(older_allowed) = spec.older_allowed {
            args.push(b"older_allowed".to_vec());
            args.push((older_allowed as u64).to_string().into_bytes());
        }
        if let Some(bytes) = spec.advance_cleanup_bytes {
            args.push(b"advance_cleanup_bytes".to_vec());
            args.push(bytes.to_string().into_bytes());
        }
        if let Some(num) = spec.advance_cleanup_num {
            args.push(b"advance_cleanup_num".to_vec());
            args.push(num.to_string().into_bytes());
        }
        if let Some(reserve) = spec.memory_reserve {
            args.push(b"memory_reserve".to_vec());
            args.push(format!("{}", reserve).into_bytes());
        }

        let payload = self.dispatch(&scripts::RESIZE, args)?;
        let changed = payload_u64(&payload, 0)?;

        // keep the handle's view of the policy in sync
        if let Some(older_allowed) = spec.older_allowed {
            self.params.older_allowed = older_allowed;
        }
        if let Some(bytes) = spec.advance_cleanup_bytes {
            self.params.advance_cleanup_bytes = bytes;
        }
        if let Some(num) = spec.advance_cleanup_num {
            self.params.advance_cleanup_num = num;
        }
        if let Some(reserve) = spec.memory_reserve {
            self.params.memory_reserve = reserve;
        }

        Ok(changed)
    }

    /// True when the store's memory policy is compatible with capped
    /// collections.
    pub fn store_config_ok(&mut self) -> Result<bool, SiloError> {
        let policy = self.client.config_get("maxmemory-policy");
        let policy = self.remember(policy)?;
        Ok(policy.as_deref() == Some(POLICY_NOEVICTION))
    }

    pub fn ping(&mut self) -> Result<bool, SiloError> {
        let result = self.client.ping();
        self.remember(result)
    }

    /// The store's reported memory usage in bytes.
    pub fn used_memory(&mut self) -> Result<u64, SiloError> {
        let info = self.client.info();
        let info = self.remember(info)?;
        parse_used_memory(&info)
            .ok_or_else(|| SiloError::Unknown("info report carried no used_memory".to_string()))
    }
}

fn payload_u64(payload: &[Message], index: usize) -> Result<u64, SiloError> {
    payload
        .get(index)
        .and_then(|m| m.as_integer())
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| SiloError::Unknown(format!("{:?}", payload)))
}

fn payload_f64(payload: &[Message], index: usize) -> Result<f64, SiloError> {
    payload
        .get(index)
        .and_then(|m| m.as_bulk())
        .and_then(parse_time)
        .ok_or_else(|| SiloError::Unknown(format!("{:?}", payload)))
}
