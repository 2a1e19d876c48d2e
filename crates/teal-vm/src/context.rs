//! Execution environment: application state, logs and the calling transaction

use crate::config::Limits;
use crate::error::{Fault, FaultResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use teal_primitives::{Address, AppId};

/// Key-value store keyed by raw bytes
pub type StateMap = BTreeMap<Vec<u8>, Value>;

/// Application-call completion action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnComplete {
    /// Plain call
    #[default]
    NoOp,
    /// Opt the sender in
    OptIn,
    /// Opt the sender out
    CloseOut,
    /// Clear the sender's local state
    ClearState,
    /// Replace the application's programs
    UpdateApplication,
    /// Delete the application
    DeleteApplication,
}

impl OnComplete {
    /// All actions, ordered by their integer value
    pub const ALL: [OnComplete; 6] = [
        OnComplete::NoOp,
        OnComplete::OptIn,
        OnComplete::CloseOut,
        OnComplete::ClearState,
        OnComplete::UpdateApplication,
        OnComplete::DeleteApplication,
    ];

    /// Integer value seen by programs
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    /// Constant name used in assembly (`int OptIn`)
    pub fn name(self) -> &'static str {
        match self {
            OnComplete::NoOp => "NoOp",
            OnComplete::OptIn => "OptIn",
            OnComplete::CloseOut => "CloseOut",
            OnComplete::ClearState => "ClearState",
            OnComplete::UpdateApplication => "UpdateApplication",
            OnComplete::DeleteApplication => "DeleteApplication",
        }
    }

    /// Look up by constant name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|oc| oc.name() == name)
    }
}

/// The simulated application-call transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCallTxn {
    /// Account calling the application
    pub sender: Address,
    /// Called application, zero during creation
    pub application_id: AppId,
    /// Completion action
    pub on_completion: OnComplete,
    /// Application arguments, hex encoded in serialized form
    #[serde(with = "hex_list")]
    pub app_args: Vec<Vec<u8>>,
}

impl AppCallTxn {
    /// Create a `NoOp` call with the given arguments
    pub fn new(application_id: AppId, app_args: Vec<Vec<u8>>) -> Self {
        Self {
            application_id,
            app_args,
            ..Self::default()
        }
    }

    /// Set the sender
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Set the completion action
    pub fn with_on_completion(mut self, on_completion: OnComplete) -> Self {
        self.on_completion = on_completion;
        self
    }

    /// Argument at `index`
    pub fn app_arg(&self, index: u64) -> FaultResult<&[u8]> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.app_args.get(i))
            .map(Vec::as_slice)
            .ok_or(Fault::AppArgOutOfBounds {
                index,
                count: self.app_args.len(),
            })
    }
}

/// Caller-owned environment the interpreter reads and mutates
///
/// State keys serialize as UTF-8 strings, or as `0x`-prefixed hex when they
/// are not printable text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionContext {
    /// Application global store
    #[serde(with = "state_keys")]
    pub global_state: StateMap,
    /// Sender's local store for this application
    #[serde(with = "state_keys")]
    pub local_state: StateMap,
    /// Logged byte strings, in call order
    #[serde(with = "hex_list")]
    pub logs: Vec<Vec<u8>>,
    /// Calling transaction, required by `txn` opcodes
    pub txn: Option<AppCallTxn>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a calling transaction
    pub fn with_txn(mut self, txn: AppCallTxn) -> Self {
        self.txn = Some(txn);
        self
    }

    /// Seed a global key
    pub fn with_global(mut self, key: impl AsRef<[u8]>, value: impl Into<Value>) -> Self {
        self.global_state.insert(key.as_ref().to_vec(), value.into());
        self
    }

    /// Seed a local key
    pub fn with_local(mut self, key: impl AsRef<[u8]>, value: impl Into<Value>) -> Self {
        self.local_state.insert(key.as_ref().to_vec(), value.into());
        self
    }

    /// Read a global key
    pub fn global_get(&self, key: &[u8]) -> Option<&Value> {
        self.global_state.get(key)
    }

    /// Write a global key, refusing a new key once the store is full
    pub fn global_put(
        &mut self,
        key: Vec<u8>,
        value: Value,
        limits: Option<&Limits>,
    ) -> FaultResult<()> {
        let max = limits.map(|l| l.max_global_keys);
        put_bounded(&mut self.global_state, key, value, max, Fault::GlobalStateFull)
    }

    /// Delete a global key
    pub fn global_del(&mut self, key: &[u8]) -> Option<Value> {
        self.global_state.remove(key)
    }

    /// Read a local key
    pub fn local_get(&self, key: &[u8]) -> Option<&Value> {
        self.local_state.get(key)
    }

    /// Write a local key, refusing a new key once the store is full
    pub fn local_put(
        &mut self,
        key: Vec<u8>,
        value: Value,
        limits: Option<&Limits>,
    ) -> FaultResult<()> {
        let max = limits.map(|l| l.max_local_keys);
        put_bounded(&mut self.local_state, key, value, max, Fault::LocalStateFull)
    }

    /// Delete a local key
    pub fn local_del(&mut self, key: &[u8]) -> Option<Value> {
        self.local_state.remove(key)
    }

    /// Append to the log
    pub fn log(&mut self, message: Vec<u8>, limits: Option<&Limits>) -> FaultResult<()> {
        if let Some(limits) = limits {
            if self.log_size() + message.len() > limits.max_log_size {
                return Err(Fault::LogSizeExceeded(limits.max_log_size));
            }
            if self.logs.len() >= limits.max_log_calls {
                return Err(Fault::LogCallsExceeded(limits.max_log_calls));
            }
        }
        self.logs.push(message);
        Ok(())
    }

    /// Cumulative size of logged bytes
    pub fn log_size(&self) -> usize {
        self.logs.iter().map(Vec::len).sum()
    }

    /// Calling transaction
    pub fn txn(&self) -> Option<&AppCallTxn> {
        self.txn.as_ref()
    }
}

fn put_bounded(
    store: &mut StateMap,
    key: Vec<u8>,
    value: Value,
    max: Option<usize>,
    full: fn(usize) -> Fault,
) -> FaultResult<()> {
    if let Some(max) = max {
        if store.len() >= max && !store.contains_key(&key) {
            return Err(full(max));
        }
    }
    store.insert(key, value);
    Ok(())
}

/// Render a key the way it is serialized
pub fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if !s.starts_with("0x") && s.chars().all(|c| !c.is_control()) => s.to_string(),
        _ => format!("0x{}", hex::encode(key)),
    }
}

fn parse_key(key: &str) -> Result<Vec<u8>, hex::FromHexError> {
    match key.strip_prefix("0x") {
        Some(digits) => hex::decode(digits),
        None => Ok(key.as_bytes().to_vec()),
    }
}

mod state_keys {
    use super::{display_key, parse_key, StateMap};
    use crate::value::Value;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(map: &StateMap, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(k, v)| (display_key(k), v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StateMap, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| parse_key(&k).map(|k| (k, v)).map_err(de::Error::custom))
            .collect()
    }
}

mod hex_list {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(de::Error::custom))
            .collect()
    }
}
