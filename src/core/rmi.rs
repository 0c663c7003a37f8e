// src/core/rmi.rs

//! The RMI engine: a registry of invokable functions and an ordered
//! interceptor chain consulted before any function runs.

use crate::core::client::Client;
use crate::core::protocol::CommandEnvelope;
use crate::core::{SyncsError, SyncsResult};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// In-band error reported when the call names no registered function.
pub const ERROR_UNDEFINED: &str = "undefined";
/// In-band error reported when the registered function failed.
pub const ERROR_FUNCTION: &str = "function error";

/// The outcome of a registered function. Failures are reported to the
/// caller in-band as `"function error"`; the underlying error is only
/// logged.
pub type HandlerResult = Result<Value, Box<dyn std::error::Error + Send + Sync>>;

/// An invokable function: called with the originating client and the
/// positional arguments from the wire.
pub type RmiHandler =
    Arc<dyn Fn(Arc<Client>, Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// An interceptor: returns `None` for "no opinion" (the chain proceeds) or
/// `Some(value)` to short-circuit the call with that value as its result.
pub type Interceptor =
    Arc<dyn Fn(Arc<Client>, String, Vec<Value>) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// Function registry plus interceptor chain.
pub struct RmiEngine {
    functions: RwLock<HashMap<String, RmiHandler>>,
    interceptors: RwLock<Vec<(Regex, Interceptor)>>,
}

impl Default for RmiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RmiEngine {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            interceptors: RwLock::new(Vec::new()),
        }
    }

    /// Registers (or replaces) the function invokable under `name`.
    pub fn register_function(
        &self,
        name: &str,
        handler: impl Fn(Arc<Client>, Vec<Value>) -> BoxFuture<'static, HandlerResult>
        + Send
        + Sync
        + 'static,
    ) {
        self.functions
            .write()
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Appends an interceptor matched against call names by regular
    /// expression. Interceptors run strictly in registration order.
    pub fn add_interceptor(
        &self,
        pattern: &str,
        interceptor: impl Fn(Arc<Client>, String, Vec<Value>) -> BoxFuture<'static, Option<Value>>
        + Send
        + Sync
        + 'static,
    ) -> SyncsResult<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| SyncsError::InvalidPattern(pattern.to_string(), e))?;
        self.interceptors
            .write()
            .push((regex, Arc::new(interceptor)));
        Ok(())
    }

    /// Runs the interceptor chain for `name`. The first interceptor that
    /// yields a value short-circuits the chain; `None` means every matching
    /// interceptor passed.
    async fn intercept(&self, client: &Arc<Client>, name: &str, args: &[Value]) -> Option<Value> {
        let matching: Vec<Interceptor> = self
            .interceptors
            .read()
            .iter()
            .filter(|(regex, _)| regex.is_match(name))
            .map(|(_, interceptor)| interceptor.clone())
            .collect();
        for interceptor in matching {
            if let Some(result) =
                interceptor(client.clone(), name.to_string(), args.to_vec()).await
            {
                return Some(result);
            }
        }
        None
    }

    /// Handles one inbound `rmi` command end to end and sends the
    /// `rmi-result` reply back through the client.
    pub(crate) async fn dispatch(
        &self,
        client: Arc<Client>,
        id: String,
        name: String,
        args: Vec<Value>,
    ) {
        let (result, error) = match self.intercept(&client, &name, &args).await {
            Some(intercepted) => (intercepted, None),
            None => {
                let handler = self.functions.read().get(&name).cloned();
                match handler {
                    Some(handler) => match handler(client.clone(), args).await {
                        Ok(value) => (value, None),
                        Err(e) => {
                            warn!(%name, "rmi function failed: {e}");
                            (Value::Null, Some(ERROR_FUNCTION.to_string()))
                        }
                    },
                    None => (Value::Null, Some(ERROR_UNDEFINED.to_string())),
                }
            }
        };
        let reply = CommandEnvelope::RmiResult { id, result, error };
        if let Err(e) = client.send_command(&reply) {
            debug!("failed to send rmi result: {e}");
        }
    }

    /// True when a function is registered under `name`.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }
}
