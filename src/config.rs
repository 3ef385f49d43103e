//! ATTPs client configuration
//!
//! Every option resolves the same way: the agent's own setting wins, the
//! process environment is the fallback.

use crate::runtime::AgentRuntime;
use std::env;
use std::fmt;
use std::time::Duration;

pub const ATTPS_PROXY_ADDRESS: &str = "ATTPS_PROXY_ADDRESS";
pub const ATTPS_RPC_URL: &str = "ATTPS_RPC_URL";
pub const ATTPS_PRIVATE_KEY: &str = "ATTPS_PRIVATE_KEY";
pub const ATTPS_AUTO_HASH_DATA: &str = "ATTPS_AUTO_HASH_DATA";
pub const ATTPS_CONVERTER_ADDRESS: &str = "ATTPS_CONVERTER_ADDRESS";

/// `agent_setting(key) ?? environment(key)`
pub fn resolve(runtime: &dyn AgentRuntime, key: &str) -> Option<String> {
    resolve_with(key, |k| runtime.get_setting(k), |k| env::var(k).ok())
}

/// Layered lookup with explicit sources
pub fn resolve_with<A, E>(key: &str, agent: A, environment: E) -> Option<String>
where
    A: Fn(&str) -> Option<String>,
    E: Fn(&str) -> Option<String>,
{
    agent(key).or_else(|| environment(key))
}

/// Options for constructing a verification client
#[derive(Clone, Default, PartialEq)]
pub struct AttpsConfig {
    pub proxy_address: Option<String>,
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub auto_hash_data: bool,
    pub converter_address: Option<String>,
}

impl AttpsConfig {
    /// Resolve all options against `runtime` and the environment
    pub fn resolve(runtime: &dyn AgentRuntime) -> Self {
        Self::resolve_from(|key| resolve(runtime, key))
    }

    pub fn resolve_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            proxy_address: lookup(ATTPS_PROXY_ADDRESS),
            rpc_url: lookup(ATTPS_RPC_URL),
            private_key: lookup(ATTPS_PRIVATE_KEY),
            auto_hash_data: lookup(ATTPS_AUTO_HASH_DATA).as_deref() == Some("true"),
            converter_address: lookup(ATTPS_CONVERTER_ADDRESS),
        }
    }
}

impl fmt::Debug for AttpsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttpsConfig")
            .field("proxy_address", &self.proxy_address)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("auto_hash_data", &self.auto_hash_data)
            .field("converter_address", &self.converter_address)
            .finish()
    }
}

/// Tuning for the JSON-RPC client
#[derive(Debug, Clone)]
pub struct RpcOptions {
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Give up waiting for a receipt after this long
    pub confirmation_timeout: Duration,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            confirmation_timeout: Duration::from_secs(120),
        }
    }
}
