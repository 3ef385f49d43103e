//! Verification service client
//!
//! The handler only sees these traits. `rpc` provides the on-chain
//! implementation that submits `verify` calls to the ATTPs proxy contract.

use crate::config::AttpsConfig;
use crate::models::{Receipt, VerifyParams};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod abi;
pub mod rpc;
pub mod tx;

pub use rpc::{RpcClientFactory, RpcVerificationClient};

/// An in-flight or finalized submission
#[async_trait]
pub trait TransactionHandle: Send + Sync {
    /// Identifier known as soon as the submission is accepted
    fn hash(&self) -> &str;

    /// Suspend until the service finalizes the submission.
    async fn wait(&self) -> Result<Receipt>;
}

#[async_trait]
pub trait VerificationClient: Send + Sync {
    /// Submit a verify command. Failures here are submission failures.
    async fn verify(&self, params: &VerifyParams) -> Result<Box<dyn TransactionHandle>>;
}

/// Builds clients from resolved configuration
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(&self, config: &AttpsConfig) -> Result<Arc<dyn VerificationClient>>;
}
