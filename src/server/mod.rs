//! JSON-RPC server
//!
//! Serves JSON-RPC 2.0 over HTTP (and WebSocket) on the configured address.

pub mod error;
pub mod handler;
pub mod types;

pub use handler::RpcHandler;

use crate::domain::ports::Storage;
use crate::server::types::{
    FundLedgerRequest, GetDocumentRequest, ListDocumentsRequest, UploadRequest,
};
use crate::utils::error::{IngestError, Result};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use tracing::info;

pub struct RpcServer {
    handle: ServerHandle,
    local_addr: SocketAddr,
}

impl RpcServer {
    pub async fn start<S: Storage + Clone + 'static>(
        addr: &str,
        max_request_body_bytes: u32,
        handler: RpcHandler<S>,
    ) -> Result<Self> {
        let server = Server::builder()
            .max_request_body_size(max_request_body_bytes)
            .build(addr)
            .await
            .map_err(|e| IngestError::ServerError {
                message: format!("Failed to bind {}: {}", addr, e),
            })?;
        let local_addr = server.local_addr()?;

        let module = build_module(handler)?;
        let handle = server.start(module);

        info!("🌐 JSON-RPC server listening on {}", local_addr);
        Ok(Self { handle, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stop(self) {
        if self.handle.stop().is_ok() {
            self.handle.stopped().await;
        }
        info!("JSON-RPC server stopped");
    }
}

fn build_module<S: Storage + Clone + 'static>(
    handler: RpcHandler<S>,
) -> Result<RpcModule<RpcHandler<S>>> {
    let mut module = RpcModule::new(handler);

    module
        .register_async_method("documents.upload.v1", |params, ctx, _| async move {
            let req: UploadRequest = params.parse()?;
            ctx.upload(req).await
        })
        .map_err(register_error)?;

    module
        .register_async_method("documents.get.v1", |params, ctx, _| async move {
            let req: GetDocumentRequest = params.parse()?;
            ctx.get_document(req).await
        })
        .map_err(register_error)?;

    module
        .register_async_method("documents.list.v1", |params, ctx, _| async move {
            let req: Option<ListDocumentsRequest> = params.parse()?;
            ctx.list_documents(req.unwrap_or_default()).await
        })
        .map_err(register_error)?;

    module
        .register_async_method("funds.ledger.v1", |params, ctx, _| async move {
            let req: FundLedgerRequest = params.parse()?;
            ctx.fund_ledger(req).await
        })
        .map_err(register_error)?;

    module
        .register_method("health.v1", |_, ctx, _| ctx.health())
        .map_err(register_error)?;

    Ok(module)
}

fn register_error(e: impl std::fmt::Display) -> IngestError {
    IngestError::ServerError {
        message: e.to_string(),
    }
}
