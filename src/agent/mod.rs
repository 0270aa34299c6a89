// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Agent gateway and completion provider abstraction
//!
//! `gateway` owns the lazily loaded agent handle and opens per-request
//! provider streams; `provider` defines the abstraction over the hosted
//! completion service; `remote` implements it over HTTP; `attachments`
//! validates inbound image data URIs.

pub mod attachments;
pub mod gateway;
pub mod mock_provider;
pub mod provider;
pub mod remote;

pub use attachments::{validate_image_data_uris, ImageAttachment};
pub use gateway::{AgentGateway, ConversationSession, MessageStream};
pub use mock_provider::{MockProvider, MockTurn};
pub use provider::{
    AgentHandle, AgentMetadata, CompletionProvider, MessagePayload, ProviderEvent, ProviderStream,
    UsageInfo,
};
pub use remote::RemoteProvider;
