//! Service adapters for the project-management agency.
//!
//! Each adapter implements the [`Adapter`] trait defined in [`traits`],
//! providing a uniform interface for tool discovery and execution:
//!
//! - [`NotionAdapter`] -- task CRUD and status reports over a Notion database.
//! - [`ClickUpAdapter`] -- task, list and dependency tools for ClickUp.
//! - [`WhatsAppAdapter`] -- send-only WhatsApp text messages (Evolution API).

pub mod clickup;
pub mod error;
mod http;
pub mod notion;
pub mod params;
pub mod traits;
pub mod whatsapp;

pub use clickup::{ClickUpAdapter, ClickUpConfig};
pub use error::{AdapterError, Result};
pub use notion::{NotionAdapter, NotionConfig, TaskStatus};
pub use traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};
pub use whatsapp::{WhatsAppAdapter, WhatsAppConfig};
