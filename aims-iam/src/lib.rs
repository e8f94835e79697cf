//! Typed bindings for the AIMS identity and access management API
//!
//! [`AimsClient`] turns each AIMS operation into a request descriptor, hands
//! it to an injected [`ApiClient`](aims_core::ApiClient) and decodes the
//! response. It keeps no state of its own.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aims_iam::AimsClient;
//! # async fn run(transport: Arc<dyn aims_core::ApiClient>) -> Result<(), aims_core::Error> {
//! let aims = AimsClient::new(transport);
//! let roles = aims.get_account_roles("12345678").await?;
//! for role in roles.roles {
//!     println!("{} {}", role.id, role.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod models;

pub use aims_core::{ApiClient, ApiRequest, Error};
pub use client::AimsClient;
pub use models::{
    AccessKey, AccessKeyList, Account, AccountIdList, AccountList, Authentication, ChangeStamp,
    LinkedUser, Permissions, Role, RoleList, TokenInfo, User, UserCredential, UserList, UserQuery,
};
