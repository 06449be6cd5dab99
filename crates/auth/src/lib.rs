//! `telar-auth` — identity and the per-module permission gate.
//!
//! Decoupled from HTTP and storage: aggregates are pure, the gate is a
//! function over a role's permission matrix, tokens are plain claims.

pub mod claims;
pub mod password;
pub mod permissions;
pub mod role;
pub mod user;

pub use claims::{JwtClaims, TokenError, decode_token, encode_token};
pub use password::{hash_password, verify_password};
pub use permissions::{Module, PermissionLevel, PermissionSet, has_permission};
pub use role::{
    CreateRole, DeleteRole, Role, RoleCommand, RoleCreated, RoleDeleted, RoleEvent, RoleId,
    RoleUpdated, UpdateRole,
};
pub use user::{
    ChangePassword, CreateUser, DeleteUser, PasswordChanged, UpdateUser, User, UserCommand,
    UserCreated, UserDeleted, UserEvent, UserId, UserUpdated,
};
