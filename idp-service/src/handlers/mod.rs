//! HTTP handlers. Thin layer: extract, call the service, shape the JSON.

pub mod api;
pub mod federation;
pub mod oauth;
pub mod passkey_login;
pub mod passkey_management;
pub mod sessions;

/// Where the browser lands after a successful sign-in.
pub const SIGNED_IN_REDIRECT: &str = "/users/my_page";
