//! Instagram OAuth and Graph API endpoints
//!
//! The authorization and short-lived token endpoints live on
//! `api.instagram.com`; everything after the initial exchange (long-lived
//! exchange, refresh, media) lives on `graph.instagram.com`.

/// Authorization endpoint the user is redirected to for sign-on
pub const AUTHORIZE_ENDPOINT: &str = "https://www.instagram.com/oauth/authorize/";

/// Token endpoint for the authorization-code → short-lived token exchange
pub const SHORT_LIVED_TOKEN_ENDPOINT: &str = "https://api.instagram.com/oauth/access_token";

/// Graph endpoint exchanging a short-lived token for a long-lived one
pub const LONG_LIVED_TOKEN_ENDPOINT: &str = "https://graph.instagram.com/access_token";

/// Graph endpoint refreshing an existing long-lived token
pub const REFRESH_TOKEN_ENDPOINT: &str = "https://graph.instagram.com/refresh_access_token";

/// OAuth scopes required for profile and media access
pub const SCOPES: &str = "user_media,user_profile";
