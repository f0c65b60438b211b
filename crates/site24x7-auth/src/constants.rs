//! Site24x7 / Zoho OAuth constants
//!
//! Site24x7 authenticates through Zoho Accounts. The token endpoint lives on
//! the accounts domain (`accounts.zoho.com` for the US data center), not on
//! the Site24x7 API host.

use std::time::Duration;

/// Token endpoint for both the authorization-code and refresh-token grants
pub const TOKEN_ENDPOINT: &str = "https://accounts.zoho.com/oauth/v2/token";

/// Fixed timeout for a single token exchange. Refreshes are rare, so a call
/// that does not answer within a second is treated as a transport failure.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// `Content-Type` sent on token requests (the request itself has no body)
pub const CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// `Accept` header selecting version 2 of the Site24x7 API
pub const ACCEPT: &str = "application/json; version=2.0";

/// Authorization scheme prefix used by Zoho for bearer tokens
pub const AUTH_SCHEME: &str = "Zoho-oauthtoken";

/// Seconds before expiry at which the scheduler refreshes
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(10);

/// Shortest sleep the scheduler will ever take between attempts
pub const DEFAULT_MINIMUM_INTERVAL: Duration = Duration::from_secs(2);

/// Sleep after a failed refresh
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
