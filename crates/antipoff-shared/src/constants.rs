/// Application name
pub const APP_NAME: &str = "Antipoff";

/// Allowed cadastral number lengths (digits)
pub const CADASTRAL_MIN_LEN: usize = 13;
pub const CADASTRAL_MAX_LEN: usize = 14;

/// Maximum length of names, usernames and emails (matches the column sizes)
pub const MAX_FIELD_LEN: usize = 50;

/// Plaintext password length bounds
pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_PASSWORD_LEN: usize = 50;

/// Role assigned to every newly registered user
pub const DEFAULT_ROLE_ID: i64 = 1;
pub const DEFAULT_ROLE_NAME: &str = "user";

/// Role allowed into the admin panel and `/all_users/`
pub const ADMIN_ROLE_ID: i64 = 2;
pub const ADMIN_ROLE_NAME: &str = "admin";

/// Session cookies
pub const ACCESS_TOKEN_COOKIE: &str = "user_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "user_refresh_token";

/// Default token lifetimes
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Largest token lifetimes accepted from configuration
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Upper bound on one oracle call, in seconds
pub const ORACLE_TIMEOUT_SECS: u64 = 60;

/// Default oracle endpoint
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:3000/history";

/// Display format for timestamps in API responses
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
