//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh";
pub const GET_AUTH_SESSIONS: &str = "/api/auth/sessions";
pub const POST_USER_REGISTER: &str = "/api/user/register";
pub const POST_USER_UPDATE_PASSWORD: &str = "/api/user/update/password";
