pub mod auth;
pub mod negotiate;

pub use auth::{identify, require_admin, require_session, CurrentSession, CurrentUser};
pub use negotiate::{accepts_html, accepts_json, cookie_value, JsonOrForm};
