//! Session credentials for the knowledge-base service.
//!
//! The exporter does not log in by itself. Cookies come from a browser,
//! either imported from a Netscape cookie file ([`parse_netscape_cookies`])
//! or saved earlier by the [`CredentialStore`]. A run captures them once in a
//! [`SessionSnapshot`], which builds the HTTP client every request goes
//! through.

mod cookies;
mod session;
mod store;

pub use cookies::{
    CookieError, ParseResult, SessionCookie, load_cookies_into_jar, parse_netscape_cookies,
};
pub use session::{LoginStatus, SessionSnapshot, check_login_status};
pub use store::{CredentialError, CredentialStore, StoredCredentials};
