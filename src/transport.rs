//! The boundary between the session manager and the HTTP layer.
//!
//! The manager only reads and writes named cookie values through [`CookieTransport`]; turning
//! those into headers is the transport's job. [`CookieJar`] is a small header-level
//! implementation usable directly from handlers and tests.

use cookie::Cookie;

/// A cookie the manager wants delivered to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub domain: Option<String>,
    /// `Some(0)` expires the cookie immediately; `None` makes it a browser-session cookie.
    pub max_age: Option<i64>,
}

impl SessionCookie {
    /// Whether this cookie tells the client to drop the stored value.
    pub fn is_removal(&self) -> bool {
        matches!(self.max_age, Some(age) if age <= 0)
    }

    /// Converts to a [`cookie::Cookie`] carrying the same attributes.
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .http_only(self.http_only)
            .secure(self.secure);
        if !self.path.is_empty() {
            builder = builder.path(self.path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(age) = self.max_age {
            builder = builder.max_age(time::Duration::seconds(age.max(0)));
        }
        builder.build()
    }

    /// Renders a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        self.to_cookie().to_string()
    }
}

/// Cookie access the manager needs from the request/response pair.
pub trait CookieTransport: Send {
    /// Value of the inbound cookie `name`, if the request carried one.
    fn cookie(&self, name: &str) -> Option<String>;

    /// Queues `cookie` on the outbound response.
    fn set_cookie(&mut self, cookie: SessionCookie);

    /// Makes later [`cookie`](Self::cookie) calls in this request see `value`.
    fn replace_inbound(&mut self, name: &str, value: &str);

    /// Whether the request arrived over TLS.
    fn is_secure_channel(&self) -> bool {
        false
    }
}

/// Inbound cookies parsed from a `Cookie` header plus the cookies queued for the response.
#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    inbound: cookie::CookieJar,
    outbound: Vec<SessionCookie>,
    secure: bool,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` request header (`a=1; b=2`). Malformed pairs are skipped.
    pub fn from_header(header: &str) -> Self {
        let mut inbound = cookie::CookieJar::new();
        for cookie in Cookie::split_parse(header).filter_map(Result::ok) {
            inbound.add_original(cookie.into_owned());
        }
        Self {
            inbound,
            ..Self::default()
        }
    }

    /// Adds an inbound cookie as if the request had carried it.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value): (String, String) = (name.into(), value.into());
        self.inbound.add_original(Cookie::new(name, value));
        self
    }

    /// Marks the request as received over TLS.
    pub fn with_secure_channel(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Cookies queued for the response, oldest first.
    pub fn outbound(&self) -> &[SessionCookie] {
        &self.outbound
    }

    /// The last cookie queued under `name`.
    pub fn outbound_cookie(&self, name: &str) -> Option<&SessionCookie> {
        self.outbound.iter().rev().find(|c| c.name == name)
    }

    /// `Set-Cookie` header values for the response.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.outbound.iter().map(SessionCookie::to_header_value).collect()
    }

    /// Builds the jar a client would send next, given the cookies it was just handed.
    pub fn follow_up(&self) -> Self {
        let mut inbound = cookie::CookieJar::new();
        for cookie in self.inbound.iter() {
            inbound.add_original(cookie.clone());
        }
        for cookie in &self.outbound {
            if cookie.is_removal() {
                inbound.remove(Cookie::new(cookie.name.clone(), ""));
            } else {
                inbound.add_original(Cookie::new(cookie.name.clone(), cookie.value.clone()));
            }
        }
        Self {
            inbound,
            outbound: Vec::new(),
            secure: self.secure,
        }
    }
}

impl CookieTransport for CookieJar {
    fn cookie(&self, name: &str) -> Option<String> {
        self.inbound
            .get(name)
            .map(|cookie| cookie.value_trimmed().to_string())
    }

    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.outbound.push(cookie);
    }

    fn replace_inbound(&mut self, name: &str, value: &str) {
        self.inbound
            .add_original(Cookie::new(name.to_string(), value.to_string()));
    }

    fn is_secure_channel(&self) -> bool {
        self.secure
    }
}
