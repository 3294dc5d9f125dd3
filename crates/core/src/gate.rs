//! Page gate for browser navigation.
//!
//! Only the presence of the `access_token` cookie is checked here; token
//! validity is enforced by the API authentication layer.

/// Cookie carrying the session token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Redirect(&'static str),
}

/// Decide what to do with a page request.
pub fn gate_decision(token_present: bool, path: &str) -> GateDecision {
    let in_dashboard = path == DASHBOARD_PATH || path.starts_with("/dashboard/");
    match (token_present, path) {
        (true, "/") => GateDecision::Redirect(DASHBOARD_PATH),
        (false, "/") => GateDecision::Redirect(LOGIN_PATH),
        (true, LOGIN_PATH) => GateDecision::Redirect(DASHBOARD_PATH),
        (false, _) if in_dashboard => GateDecision::Redirect(LOGIN_PATH),
        _ => GateDecision::Continue,
    }
}

/// Extract a cookie value from a `Cookie` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_table() {
        assert_eq!(
            gate_decision(false, "/dashboard/x"),
            GateDecision::Redirect("/login")
        );
        assert_eq!(
            gate_decision(true, "/login"),
            GateDecision::Redirect("/dashboard")
        );
        assert_eq!(gate_decision(true, "/"), GateDecision::Redirect("/dashboard"));
        assert_eq!(gate_decision(false, "/"), GateDecision::Redirect("/login"));
    }

    #[test]
    fn passes_through_otherwise() {
        assert_eq!(gate_decision(true, "/dashboard/x"), GateDecision::Continue);
        assert_eq!(gate_decision(false, "/login"), GateDecision::Continue);
        assert_eq!(gate_decision(false, "/dashboards"), GateDecision::Continue);
        assert_eq!(
            gate_decision(false, "/dashboard"),
            GateDecision::Redirect("/login")
        );
    }

    #[test]
    fn cookie_lookup() {
        let header = "theme=dark; access_token=abc123; other=1";
        assert_eq!(cookie_value(header, ACCESS_TOKEN_COOKIE), Some("abc123"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("", ACCESS_TOKEN_COOKIE), None);
    }
}
