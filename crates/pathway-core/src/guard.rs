//! Route guard for the web layer.
//!
//! Protected sections require a session; the sign-in pages bounce users who
//! already have one back to the home page. The auth error page stays
//! reachable either way so a failed sign-in can still be explained.

use reqwest::Url;

use crate::config::EntryPoints;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Continue,
    Redirect(Url),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    entry_points: EntryPoints,
}

impl RouteGuard {
    pub fn new(entry_points: EntryPoints) -> Self {
        Self { entry_points }
    }

    pub fn decide(&self, request_url: &Url, authenticated: bool) -> RouteDecision {
        let path = request_url.path();
        let protected = self
            .entry_points
            .protected_prefixes
            .iter()
            .any(|prefix| is_under(path, prefix));

        if protected && !authenticated {
            let mut sign_in = self.resolve(request_url, &self.entry_points.sign_in);
            sign_in
                .query_pairs_mut()
                .append_pair("callbackUrl", request_url.as_str());
            return RouteDecision::Redirect(sign_in);
        }

        let auth_page = is_under(path, &self.entry_points.auth_prefix);
        if auth_page && authenticated && !is_under(path, &self.entry_points.error) {
            return RouteDecision::Redirect(self.resolve(request_url, &self.entry_points.home));
        }

        RouteDecision::Continue
    }

    fn resolve(&self, request_url: &Url, path: &str) -> Url {
        request_url.join(path).unwrap_or_else(|_| {
            let mut url = request_url.clone();
            url.set_path(path);
            url.set_query(None);
            url
        })
    }
}

/// Segment-aware prefix match: `/dashboard/x` is under `/dashboard`,
/// `/dashboards` is not.
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RouteGuard {
        RouteGuard::new(EntryPoints::default())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test url should parse")
    }

    #[test]
    fn test_anonymous_user_is_sent_to_sign_in_with_callback() {
        let request = url("https://learn.example.edu/dashboard/paths?tab=mine");
        match guard().decide(&request, false) {
            RouteDecision::Redirect(to) => {
                assert_eq!(to.path(), "/auth/login");
                let callback: Vec<(String, String)> = to.query_pairs().into_owned().collect();
                assert_eq!(
                    callback,
                    vec![(
                        "callbackUrl".to_string(),
                        "https://learn.example.edu/dashboard/paths?tab=mine".to_string()
                    )]
                );
            }
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_signed_in_user_reaches_dashboard() {
        let request = url("https://learn.example.edu/dashboard");
        assert_eq!(guard().decide(&request, true), RouteDecision::Continue);
    }

    #[test]
    fn test_signed_in_user_is_bounced_from_auth_pages() {
        let request = url("https://learn.example.edu/auth/login");
        assert_eq!(
            guard().decide(&request, true),
            RouteDecision::Redirect(url("https://learn.example.edu/dashboard"))
        );
        assert_eq!(guard().decide(&request, false), RouteDecision::Continue);
    }

    #[test]
    fn test_auth_error_page_is_always_reachable() {
        let request = url("https://learn.example.edu/auth/error?error=Configuration");
        assert_eq!(guard().decide(&request, true), RouteDecision::Continue);
        assert_eq!(guard().decide(&request, false), RouteDecision::Continue);
    }

    #[test]
    fn test_public_pages_pass_through() {
        for path in ["/", "/paths/rust-basics", "/dashboards", "/authors"] {
            let request = url(&format!("https://learn.example.edu{}", path));
            assert_eq!(guard().decide(&request, false), RouteDecision::Continue, "{}", path);
            assert_eq!(guard().decide(&request, true), RouteDecision::Continue, "{}", path);
        }
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("/dashboard", "/dashboard"));
        assert!(is_under("/dashboard/", "/dashboard/"));
        assert!(is_under("/dashboard/a/b", "/dashboard"));
        assert!(!is_under("/dashboardx", "/dashboard"));
        assert!(!is_under("/", "/dashboard"));
    }
}
