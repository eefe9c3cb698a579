/// Local network origins accepted in development regardless of configuration.
const DEVELOPMENT_ORIGINS: &[&str] = &["http://localhost", "http://127.0.0.1", "http://192.168."];

/// Decide whether a browser `Origin` may open a socket. Clients that send no
/// origin (native apps, server-side scripts) are always accepted.
pub(crate) fn is_allowed(origin: Option<&str>, allowed_origins: &[String], development: bool) -> bool {
    let Some(origin) = origin else {
        return true;
    };

    if allowed_origins
        .iter()
        .any(|allowed| origin.starts_with(allowed.as_str()))
    {
        return true;
    }

    development
        && DEVELOPMENT_ORIGINS
            .iter()
            .any(|prefix| origin.starts_with(prefix))
}
